//! Saga state machines for the multi-system photo flows.
//!
//! Each flow is a linear sequence of states. A state names the step being
//! attempted; when that step fails, the compensations listed for the state
//! run in order and the saga ends in `Failed`. Compensations only touch
//! artifacts this run created, plus the original row of a rotation when the
//! deprecation step may have changed it. Object keys are recorded only after
//! the gateway wrote them without replacing anything, so `DeleteObjects`
//! never removes objects of a concurrent run.

use std::fmt::Debug;
use std::time::Instant;
use trigpics_core::AppError;
use trigpics_db::PhotoRecordStore;
use trigpics_storage::{ObjectStoreGateway, PhotoObjectKeys};

/// Undo action run when a step fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compensation {
    /// Remove both objects uploaded by this run
    DeleteObjects,
    /// Physically remove the row inserted by this run
    DeleteRow,
    /// Return the original row to active if the deprecation may have landed
    RestoreOriginal,
}

pub trait SagaState: Copy + Debug + PartialEq + Send {
    const FLOW: &'static str;
    const DONE: Self;
    const FAILED: Self;

    /// Transition function; terminal states map to themselves.
    fn next(self) -> Self;

    /// Compensations to run when the step of this state fails.
    fn compensation(self) -> &'static [Compensation];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateState {
    Validating,
    Processing,
    RecordPending,
    Uploading,
    Finalizing,
    Done,
    Failed,
}

impl SagaState for CreateState {
    const FLOW: &'static str = "create";
    const DONE: Self = CreateState::Done;
    const FAILED: Self = CreateState::Failed;

    fn next(self) -> Self {
        match self {
            CreateState::Validating => CreateState::Processing,
            CreateState::Processing => CreateState::RecordPending,
            CreateState::RecordPending => CreateState::Uploading,
            CreateState::Uploading => CreateState::Finalizing,
            CreateState::Finalizing => CreateState::Done,
            CreateState::Done => CreateState::Done,
            CreateState::Failed => CreateState::Failed,
        }
    }

    fn compensation(self) -> &'static [Compensation] {
        match self {
            CreateState::Uploading => &[Compensation::DeleteRow],
            CreateState::Finalizing => &[Compensation::DeleteObjects, Compensation::DeleteRow],
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotateState {
    Loading,
    Transforming,
    Recreating,
    Uploading,
    Finalizing,
    Deprecating,
    Done,
    Failed,
}

impl SagaState for RotateState {
    const FLOW: &'static str = "rotate";
    const DONE: Self = RotateState::Done;
    const FAILED: Self = RotateState::Failed;

    fn next(self) -> Self {
        match self {
            RotateState::Loading => RotateState::Transforming,
            RotateState::Transforming => RotateState::Recreating,
            RotateState::Recreating => RotateState::Uploading,
            RotateState::Uploading => RotateState::Finalizing,
            RotateState::Finalizing => RotateState::Deprecating,
            RotateState::Deprecating => RotateState::Done,
            RotateState::Done => RotateState::Done,
            RotateState::Failed => RotateState::Failed,
        }
    }

    fn compensation(self) -> &'static [Compensation] {
        match self {
            RotateState::Uploading => &[Compensation::DeleteRow],
            RotateState::Finalizing => &[Compensation::DeleteObjects, Compensation::DeleteRow],
            RotateState::Deprecating => &[
                Compensation::DeleteObjects,
                Compensation::DeleteRow,
                Compensation::RestoreOriginal,
            ],
            _ => &[],
        }
    }
}

/// What a run has created so far.
#[derive(Debug, Default, Clone)]
pub struct SagaArtifacts {
    pub row_id: Option<i64>,
    pub keys: Option<PhotoObjectKeys>,
    pub original_id: Option<i64>,
    /// Deprecation of the original failed with an unknown outcome
    pub original_touched: bool,
}

/// Collaborators compensations act on.
pub struct Rollback<'a> {
    pub records: &'a dyn PhotoRecordStore,
    pub gateway: &'a ObjectStoreGateway,
}

/// One run of a flow.
pub struct Saga<S: SagaState> {
    state: S,
    artifacts: SagaArtifacts,
    started: Instant,
}

impl<S: SagaState> Saga<S> {
    pub fn new(initial: S) -> Self {
        Self {
            state: initial,
            artifacts: SagaArtifacts::default(),
            started: Instant::now(),
        }
    }

    pub fn state(&self) -> S {
        self.state
    }

    pub fn artifacts(&self) -> &SagaArtifacts {
        &self.artifacts
    }

    pub fn artifacts_mut(&mut self) -> &mut SagaArtifacts {
        &mut self.artifacts
    }

    pub fn advance(&mut self) {
        let next = self.state.next();
        tracing::debug!(flow = S::FLOW, from = ?self.state, to = ?next, "Saga transition");
        self.state = next;
    }

    pub fn finish(&mut self) {
        self.state = S::DONE;
        tracing::debug!(
            flow = S::FLOW,
            photo_id = ?self.artifacts.row_id,
            duration_ms = self.started.elapsed().as_secs_f64() * 1000.0,
            "Saga completed"
        );
    }

    /// Pass `result` through, compensating the current state on error.
    pub async fn checked<T>(
        &mut self,
        result: Result<T, AppError>,
        rollback: &Rollback<'_>,
    ) -> Result<T, AppError> {
        match result {
            Ok(value) => Ok(value),
            Err(cause) => Err(self.fail(cause, rollback).await),
        }
    }

    /// Run the current state's compensations and return the error to surface.
    ///
    /// Returns `cause` unchanged when compensation succeeds, otherwise an
    /// integrity error naming every row and key left behind.
    pub async fn fail(&mut self, cause: AppError, rollback: &Rollback<'_>) -> AppError {
        let failed_in = self.state;
        self.state = S::FAILED;

        let steps = failed_in.compensation();
        if steps.is_empty() {
            tracing::debug!(flow = S::FLOW, state = ?failed_in, error = %cause, "Saga failed before any side effect");
            return cause;
        }

        tracing::warn!(
            flow = S::FLOW,
            state = ?failed_in,
            error = %cause,
            compensation = ?steps,
            photo_id = ?self.artifacts.row_id,
            "Saga step failed, compensating"
        );

        let mut stranded_ids = Vec::new();
        let mut stranded_keys = Vec::new();
        for step in steps {
            match step {
                Compensation::DeleteObjects => {
                    if let Some(keys) = &self.artifacts.keys {
                        if let Err(e) = rollback.gateway.delete_pair(keys).await {
                            tracing::error!(error = %e, keys = ?keys, "Compensation: object delete failed");
                            stranded_keys.extend(e.leftover_keys().iter().cloned());
                        }
                    }
                }
                Compensation::DeleteRow => {
                    if let Some(photo_id) = self.artifacts.row_id {
                        match rollback.records.hard_delete(photo_id).await {
                            Ok(true) => tracing::debug!(photo_id = photo_id, "Compensation: row deleted"),
                            Ok(false) => tracing::info!(photo_id = photo_id, "Compensation: row already gone"),
                            Err(e) => {
                                tracing::error!(error = %e, photo_id = photo_id, "Compensation: row delete failed");
                                stranded_ids.push(photo_id);
                            }
                        }
                    }
                }
                Compensation::RestoreOriginal => {
                    if let (true, Some(original_id)) =
                        (self.artifacts.original_touched, self.artifacts.original_id)
                    {
                        match rollback.records.restore_active(original_id).await {
                            Ok(restored) => tracing::info!(
                                photo_id = original_id,
                                restored = restored,
                                "Compensation: original row checked"
                            ),
                            Err(e) => {
                                tracing::error!(error = %e, photo_id = original_id, "Compensation: original restore failed");
                                stranded_ids.push(original_id);
                            }
                        }
                    }
                }
            }
        }

        let (message, mut photo_ids, mut keys) = match cause {
            AppError::Integrity {
                message,
                photo_ids,
                keys,
            } => (message, photo_ids, keys),
            cause if stranded_ids.is_empty() && stranded_keys.is_empty() => {
                tracing::warn!(flow = S::FLOW, state = ?failed_in, "Saga compensated");
                return cause;
            }
            cause => (
                format!("{} flow failed ({}) and compensation was incomplete", S::FLOW, cause),
                Vec::new(),
                Vec::new(),
            ),
        };

        photo_ids.extend(stranded_ids);
        photo_ids.sort_unstable();
        photo_ids.dedup();
        keys.extend(stranded_keys);
        keys.sort();
        keys.dedup();

        tracing::error!(
            flow = S::FLOW,
            state = ?failed_in,
            photo_ids = ?photo_ids,
            keys = ?keys,
            "Saga left state needing manual reconciliation"
        );

        AppError::Integrity {
            message,
            photo_ids,
            keys,
        }
    }
}
