//! Photo lifecycle: create, rotate, update, delete, read and verify.

pub mod lifecycle;
pub mod locks;
pub mod saga;
mod verify;

pub use lifecycle::PhotoLifecycle;
pub use locks::{PhotoLockGuard, PhotoLocks};
pub use saga::{Compensation, CreateState, RotateState, SagaState};
