use serde::{Deserialize, Serialize};

/// Verified identity of the caller, supplied by the upstream auth layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: i64,
    pub is_admin: bool,
}

impl Actor {
    pub fn new(user_id: i64, is_admin: bool) -> Self {
        Self { user_id, is_admin }
    }

    /// Owner of the parent log, or any administrator.
    pub fn may_modify(&self, owner_id: i64) -> bool {
        self.is_admin || self.user_id == owner_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_and_admin_may_modify() {
        assert!(Actor::new(5, false).may_modify(5));
        assert!(Actor::new(6, true).may_modify(5));
        assert!(!Actor::new(6, false).may_modify(5));
    }
}
