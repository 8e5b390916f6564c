//! Role-based authorization for workflow operations.
//!
//! Identity is resolved outside this crate; every mutating call arrives
//! with an `Actor` (user id + role) that is trusted as-is. This module only
//! checks role membership:
//! 1. Agronomist / Administrator → review, relabel, recreate, recommend
//! 2. Operator → status changes on their own tasks
//! 3. Administrator → audit trail, every report
//! 4. Default → DENY

use serde::{Deserialize, Serialize};

use crate::error::ServiceError;
use crate::models::enums::Role;

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

/// The caller of an operation, as resolved by the identity collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: i64,
    pub role: Role,
}

impl Actor {
    pub fn new(id: i64, role: Role) -> Self {
        Self { id, role }
    }

    pub fn operator(id: i64) -> Self {
        Self::new(id, Role::Operator)
    }

    pub fn agronomist(id: i64) -> Self {
        Self::new(id, Role::Agronomist)
    }

    pub fn administrator(id: i64) -> Self {
        Self::new(id, Role::Administrator)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Administrator
    }
}

// ═══════════════════════════════════════════════════════════
// Checks
// ═══════════════════════════════════════════════════════════

/// Agronomist or Administrator.
pub fn require_elevated(actor: &Actor, action: &str) -> Result<(), ServiceError> {
    if actor.role.is_elevated() {
        Ok(())
    } else {
        tracing::warn!(
            actor_id = actor.id,
            role = %actor.role,
            action,
            "Denied: elevated role required"
        );
        Err(ServiceError::Forbidden(format!(
            "{action} requires the agronomist or administrator role"
        )))
    }
}

pub fn require_admin(actor: &Actor, action: &str) -> Result<(), ServiceError> {
    if actor.is_admin() {
        Ok(())
    } else {
        tracing::warn!(
            actor_id = actor.id,
            role = %actor.role,
            action,
            "Denied: administrator required"
        );
        Err(ServiceError::Forbidden(format!(
            "{action} requires the administrator role"
        )))
    }
}

/// Operators act on their own tasks only; elevated roles on any task.
pub fn require_task_actor(actor: &Actor, task_operator_id: i64) -> Result<(), ServiceError> {
    match actor.role {
        Role::Agronomist | Role::Administrator => Ok(()),
        Role::Operator if actor.id == task_operator_id => Ok(()),
        Role::Operator => {
            tracing::warn!(
                actor_id = actor.id,
                task_operator_id,
                "Denied: task assigned to another operator"
            );
            Err(ServiceError::Forbidden(
                "task is assigned to another operator".into(),
            ))
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn operator_cannot_review() {
        let err = require_elevated(&Actor::operator(3), "relabel").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }

    #[test]
    fn agronomist_and_admin_can_review() {
        assert!(require_elevated(&Actor::agronomist(2), "relabel").is_ok());
        assert!(require_elevated(&Actor::administrator(1), "relabel").is_ok());
    }

    #[test]
    fn only_admin_passes_admin_check() {
        assert!(require_admin(&Actor::administrator(1), "audit").is_ok());
        assert!(require_admin(&Actor::agronomist(2), "audit").is_err());
    }

    #[test]
    fn operator_limited_to_own_tasks() {
        assert!(require_task_actor(&Actor::operator(3), 3).is_ok());
        let err = require_task_actor(&Actor::operator(4), 3).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        assert!(require_task_actor(&Actor::agronomist(2), 3).is_ok());
    }
}
