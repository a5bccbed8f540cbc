//! Object-level access control for writes to user accounts.
//!
//! A caller may update or delete an account only if it is the account owner
//! or a superuser. Handlers call [`authorize`] after loading the target and
//! before touching the store.

use uuid::Uuid;

use crate::users::repo_types::User;

/// The authenticated caller, resolved from a verified bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub id: Uuid,
    pub is_superuser: bool,
}

impl From<&User> for Principal {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            is_superuser: u.is_superuser,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Update,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    Unauthenticated,
    NotOwner,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn into_result(self) -> Result<(), DenyReason> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => Err(reason),
        }
    }
}

/// Update and delete share the same rule; `_op` keeps call sites explicit.
pub fn authorize(principal: Option<&Principal>, target: &User, _op: Operation) -> Decision {
    let Some(p) = principal else {
        return Decision::Deny(DenyReason::Unauthenticated);
    };
    if p.id == target.id || p.is_superuser {
        Decision::Allow
    } else {
        Decision::Deny(DenyReason::NotOwner)
    }
}
