use std::fmt::Display;

use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::error::{Error, Result};
use crate::model::mongodb::Id;

/// Roles a user may hold. Only the distinction between admins and everyone
/// else matters to evaluation.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum Role {
    Teacher = 0,
    Admin = 1,
}

impl Display for Role {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            formatter,
            "{}",
            match self {
                Self::Teacher => "teacher",
                Self::Admin => "admin",
            }
        )
    }
}

/// The identity of whoever is making a request, as vouched for by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub id: Id,
    pub roles: Vec<Role>,
    /// Code of the caller's own branch, if they have one.
    pub branch_code: Option<String>,
}

impl Caller {
    /// Does the caller hold the given role?
    pub fn is_an(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    /// Fail with `Forbidden` unless the caller holds the given role.
    pub fn require(&self, role: Role) -> Result<()> {
        if self.is_an(role) {
            Ok(())
        } else {
            Err(Error::Forbidden(format!(
                "user {} is not a {role}",
                self.id
            )))
        }
    }
}
