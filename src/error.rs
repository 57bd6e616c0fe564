use crate::types::{Action, RoleName, Subject};
use std::fmt;
use thiserror::Error;

/// Fault raised by a condition predicate.
pub type ConditionFault = Box<dyn std::error::Error + Send + Sync>;

/// Crate result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by this crate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Invalid identifier input.
    #[error("invalid name: {0}")]
    InvalidName(String),
    /// Two roles share a name.
    #[error("duplicate role {role}")]
    DuplicateRole { role: RoleName },
    /// A role inherits from a name that is not registered.
    #[error("role {role} inherits from unknown role {parent}")]
    UnknownParentRole { parent: RoleName, role: RoleName },
    /// Role inheritance cycle detected.
    #[error("role inheritance cycle detected: {}", CyclePath(cycle))]
    InheritanceCycle { cycle: Vec<RoleName> },
    /// A role inherits through more levels than the configured limit.
    #[error("role {role} inherits through more than {max_depth} levels")]
    InheritanceDepthExceeded { role: RoleName, max_depth: usize },
    /// Role is not registered.
    #[error("unknown role {role}")]
    UnknownRole { role: RoleName },
}

struct CyclePath<'a>(&'a [RoleName]);

impl fmt::Display for CyclePath<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, role) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" -> ")?;
            }
            f.write_str(role.as_str())?;
        }
        Ok(())
    }
}

/// A condition predicate failed while checking one candidate permission.
///
/// The candidate is treated as not granting and the scan moves on.
#[derive(Debug, Error)]
#[error(
    "condition of permission #{position} ({action} on {subject}) failed for role {role}: {source}"
)]
pub struct ConditionEvaluationError {
    /// Role the check was made for.
    pub role: RoleName,
    /// Action of the failing permission.
    pub action: Action,
    /// Subject of the failing permission.
    pub subject: Subject,
    /// Position of the permission in the effective permission set.
    pub position: usize,
    /// Underlying predicate fault.
    #[source]
    pub source: ConditionFault,
}
