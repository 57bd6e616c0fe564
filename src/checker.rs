use crate::condition::evaluate_condition;
use crate::error::{ConditionEvaluationError, Error, Result};
use crate::registry::RoleRegistry;
use crate::types::RoleName;
use std::fmt;
use tracing::{debug, trace, warn};

/// Authorization decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Permission is granted.
    Allow,
    /// Permission is denied.
    Deny,
}

impl Decision {
    /// Returns whether access is granted.
    pub fn is_allowed(self) -> bool {
        self == Self::Allow
    }
}

impl From<bool> for Decision {
    fn from(allowed: bool) -> Self {
        if allowed { Self::Allow } else { Self::Deny }
    }
}

/// Outcome of a single access check, with the faults absorbed on the way.
#[derive(Debug)]
pub struct AccessEvaluation {
    decision: Decision,
    granted_by: Option<usize>,
    faults: Vec<ConditionEvaluationError>,
    role_known: bool,
}

impl AccessEvaluation {
    fn unknown_role() -> Self {
        Self {
            decision: Decision::Deny,
            granted_by: None,
            faults: Vec::new(),
            role_known: false,
        }
    }

    /// Returns the decision.
    pub fn decision(&self) -> Decision {
        self.decision
    }

    /// Returns whether access is granted.
    pub fn is_allowed(&self) -> bool {
        self.decision.is_allowed()
    }

    /// Position in the effective permission set of the permission that
    /// granted access.
    pub fn granted_by(&self) -> Option<usize> {
        self.granted_by
    }

    /// Condition faults that were converted to denies for their candidate.
    pub fn faults(&self) -> &[ConditionEvaluationError] {
        &self.faults
    }

    /// Consumes the evaluation and returns the recorded faults.
    pub fn into_faults(self) -> Vec<ConditionEvaluationError> {
        self.faults
    }

    /// Returns false when the role was not registered.
    pub fn role_known(&self) -> bool {
        self.role_known
    }
}

/// Diagnostic describing an acting role that is missing from the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleDiagnostic {
    role: RoleName,
}

impl RoleDiagnostic {
    /// Returns the unknown role name.
    pub fn role(&self) -> &RoleName {
        &self.role
    }
}

impl fmt::Display for RoleDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "current role \"{}\" is not found in the registered roles",
            self.role
        )
    }
}

impl<C> RoleRegistry<C> {
    /// Returns a diagnostic when `role` is not registered.
    ///
    /// Checks for such a role simply deny; surfacing the diagnostic is up to
    /// the caller.
    pub fn validate_role(&self, role: &str) -> Option<RoleDiagnostic> {
        if self.contains(role) {
            None
        } else {
            Some(RoleDiagnostic {
                role: RoleName::from_string(role.to_string()),
            })
        }
    }

    /// Binds an acting role to this registry.
    pub fn session(&self, role: RoleName) -> Session<'_, C> {
        Session::new(self, role)
    }
}

impl<C> RoleRegistry<C>
where
    C: Sync,
{
    /// Returns whether `role` may perform `action` on `subject`.
    ///
    /// Unknown roles, condition faults and resolution errors all deny.
    ///
    /// The check is `async` so that asynchronous conditions can be awaited.
    /// When every condition involved is synchronous the future is ready on its
    /// first poll, so any minimal executor (for example
    /// `futures::executor::block_on`) returns the result immediately.
    pub async fn check_access(
        &self,
        role: &str,
        action: &str,
        subject: &str,
        context: Option<&C>,
    ) -> bool {
        match self.evaluate_access(role, action, subject, context).await {
            Ok(evaluation) => evaluation.is_allowed(),
            Err(err) => {
                warn!(%role, error = %err, "role resolution failed; denying");
                false
            }
        }
    }

    /// Evaluates an access check and reports absorbed faults.
    ///
    /// Candidates are tried one at a time in effective-set order; the first
    /// one that matches and whose condition holds grants. An unknown role is
    /// an ordinary deny. An inheritance cycle found while resolving the role
    /// (only possible with the build-time cycle check disabled) is returned as
    /// an error.
    #[tracing::instrument(level = "debug", skip(self, context))]
    pub async fn evaluate_access(
        &self,
        role: &str,
        action: &str,
        subject: &str,
        context: Option<&C>,
    ) -> Result<AccessEvaluation> {
        let permissions = match self.resolve_effective(role) {
            Ok(permissions) => permissions,
            Err(Error::UnknownRole { .. }) => {
                debug!("unknown role; denying");
                return Ok(AccessEvaluation::unknown_role());
            }
            Err(err) => return Err(err),
        };

        let wildcard = self.wildcard_enabled();
        let mut faults = Vec::new();
        for (position, permission) in permissions.iter().enumerate() {
            if !permission.matches(action, subject, wildcard) {
                continue;
            }
            match evaluate_condition(permission.condition(), context).await {
                Ok(true) => {
                    debug!(position, "access granted");
                    return Ok(AccessEvaluation {
                        decision: Decision::Allow,
                        granted_by: Some(position),
                        faults,
                        role_known: true,
                    });
                }
                Ok(false) => trace!(position, "condition not satisfied"),
                Err(source) => {
                    warn!(position, error = %source, "condition evaluation failed");
                    faults.push(ConditionEvaluationError {
                        role: RoleName::from_string(role.to_string()),
                        action: permission.action().clone(),
                        subject: permission.subject().clone(),
                        position,
                        source,
                    });
                }
            }
        }

        debug!(faults = faults.len(), "access denied");
        Ok(AccessEvaluation {
            decision: Decision::Deny,
            granted_by: None,
            faults,
            role_known: true,
        })
    }
}

/// Acting role bound to a registry.
///
/// Pass a session to code that needs to check access for the current actor
/// instead of threading the registry and role separately.
pub struct Session<'r, C> {
    registry: &'r RoleRegistry<C>,
    role: RoleName,
}

impl<'r, C> Session<'r, C> {
    /// Creates a session. Unknown roles are accepted and deny every check.
    pub fn new(registry: &'r RoleRegistry<C>, role: RoleName) -> Self {
        Self { registry, role }
    }

    /// Returns the acting role.
    pub fn role(&self) -> &RoleName {
        &self.role
    }

    /// Returns the registry.
    pub fn registry(&self) -> &'r RoleRegistry<C> {
        self.registry
    }

    /// Returns a diagnostic when the acting role is not registered.
    pub fn diagnostic(&self) -> Option<RoleDiagnostic> {
        self.registry.validate_role(self.role.as_str())
    }
}

impl<C> Session<'_, C>
where
    C: Sync,
{
    /// Returns whether the acting role may perform `action` on `subject`.
    pub async fn can(&self, action: &str, subject: &str, context: Option<&C>) -> bool {
        self.registry
            .check_access(self.role.as_str(), action, subject, context)
            .await
    }

    /// Evaluates an access check for the acting role.
    pub async fn evaluate(
        &self,
        action: &str,
        subject: &str,
        context: Option<&C>,
    ) -> Result<AccessEvaluation> {
        self.registry
            .evaluate_access(self.role.as_str(), action, subject, context)
            .await
    }
}

impl<C> Clone for Session<'_, C> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry,
            role: self.role.clone(),
        }
    }
}

impl<C> fmt::Debug for Session<'_, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session").field("role", &self.role).finish()
    }
}
