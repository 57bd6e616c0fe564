use crate::condition::{AsyncPredicate, Condition, Predicate, TryPredicate};
use crate::error::{ConditionFault, Result};
use crate::types::{Action, Subject};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Grant of one action on one subject, with an optional runtime condition.
pub struct Permission<C> {
    action: Action,
    subject: Subject,
    condition: Option<Arc<dyn Condition<C>>>,
}

impl<C> Permission<C> {
    /// Creates an unconditional permission from validated names.
    pub fn new(action: impl AsRef<str>, subject: impl AsRef<str>) -> Result<Self> {
        Ok(Self::from_parts(Action::new(action)?, Subject::new(subject)?))
    }

    /// Creates an unconditional permission from already-built names.
    pub fn from_parts(action: Action, subject: Subject) -> Self {
        Self {
            action,
            subject,
            condition: None,
        }
    }

    /// Creates a permission on the wildcard subject.
    pub fn on_all(action: impl AsRef<str>) -> Result<Self> {
        Ok(Self::from_parts(Action::new(action)?, Subject::all()))
    }

    /// Attaches a condition, replacing any previous one.
    pub fn with_condition(mut self, condition: impl Condition<C> + 'static) -> Self {
        self.condition = Some(Arc::new(condition));
        self
    }

    /// Attaches a synchronous predicate.
    ///
    /// The predicate cannot report a fault: a panic inside it unwinds through
    /// the access check and ends the scan. Use [`when_try`](Self::when_try)
    /// when the predicate can fail and the check should move on to the next
    /// candidate.
    pub fn when<F>(self, predicate: F) -> Self
    where
        C: Sync,
        F: Fn(&C) -> bool + Send + Sync + 'static,
    {
        self.with_condition(Predicate::new(predicate))
    }

    /// Attaches a synchronous predicate that may fail.
    pub fn when_try<F, E>(self, predicate: F) -> Self
    where
        C: Sync,
        F: Fn(&C) -> std::result::Result<bool, E> + Send + Sync + 'static,
        E: Into<ConditionFault> + 'static,
    {
        self.with_condition(TryPredicate::new(predicate))
    }

    /// Attaches an asynchronous predicate receiving a clone of the context.
    pub fn when_async<F, Fut, E>(self, predicate: F) -> Self
    where
        C: Clone + Send + Sync,
        F: Fn(C) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<bool, E>> + Send + 'static,
        E: Into<ConditionFault> + 'static,
    {
        self.with_condition(AsyncPredicate::new(predicate))
    }

    /// Returns the action.
    pub fn action(&self) -> &Action {
        &self.action
    }

    /// Returns the subject.
    pub fn subject(&self) -> &Subject {
        &self.subject
    }

    /// Returns the attached condition, if any.
    pub fn condition(&self) -> Option<&dyn Condition<C>> {
        self.condition.as_deref()
    }

    /// Returns whether a condition is attached.
    pub fn is_conditional(&self) -> bool {
        self.condition.is_some()
    }

    /// Structural match against an action/subject pair, ignoring the condition.
    pub fn matches(&self, action: &str, subject: &str, enable_wildcard: bool) -> bool {
        permission_matches(self, action, subject, enable_wildcard)
    }
}

impl<C> Clone for Permission<C> {
    fn clone(&self) -> Self {
        Self {
            action: self.action.clone(),
            subject: self.subject.clone(),
            condition: self.condition.clone(),
        }
    }
}

impl<C> fmt::Debug for Permission<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Permission")
            .field("action", &self.action)
            .field("subject", &self.subject)
            .field("conditional", &self.is_conditional())
            .finish()
    }
}

impl<C> fmt::Display for Permission<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on {}", self.action, self.subject)?;
        if self.is_conditional() {
            f.write_str(" (conditional)")?;
        }
        Ok(())
    }
}

/// Two permissions are the same grant when they share action, subject and the
/// identical condition instance.
impl<C> PartialEq for Permission<C> {
    fn eq(&self, other: &Self) -> bool {
        let same_condition = match (&self.condition, &other.condition) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        };
        self.action == other.action && self.subject == other.subject && same_condition
    }
}

pub(crate) fn permission_matches<C>(
    granted: &Permission<C>,
    action: &str,
    subject: &str,
    enable_wildcard: bool,
) -> bool {
    if granted.action.as_str() != action {
        return false;
    }
    if enable_wildcard && granted.subject.is_wildcard() {
        return true;
    }
    granted.subject.as_str() == subject
}
