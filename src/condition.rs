use crate::error::ConditionFault;
use async_trait::async_trait;
use std::fmt;
use std::future::Future;

/// Runtime predicate attached to a permission.
///
/// `C` is the context type the embedding application passes to checks, so each
/// deployment gets compile-time checking of the fields its conditions read.
/// Returning `Err` reports a fault: the permission is treated as not granting
/// and the access check continues with the next candidate.
#[async_trait]
pub trait Condition<C>: Send + Sync {
    /// Evaluates the predicate against a context.
    async fn evaluate(&self, context: &C) -> Result<bool, ConditionFault>;
}

/// Synchronous infallible predicate, `Fn(&C) -> bool`.
///
/// Panics are not caught; they propagate out of the access check. Predicates
/// that can fail should return `Err` through [`TryPredicate`] instead, which
/// counts as a fault and lets the check continue.
pub struct Predicate<F>(F);

impl<F> Predicate<F> {
    /// Wraps a closure.
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> fmt::Debug for Predicate<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Predicate")
    }
}

#[async_trait]
impl<C, F> Condition<C> for Predicate<F>
where
    C: Sync,
    F: Fn(&C) -> bool + Send + Sync,
{
    async fn evaluate(&self, context: &C) -> Result<bool, ConditionFault> {
        Ok((self.0)(context))
    }
}

/// Synchronous fallible predicate, `Fn(&C) -> Result<bool, E>`.
pub struct TryPredicate<F>(F);

impl<F> TryPredicate<F> {
    /// Wraps a closure.
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> fmt::Debug for TryPredicate<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TryPredicate")
    }
}

#[async_trait]
impl<C, F, E> Condition<C> for TryPredicate<F>
where
    C: Sync,
    F: Fn(&C) -> Result<bool, E> + Send + Sync,
    E: Into<ConditionFault>,
{
    async fn evaluate(&self, context: &C) -> Result<bool, ConditionFault> {
        (self.0)(context).map_err(Into::into)
    }
}

/// Asynchronous predicate over an owned copy of the context.
///
/// The closure receives a clone of the context so the returned future does not
/// borrow from the caller.
pub struct AsyncPredicate<F>(F);

impl<F> AsyncPredicate<F> {
    /// Wraps a closure returning a future.
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> fmt::Debug for AsyncPredicate<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AsyncPredicate")
    }
}

#[async_trait]
impl<C, F, Fut, E> Condition<C> for AsyncPredicate<F>
where
    C: Clone + Send + Sync,
    F: Fn(C) -> Fut + Send + Sync,
    Fut: Future<Output = Result<bool, E>> + Send,
    E: Into<ConditionFault>,
{
    async fn evaluate(&self, context: &C) -> Result<bool, ConditionFault> {
        (self.0)(context.clone()).await.map_err(Into::into)
    }
}

/// Evaluates an optional condition against an optional context.
///
/// An absent condition always grants. A condition without a context never
/// grants.
pub async fn evaluate_condition<C>(
    condition: Option<&dyn Condition<C>>,
    context: Option<&C>,
) -> Result<bool, ConditionFault>
where
    C: Sync,
{
    match (condition, context) {
        (None, _) => Ok(true),
        (Some(_), None) => Ok(false),
        (Some(condition), Some(context)) => condition.evaluate(context).await,
    }
}
