//! Role-based access checks with role inheritance and conditional grants.
//!
//! A [`RoleRegistry`] is built once from a list of [`Role`]s. Each role grants
//! [`Permission`]s (an action on a subject, optionally guarded by a
//! [`Condition`]) and may inherit the permissions of other roles. Checks are
//! deny-by-default: unknown roles, unmet conditions and failing conditions
//! all deny.
//!
//! The subject `"all"` matches every subject unless disabled with
//! [`RegistryBuilder::enable_wildcard`].
//!
//! Checks are `async` so conditions may await. The crate does not depend on an
//! executor: when all conditions are synchronous the check future is ready on
//! its first poll, and a minimal executor such as `futures::executor::block_on`
//! returns the result immediately, as in the example below.
//!
//! # Examples
//!
//! ```
//! use futures::executor::block_on;
//! use rs_rolecheck::{Permission, Role, RoleRegistry};
//!
//! struct Ctx {
//!     owner_id: u64,
//!     user_id: u64,
//! }
//!
//! let registry = RoleRegistry::build([
//!     Role::named("guest")?.grant(Permission::new("read", "Article")?),
//!     Role::named("editor")?
//!         .grant(
//!             Permission::new("update", "Article")?
//!                 .when(|ctx: &Ctx| ctx.owner_id == ctx.user_id),
//!         )
//!         .inherit_named("guest")?,
//!     Role::named("admin")?.grant(Permission::on_all("manage")?),
//! ])?;
//!
//! let own = Ctx { owner_id: 1, user_id: 1 };
//! assert!(block_on(registry.check_access("editor", "read", "Article", None)));
//! assert!(block_on(registry.check_access("editor", "update", "Article", Some(&own))));
//! assert!(block_on(registry.check_access("admin", "manage", "Dashboard", None)));
//! assert!(!block_on(registry.check_access("ghost", "read", "Article", None)));
//! # Ok::<(), rs_rolecheck::Error>(())
//! ```
#![forbid(unsafe_code)]

mod checker;
mod condition;
mod error;
mod permission;
mod registry;
mod role;
mod types;

#[cfg(feature = "axum")]
pub mod axum;

pub use crate::checker::{AccessEvaluation, Decision, RoleDiagnostic, Session};
pub use crate::condition::{
    AsyncPredicate, Condition, Predicate, TryPredicate, evaluate_condition,
};
pub use crate::error::{ConditionEvaluationError, ConditionFault, Error, Result};
pub use crate::permission::Permission;
pub use crate::registry::{RegistryBuilder, RoleRegistry};
pub use crate::role::Role;
pub use crate::types::{Action, RoleName, Subject};

#[cfg(feature = "serde")]
pub use crate::role::{PermissionDefinition, RoleDefinition};
