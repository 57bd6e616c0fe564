use crate::error::{Error, Result};
use crate::permission::Permission;
use crate::role::Role;
use crate::types::RoleName;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// Immutable set of roles with lazily flattened, memoized inheritance.
///
/// The registry is `Send + Sync`; any number of checks may run against it
/// concurrently.
pub struct RoleRegistry<C> {
    entries: Vec<RoleEntry<C>>,
    index: HashMap<RoleName, usize>,
    enable_wildcard: bool,
    max_inherit_depth: Option<usize>,
}

struct RoleEntry<C> {
    role: Role<C>,
    parents: Vec<usize>,
    effective: OnceLock<Arc<[Permission<C>]>>,
}

// One role being flattened: parents still to visit and permissions so far.
struct Frame<'a, C> {
    index: usize,
    parents: std::slice::Iter<'a, usize>,
    permissions: Vec<Permission<C>>,
}

/// Builder for [`RoleRegistry`].
pub struct RegistryBuilder<C> {
    roles: Vec<Role<C>>,
    enable_wildcard: bool,
    max_inherit_depth: Option<usize>,
    eager_cycle_check: bool,
}

impl<C> Default for RegistryBuilder<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> RegistryBuilder<C> {
    /// Creates a new builder with default configuration.
    pub fn new() -> Self {
        Self {
            roles: Vec::new(),
            enable_wildcard: true,
            max_inherit_depth: None,
            eager_cycle_check: true,
        }
    }

    /// Adds a role.
    pub fn role(mut self, role: Role<C>) -> Self {
        self.roles.push(role);
        self
    }

    /// Adds several roles.
    pub fn roles(mut self, roles: impl IntoIterator<Item = Role<C>>) -> Self {
        self.roles.extend(roles);
        self
    }

    /// Enables or disables the `"all"` wildcard subject.
    ///
    /// When disabled, `"all"` is compared like any other subject.
    pub fn enable_wildcard(mut self, on: bool) -> Self {
        self.enable_wildcard = on;
        self
    }

    /// Limits how many inheritance levels may sit below any role.
    ///
    /// Unlimited by default. With a limit set, [`build`](Self::build) checks
    /// the whole hierarchy up front, cycles included, and fails with
    /// [`Error::InheritanceDepthExceeded`] naming the first role whose chain is
    /// too long. A registry that builds therefore never hits the limit while
    /// resolving.
    pub fn max_inherit_depth(mut self, depth: usize) -> Self {
        self.max_inherit_depth = Some(depth);
        self
    }

    /// Enables or disables cycle detection at build time.
    ///
    /// When disabled, cycles are reported by the first resolution that walks
    /// into them, unless a depth limit is set.
    pub fn eager_cycle_check(mut self, on: bool) -> Self {
        self.eager_cycle_check = on;
        self
    }

    /// Validates the roles and builds the registry.
    pub fn build(self) -> Result<RoleRegistry<C>> {
        let mut index = HashMap::with_capacity(self.roles.len());
        for (position, role) in self.roles.iter().enumerate() {
            if index.insert(role.name().clone(), position).is_some() {
                return Err(Error::DuplicateRole {
                    role: role.name().clone(),
                });
            }
        }

        let mut entries = Vec::with_capacity(self.roles.len());
        for role in self.roles {
            let parents = role
                .inherits()
                .iter()
                .map(|parent| {
                    index
                        .get(parent)
                        .copied()
                        .ok_or_else(|| Error::UnknownParentRole {
                            parent: parent.clone(),
                            role: role.name().clone(),
                        })
                })
                .collect::<Result<Vec<_>>>()?;
            entries.push(RoleEntry {
                role,
                parents,
                effective: OnceLock::new(),
            });
        }

        let registry = RoleRegistry {
            entries,
            index,
            enable_wildcard: self.enable_wildcard,
            max_inherit_depth: self.max_inherit_depth,
        };
        if self.eager_cycle_check || registry.max_inherit_depth.is_some() {
            registry.check_hierarchy()?;
        }
        debug!(roles = registry.entries.len(), "role registry built");
        Ok(registry)
    }
}

impl<C> RoleRegistry<C> {
    /// Builds a registry with default configuration.
    pub fn build(roles: impl IntoIterator<Item = Role<C>>) -> Result<Self> {
        RegistryBuilder::new().roles(roles).build()
    }

    /// Returns a builder.
    pub fn builder() -> RegistryBuilder<C> {
        RegistryBuilder::new()
    }

    /// Builds a registry from declarative role records.
    #[cfg(feature = "serde")]
    pub fn from_definitions(
        definitions: impl IntoIterator<Item = crate::role::RoleDefinition>,
    ) -> Result<Self> {
        let roles = definitions
            .into_iter()
            .map(Role::try_from)
            .collect::<Result<Vec<_>>>()?;
        Self::build(roles)
    }

    /// Number of registered roles.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether no roles are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns whether a role is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Returns a registered role.
    pub fn role(&self, name: &str) -> Option<&Role<C>> {
        self.index.get(name).map(|&i| &self.entries[i].role)
    }

    /// Iterates role names in registration order.
    pub fn role_names(&self) -> impl Iterator<Item = &RoleName> {
        self.entries.iter().map(|entry| entry.role.name())
    }

    /// Returns whether the `"all"` subject acts as a wildcard.
    pub fn wildcard_enabled(&self) -> bool {
        self.enable_wildcard
    }

    /// Returns the configured inheritance depth limit.
    pub fn max_inherit_depth(&self) -> Option<usize> {
        self.max_inherit_depth
    }

    /// Returns the effective permission set of a role.
    ///
    /// The role's own permissions come first, then each parent's effective set
    /// in `inherits` order. Duplicates are kept. The result is computed once
    /// per role and shared afterwards.
    pub fn resolve_effective(&self, name: &str) -> Result<Arc<[Permission<C>]>> {
        let Some(&index) = self.index.get(name) else {
            return Err(Error::UnknownRole {
                role: RoleName::from_string(name.to_string()),
            });
        };
        if let Some(cached) = self.entries[index].effective.get() {
            return Ok(Arc::clone(cached));
        }
        self.flatten(index)
    }

    fn flatten(&self, root: usize) -> Result<Arc<[Permission<C>]>> {
        let mut effective: Arc<[Permission<C>]> = Arc::from(Vec::new());
        let mut stack = vec![self.frame(root)];

        while let Some(mut frame) = stack.pop() {
            if let Some(&parent) = frame.parents.next() {
                if let Some(cached) = self.entries[parent].effective.get() {
                    frame.permissions.extend(cached.iter().cloned());
                    stack.push(frame);
                    continue;
                }

                stack.push(frame);
                if let Some(start) = stack.iter().position(|open| open.index == parent) {
                    let path: Vec<usize> = stack[start..].iter().map(|open| open.index).collect();
                    return Err(self.cycle_error(&path, parent));
                }
                stack.push(self.frame(parent));
                continue;
            }

            let entry = &self.entries[frame.index];
            debug!(
                role = %entry.role.name(),
                permissions = frame.permissions.len(),
                "resolved effective permissions"
            );
            effective = Arc::clone(
                entry
                    .effective
                    .get_or_init(|| Arc::from(frame.permissions)),
            );
            if let Some(child) = stack.last_mut() {
                child.permissions.extend(effective.iter().cloned());
            }
        }

        Ok(effective)
    }

    fn frame(&self, index: usize) -> Frame<'_, C> {
        let entry = &self.entries[index];
        Frame {
            index,
            parents: entry.parents.iter(),
            permissions: entry.role.permissions().to_vec(),
        }
    }

    // Walks every role once: rejects cycles and, when a limit is set, chains
    // deeper than `max_inherit_depth`.
    fn check_hierarchy(&self) -> Result<()> {
        let mut heights = vec![None; self.entries.len()];
        for root in 0..self.entries.len() {
            if heights[root].is_some() {
                continue;
            }
            self.check_hierarchy_from(root, &mut heights)?;
        }
        Ok(())
    }

    fn check_hierarchy_from(&self, root: usize, heights: &mut [Option<usize>]) -> Result<()> {
        let mut visiting = HashSet::new();
        visiting.insert(root);
        let mut stack: Vec<(usize, std::slice::Iter<'_, usize>)> =
            vec![(root, self.entries[root].parents.iter())];

        while let Some((current, mut iter)) = stack.pop() {
            if let Some(&parent) = iter.next() {
                stack.push((current, iter));

                if visiting.contains(&parent) {
                    let path: Vec<usize> = stack.iter().map(|(role, _)| *role).collect();
                    let start = path
                        .iter()
                        .position(|&role| role == parent)
                        .unwrap_or_default();
                    return Err(self.cycle_error(&path[start..], parent));
                }
                if heights[parent].is_some() {
                    continue;
                }

                visiting.insert(parent);
                stack.push((parent, self.entries[parent].parents.iter()));
                continue;
            }

            let height = self.entries[current]
                .parents
                .iter()
                .filter_map(|&parent| heights[parent])
                .map(|below| below + 1)
                .max()
                .unwrap_or(0);
            if let Some(max_depth) = self.max_inherit_depth.filter(|&max| height > max) {
                return Err(Error::InheritanceDepthExceeded {
                    role: self.entries[current].role.name().clone(),
                    max_depth,
                });
            }
            visiting.remove(&current);
            heights[current] = Some(height);
        }

        Ok(())
    }

    fn cycle_error(&self, path: &[usize], repeated: usize) -> Error {
        let mut cycle: Vec<RoleName> = path
            .iter()
            .map(|&i| self.entries[i].role.name().clone())
            .collect();
        cycle.push(self.entries[repeated].role.name().clone());
        Error::InheritanceCycle { cycle }
    }
}

impl<C> fmt::Debug for RoleRegistry<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoleRegistry")
            .field("roles", &self.role_names().collect::<Vec<_>>())
            .field("enable_wildcard", &self.enable_wildcard)
            .field("max_inherit_depth", &self.max_inherit_depth)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn role(name: &str) -> Role<()> {
        Role::named(name).unwrap()
    }

    fn perm(action: &str, subject: &str) -> Permission<()> {
        Permission::new(action, subject).unwrap()
    }

    fn names(cycle: &[RoleName]) -> Vec<&str> {
        cycle.iter().map(RoleName::as_str).collect()
    }

    fn described(perms: &[Permission<()>]) -> Vec<String> {
        perms
            .iter()
            .map(|p| format!("{}:{}", p.action(), p.subject()))
            .collect()
    }

    #[test]
    fn build_should_reject_duplicate_names() {
        let result = RoleRegistry::build([role("admin"), role("editor"), role("admin")]);

        let Err(Error::DuplicateRole { role }) = result else {
            panic!("expected duplicate role error");
        };
        assert_eq!(role.as_str(), "admin");
    }

    #[test]
    fn build_should_reject_unknown_parent() {
        let viewer = role("viewer").inherit_named("guest").unwrap();
        let result = RoleRegistry::build([viewer]);

        let Err(Error::UnknownParentRole { parent, role }) = result else {
            panic!("expected unknown parent error");
        };
        assert_eq!(parent.as_str(), "guest");
        assert_eq!(role.as_str(), "viewer");
    }

    #[test]
    fn build_should_detect_cycle_eagerly() {
        let a = role("a").inherit_named("b").unwrap();
        let b = role("b").inherit_named("a").unwrap();

        let Err(Error::InheritanceCycle { cycle }) = RoleRegistry::build([a, b]) else {
            panic!("expected cycle error");
        };
        assert_eq!(names(&cycle), ["a", "b", "a"]);
    }

    #[test]
    fn build_should_detect_self_inheritance() {
        let a = role("a").inherit_named("a").unwrap();

        let Err(Error::InheritanceCycle { cycle }) = RoleRegistry::build([a]) else {
            panic!("expected cycle error");
        };
        assert_eq!(names(&cycle), ["a", "a"]);
    }

    #[test]
    fn build_should_name_only_the_cycle_members() {
        let root = role("root").inherit_named("x").unwrap();
        let x = role("x").inherit_named("y").unwrap();
        let y = role("y").inherit_named("x").unwrap();

        let Err(Error::InheritanceCycle { cycle }) = RoleRegistry::build([root, x, y]) else {
            panic!("expected cycle error");
        };
        assert_eq!(names(&cycle), ["x", "y", "x"]);
    }

    #[test]
    fn resolve_should_detect_cycle_lazily_when_eager_check_disabled() {
        let a = role("a").inherit_named("b").unwrap();
        let b = role("b").inherit_named("a").unwrap();
        let registry = RegistryBuilder::new()
            .roles([a, b])
            .eager_cycle_check(false)
            .build()
            .expect("lazy registry builds");

        let Err(Error::InheritanceCycle { cycle }) = registry.resolve_effective("b") else {
            panic!("expected cycle error");
        };
        assert_eq!(names(&cycle), ["b", "a", "b"]);
        assert!(matches!(
            registry.resolve_effective("a"),
            Err(Error::InheritanceCycle { .. })
        ));
    }

    #[test]
    fn resolve_should_return_own_permissions_without_parents() {
        let guest = role("guest")
            .grant(perm("read", "Article"))
            .grant(perm("read", "Comment"));
        let registry = RoleRegistry::build([guest]).unwrap();

        let effective = registry.resolve_effective("guest").unwrap();
        assert_eq!(described(&effective), ["read:Article", "read:Comment"]);
    }

    #[test]
    fn resolve_should_append_parents_depth_first_in_order() {
        let base = role("base").grant(perm("read", "Article"));
        let commenter = role("commenter")
            .grant(perm("create", "Comment"))
            .inherit_named("base")
            .unwrap();
        let author = role("author").grant(perm("create", "Article"));
        let editor = role("editor")
            .grant(perm("update", "Article"))
            .inherit_named("commenter")
            .unwrap()
            .inherit_named("author")
            .unwrap();
        let registry = RoleRegistry::build([base, commenter, author, editor]).unwrap();

        let effective = registry.resolve_effective("editor").unwrap();
        assert_eq!(
            described(&effective),
            [
                "update:Article",
                "create:Comment",
                "read:Article",
                "create:Article"
            ]
        );
    }

    #[test]
    fn resolve_should_keep_duplicates_from_diamonds() {
        let base = role("base").grant(perm("read", "Article"));
        let left = role("left").inherit_named("base").unwrap();
        let right = role("right").inherit_named("base").unwrap();
        let top = role("top")
            .inherit_named("left")
            .unwrap()
            .inherit_named("right")
            .unwrap();
        let registry = RoleRegistry::build([base, left, right, top]).unwrap();

        let effective = registry.resolve_effective("top").unwrap();
        assert_eq!(described(&effective), ["read:Article", "read:Article"]);
    }

    #[test]
    fn resolve_should_memoize_per_role() {
        let guest = role("guest").grant(perm("read", "Article"));
        let viewer = role("viewer").inherit_named("guest").unwrap();
        let registry = RoleRegistry::build([guest, viewer]).unwrap();

        let first = registry.resolve_effective("viewer").unwrap();
        let second = registry.resolve_effective("viewer").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(registry.entries[0].effective.get().is_some());
    }

    #[test]
    fn resolve_should_reject_unknown_role() {
        let registry = RoleRegistry::build([role("guest")]).unwrap();

        let Err(Error::UnknownRole { role }) = registry.resolve_effective("ghost") else {
            panic!("expected unknown role error");
        };
        assert_eq!(role.as_str(), "ghost");
    }

    fn chain(len: usize) -> Vec<Role<()>> {
        let mut roles = vec![role("r0").grant(perm("read", "Article"))];
        for i in 1..len {
            roles.push(
                role(&format!("r{i}"))
                    .inherit_named(format!("r{}", i - 1))
                    .unwrap(),
            );
        }
        roles
    }

    #[test]
    fn resolve_should_follow_deep_chains_without_limit() {
        let registry = RoleRegistry::build(chain(20)).unwrap();

        assert_eq!(registry.max_inherit_depth(), None);
        let effective = registry.resolve_effective("r19").unwrap();
        assert_eq!(described(&effective), ["read:Article"]);
    }

    #[test]
    fn resolve_should_not_overflow_on_very_long_chains() {
        let registry = RegistryBuilder::new()
            .roles(chain(50_000))
            .eager_cycle_check(false)
            .build()
            .unwrap();

        let effective = registry.resolve_effective("r49999").unwrap();
        assert_eq!(described(&effective), ["read:Article"]);
    }

    #[test]
    fn build_should_enforce_max_depth() {
        let a = role("a").inherit_named("b").unwrap();
        let b = role("b").inherit_named("c").unwrap();
        let c = role("c").grant(perm("read", "Article"));
        let result = RegistryBuilder::new()
            .roles([a, b, c])
            .max_inherit_depth(1)
            .build();

        let Err(Error::InheritanceDepthExceeded { role, max_depth }) = result else {
            panic!("expected depth error");
        };
        assert_eq!(role.as_str(), "a");
        assert_eq!(max_depth, 1);
    }

    #[test]
    fn build_should_accept_chain_at_max_depth() {
        let registry = RegistryBuilder::new()
            .roles(chain(17))
            .max_inherit_depth(16)
            .build()
            .unwrap();

        assert_eq!(registry.max_inherit_depth(), Some(16));
        assert_eq!(registry.resolve_effective("r16").unwrap().len(), 1);
    }

    #[test]
    fn depth_limit_should_check_cycles_even_when_lazy() {
        let a = role("a").inherit_named("b").unwrap();
        let b = role("b").inherit_named("a").unwrap();
        let result = RegistryBuilder::new()
            .roles([a, b])
            .eager_cycle_check(false)
            .max_inherit_depth(4)
            .build();

        assert!(matches!(result, Err(Error::InheritanceCycle { .. })));
    }

    #[test]
    fn accessors_should_expose_registered_roles() {
        let registry = RoleRegistry::build([role("admin"), role("guest")]).unwrap();

        assert_eq!(registry.len(), 2);
        assert!(!registry.is_empty());
        assert!(registry.contains("guest"));
        assert!(!registry.contains("ghost"));
        assert_eq!(registry.role("admin").unwrap().name().as_str(), "admin");
        let listed: Vec<&str> = registry.role_names().map(RoleName::as_str).collect();
        assert_eq!(listed, ["admin", "guest"]);
        assert!(registry.wildcard_enabled());
    }

    #[test]
    fn registry_should_be_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RoleRegistry<()>>();
    }
}
