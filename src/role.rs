use crate::error::Result;
use crate::permission::Permission;
use crate::types::RoleName;
use std::fmt;

/// Named bundle of permissions, optionally inheriting from other roles.
pub struct Role<C> {
    name: RoleName,
    permissions: Vec<Permission<C>>,
    inherits: Vec<RoleName>,
}

impl<C> Role<C> {
    /// Creates a role with no permissions and no parents.
    pub fn new(name: RoleName) -> Self {
        Self {
            name,
            permissions: Vec::new(),
            inherits: Vec::new(),
        }
    }

    /// Creates a role from a name that still needs validation.
    pub fn named(name: impl AsRef<str>) -> Result<Self> {
        Ok(Self::new(RoleName::new(name)?))
    }

    /// Appends a permission. Declaration order is evaluation order.
    pub fn grant(mut self, permission: Permission<C>) -> Self {
        self.permissions.push(permission);
        self
    }

    /// Appends several permissions.
    pub fn grant_all(mut self, permissions: impl IntoIterator<Item = Permission<C>>) -> Self {
        self.permissions.extend(permissions);
        self
    }

    /// Appends a parent role. Parents are resolved in the order they are added.
    pub fn inherit(mut self, parent: RoleName) -> Self {
        self.inherits.push(parent);
        self
    }

    /// Appends a parent role from a name that still needs validation.
    pub fn inherit_named(self, parent: impl AsRef<str>) -> Result<Self> {
        Ok(self.inherit(RoleName::new(parent)?))
    }

    /// Returns the role name.
    pub fn name(&self) -> &RoleName {
        &self.name
    }

    /// Returns the role's own permissions in declaration order.
    pub fn permissions(&self) -> &[Permission<C>] {
        &self.permissions
    }

    /// Returns the direct parent roles.
    pub fn inherits(&self) -> &[RoleName] {
        &self.inherits
    }
}

impl<C> Clone for Role<C> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            permissions: self.permissions.clone(),
            inherits: self.inherits.clone(),
        }
    }
}

impl<C> fmt::Debug for Role<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Role")
            .field("name", &self.name)
            .field("permissions", &self.permissions)
            .field("inherits", &self.inherits)
            .finish()
    }
}

#[cfg(feature = "serde")]
pub use self::definition::{PermissionDefinition, RoleDefinition};

#[cfg(feature = "serde")]
mod definition {
    use super::Role;
    use crate::error::{Error, Result};
    use crate::permission::Permission;
    use crate::types::RoleName;

    /// Declarative role record as found in configuration files.
    ///
    /// Conditions are code and cannot be declared here; attach them to the
    /// converted [`Role`] if needed.
    #[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
    #[serde(deny_unknown_fields)]
    pub struct RoleDefinition {
        /// Role name.
        pub name: String,
        /// Permissions in evaluation order.
        #[serde(default)]
        pub permissions: Vec<PermissionDefinition>,
        /// Parent role names.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        pub inherits: Vec<String>,
    }

    /// Declarative permission record. `subject` is required; use `"all"` for
    /// every subject.
    #[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
    #[serde(deny_unknown_fields)]
    pub struct PermissionDefinition {
        /// Action name.
        pub action: String,
        /// Subject name or `"all"`.
        pub subject: String,
    }

    impl<C> TryFrom<PermissionDefinition> for Permission<C> {
        type Error = Error;

        fn try_from(value: PermissionDefinition) -> Result<Self> {
            Permission::new(&value.action, &value.subject)
        }
    }

    impl<C> TryFrom<RoleDefinition> for Role<C> {
        type Error = Error;

        fn try_from(value: RoleDefinition) -> Result<Self> {
            let mut role = Role::new(RoleName::new(&value.name)?);
            for permission in value.permissions {
                role = role.grant(Permission::try_from(permission)?);
            }
            for parent in value.inherits {
                role = role.inherit_named(&parent)?;
            }
            Ok(role)
        }
    }
}
