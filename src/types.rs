use crate::error::{Error, Result};
use std::borrow::Borrow;
use std::fmt;

const MAX_NAME_LEN: usize = 128;

fn validate_name(value: &str, kind: &str) -> Result<String> {
    if value.is_empty() {
        return Err(Error::InvalidName(format!("{kind} must not be empty")));
    }
    if value.trim() != value {
        return Err(Error::InvalidName(format!(
            "{kind} must not have leading or trailing whitespace"
        )));
    }
    if value.len() > MAX_NAME_LEN {
        return Err(Error::InvalidName(format!(
            "{kind} length must be <= {MAX_NAME_LEN}"
        )));
    }
    if value.chars().any(char::is_control) {
        return Err(Error::InvalidName(format!(
            "{kind} contains control characters"
        )));
    }
    Ok(value.to_string())
}

macro_rules! define_name_type {
    ($(#[$doc:meta])* $name:ident, $kind:expr) => {
        $(#[$doc])*
        #[derive(Clone, Debug, Eq, PartialEq, Hash)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        #[cfg_attr(feature = "serde", serde(transparent))]
        pub struct $name(String);

        impl $name {
            /// Creates a validated name.
            pub fn new(value: impl AsRef<str>) -> Result<Self> {
                validate_name(value.as_ref(), $kind).map(Self)
            }

            /// Creates a name from a trusted string without validation.
            pub fn from_string(value: String) -> Self {
                Self(value)
            }

            /// Returns the underlying string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl TryFrom<&str> for $name {
            type Error = Error;

            fn try_from(value: &str) -> Result<Self> {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self::from_string(value)
            }
        }
    };
}

define_name_type!(
    /// Role name, unique within a registry.
    RoleName,
    "role name"
);
define_name_type!(
    /// Action name such as `read` or `update`.
    Action,
    "action"
);
define_name_type!(
    /// Subject (resource kind) such as `Article`.
    ///
    /// The reserved value [`Subject::ALL`] matches every subject.
    Subject,
    "subject"
);

impl Subject {
    /// Reserved wildcard subject literal.
    pub const ALL: &'static str = "all";

    /// Returns the wildcard subject.
    pub fn all() -> Self {
        Self(Self::ALL.to_string())
    }

    /// Returns whether this is the wildcard subject.
    pub fn is_wildcard(&self) -> bool {
        self.0 == Self::ALL
    }
}
