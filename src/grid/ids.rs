//! Node and Group Identifiers
//!
//! Opaque string identifiers. An empty or blank identifier stands for an
//! absent one and is rejected at every registry entry point.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

macro_rules! grid_id {
    ($(#[$meta:meta])* $name:ident, $what:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(name: impl Into<String>) -> Self {
                Self(name.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Reject absent (empty or blank) identifiers
            pub fn validate(&self) -> Result<()> {
                if self.0.trim().is_empty() {
                    return Err(Error::InvalidArgument(
                        concat!($what, " identifier must not be empty").to_string(),
                    ));
                }
                Ok(())
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<&String> for $name {
            fn from(s: &String) -> Self {
                Self(s.clone())
            }
        }

        impl From<&$name> for $name {
            fn from(id: &$name) -> Self {
                id.clone()
            }
        }
    };
}

grid_id!(
    /// Unique identifier for a node
    NodeId,
    "Node"
);

grid_id!(
    /// Unique identifier for a group
    GroupId,
    "Group"
);
