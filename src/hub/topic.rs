// ABOUTME: Validated path-like names used for hub topics and HTTP endpoint roots
// Both follow /segment(/segment)* and are rejected at configuration time when malformed

use crate::error::{Result, ShellError};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

lazy_static! {
    static ref PATH_PATTERN: Regex =
        Regex::new(r"^/[A-Za-z0-9_]+(/[A-Za-z0-9_]+)*$").expect("path pattern is a valid regex");
}

/// Returns true when `value` is a `/segment(/segment)*` path
pub fn is_valid_path(value: &str) -> bool {
    PATH_PATTERN.is_match(value)
}

fn validate(field: &'static str, value: &str) -> Result<String> {
    if is_valid_path(value) {
        Ok(value.to_string())
    } else {
        Err(ShellError::InvalidPath {
            field,
            value: value.to_string(),
        })
    }
}

macro_rules! validated_path {
    ($(#[$meta:meta])* $name:ident, $field:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            pub fn parse(value: &str) -> Result<Self> {
                validate($field, value).map(Self)
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ShellError;

            fn try_from(value: String) -> Result<Self> {
                Self::parse(&value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

validated_path!(
    /// Name of a publish/subscribe channel on the hub
    Topic,
    "topic"
);

validated_path!(
    /// URL path prefix under which a provider's HTTP endpoints live
    RootPath,
    "root"
);

impl RootPath {
    /// Appends a fixed suffix such as `/login` to the root
    pub fn join(&self, suffix: &str) -> String {
        format!("{}{}", self.0, suffix)
    }
}
