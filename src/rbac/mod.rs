use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

pub mod guards;
pub mod middleware;

const PERMISSION_SEPARATOR: char = ' ';

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Permission {
    CanEdit,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::CanEdit => "edit",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "edit" => Some(Permission::CanEdit),
            _ => None,
        }
    }
}

/// The set of capabilities granted to a user, stored in the password file as
/// a space-separated string such as `"edit"`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Permissions(BTreeSet<Permission>);

impl Permissions {
    pub fn none() -> Self {
        Self::default()
    }

    /// Unknown names are skipped.
    pub fn parse(s: &str) -> Self {
        let perms = s
            .split(PERMISSION_SEPARATOR)
            .filter(|name| !name.is_empty())
            .filter_map(|name| {
                let perm = Permission::from_name(name);
                if perm.is_none() {
                    log::warn!("ignoring unknown permission '{}'", name);
                }
                perm
            })
            .collect();
        Self(perms)
    }

    pub fn has_permission(&self, perm: Permission) -> bool {
        self.0.contains(&perm)
    }
}

impl fmt::Display for Permissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut sep = "";
        for perm in &self.0 {
            write!(f, "{}{}", sep, perm.as_str())?;
            sep = " ";
        }
        Ok(())
    }
}

impl FromIterator<Permission> for Permissions {
    fn from_iter<I: IntoIterator<Item = Permission>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
