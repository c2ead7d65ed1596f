use serde::Serialize;

use crate::rbac::{Permission, Permissions};

/// The authenticated user attached to a request. Lives for one request only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    userid: String,
    permissions: Permissions,
}

impl Principal {
    pub fn new(userid: &str, permissions: Permissions) -> Self {
        Self {
            userid: userid.to_string(),
            permissions,
        }
    }

    pub fn userid(&self) -> &str {
        &self.userid
    }

    pub fn permissions(&self) -> &Permissions {
        &self.permissions
    }

    pub fn has_permission(&self, perm: Permission) -> bool {
        self.permissions.has_permission(perm)
    }
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct PrincipalResp {
    #[serde(rename = "Userid")]
    pub userid: String,
    #[serde(rename = "Permissions")]
    pub permissions: String,
}

impl From<&Principal> for PrincipalResp {
    fn from(principal: &Principal) -> Self {
        Self {
            userid: principal.userid.clone(),
            permissions: principal.permissions.to_string(),
        }
    }
}
