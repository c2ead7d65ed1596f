use serde::{Deserialize, Serialize};

use crate::models::user::Principal;

// Missing fields deserialize as empty so that an incomplete form is rejected
// by the nonce check (401) rather than by the extractor (400).
#[derive(Debug, Default, Deserialize, PartialEq)]
pub(crate) struct LoginForm {
    #[serde(default)]
    pub userid: String,
    #[serde(default)]
    pub nonce: String,
    #[serde(default)]
    pub time: String, // decimal seconds since the epoch
}

impl LoginForm {
    /// Fills the fields left empty in `self` from `fallback`.
    pub fn or(self, fallback: LoginForm) -> Self {
        let pick = |value: String, fallback: String| if value.is_empty() { fallback } else { value };
        Self {
            userid: pick(self.userid, fallback.userid),
            nonce: pick(self.nonce, fallback.nonce),
            time: pick(self.time, fallback.time),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub(crate) struct LoginStatus {
    #[serde(rename = "LoggedIn")]
    pub logged_in: bool,
    #[serde(rename = "Permissions", skip_serializing_if = "Option::is_none", default)]
    pub permissions: Option<String>,
}

impl LoginStatus {
    pub fn logged_in(principal: &Principal) -> Self {
        Self {
            logged_in: true,
            permissions: Some(principal.permissions().to_string()),
        }
    }

    pub fn logged_out() -> Self {
        Self {
            logged_in: false,
            permissions: None,
        }
    }
}
