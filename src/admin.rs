// Offline password file maintenance, run from the command line instead of
// starting the server.

use std::path::Path;

use crate::models::credentials::{CredentialStore, CredentialStoreError};

pub fn create_password_file(path: &Path) -> Result<(), CredentialStoreError> {
    CredentialStore::create(path).map(|_| ())
}

/// Sets `userid`'s password, and optionally its permissions, in an existing
/// password file.
pub fn update_password(
    path: &Path,
    userid: &str,
    password: &str,
    permissions: Option<&str>,
) -> Result<(), CredentialStoreError> {
    let store = CredentialStore::open(path)?;
    store.update_user(userid, password, permissions)
}
