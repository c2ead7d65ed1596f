use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::{Mutex, RwLock};
use thiserror::Error;

use super::crypto::derive_digest;
use super::password_file;
use super::user::Principal;
use crate::rbac::Permissions;

#[derive(Debug, Error)]
pub enum CredentialStoreError {
    #[error("password file {} does not exist", .0.display())]
    StoreAbsent(PathBuf),
    #[error("error reading password file {}: {source}", .path.display())]
    StoreUnreadable { path: PathBuf, source: io::Error },
    #[error("password file {} is corrupt at line {line}: {reason}", .path.display())]
    StoreCorrupt {
        path: PathBuf,
        line: usize,
        reason: String,
    },
    #[error("password file {} already exists", .0.display())]
    AlreadyExists(PathBuf),
    #[error("{stage} {}: {source}", .path.display())]
    PersistenceFailure {
        stage: String,
        path: PathBuf,
        source: io::Error,
    },
    #[error("no password on record for user {0}")]
    UnknownUser(String),
    #[error("userid must not be empty")]
    EmptyUserid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    pub userid: String,
    pub digest: String,
    pub permissions: String,
}

// A record with an empty userid cannot be read back from the file.
fn check_userid(userid: &str) -> Result<(), CredentialStoreError> {
    if userid.is_empty() {
        return Err(CredentialStoreError::EmptyUserid);
    }
    Ok(())
}

/// In-memory mirror of a password file: the records in file order plus an
/// index from userid to the record that wins for that user.
#[derive(Debug, Default, Clone)]
pub struct Credentials {
    records: Vec<CredentialRecord>,
    index: HashMap<String, usize>,
}

impl Credentials {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_records(records: Vec<CredentialRecord>) -> Self {
        // later duplicates overwrite earlier ones: last write wins
        let index = records
            .iter()
            .enumerate()
            .map(|(i, record)| (record.userid.clone(), i))
            .collect();
        Self { records, index }
    }

    pub fn load(path: &Path) -> Result<Self, CredentialStoreError> {
        Ok(Self::from_records(password_file::read(path)?))
    }

    pub fn save(&self, path: &Path) -> Result<(), CredentialStoreError> {
        password_file::write(path, &self.records)
    }

    pub fn records(&self) -> &[CredentialRecord] {
        &self.records
    }

    pub fn user_count(&self) -> usize {
        self.records.len()
    }

    pub fn user(&self, userid: &str) -> Option<&CredentialRecord> {
        self.index.get(userid).map(|&i| &self.records[i])
    }

    /// `None` means no credential is on record for `userid`.
    pub fn digest(&self, userid: &str) -> Option<&str> {
        self.user(userid).map(|record| record.digest.as_str())
    }

    /// Updates the user's record in place, or appends a new one.
    pub fn set_digest(&mut self, userid: &str, digest: &str) -> Result<(), CredentialStoreError> {
        check_userid(userid)?;
        match self.index.get(userid) {
            Some(&i) => self.records[i].digest = digest.to_string(),
            None => self.push(CredentialRecord {
                userid: userid.to_string(),
                digest: digest.to_string(),
                permissions: String::new(),
            }),
        }
        Ok(())
    }

    pub fn set_permissions(&mut self, userid: &str, permissions: &str) -> Result<(), CredentialStoreError> {
        check_userid(userid)?;
        let i = *self
            .index
            .get(userid)
            .ok_or_else(|| CredentialStoreError::UnknownUser(userid.to_string()))?;
        self.records[i].permissions = permissions.to_string();
        Ok(())
    }

    fn push(&mut self, record: CredentialRecord) {
        self.index.insert(record.userid.clone(), self.records.len());
        self.records.push(record);
    }
}

/// Process-wide credential store bound to one password file.
///
/// Saves are serialized by `save_lock`, always taken before `credentials`.
pub struct CredentialStore {
    path: PathBuf,
    credentials: RwLock<Credentials>,
    save_lock: Mutex<()>,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>, credentials: Credentials) -> Self {
        Self {
            path: path.into(),
            credentials: RwLock::new(credentials),
            save_lock: Mutex::new(()),
        }
    }

    /// Loads an existing password file.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, CredentialStoreError> {
        let path = path.into();
        let credentials = Credentials::load(&path)?;
        log::info!(
            "loaded {} password records from {}",
            credentials.user_count(),
            path.display()
        );
        Ok(Self::new(path, credentials))
    }

    /// Loads the password file, creating an empty one if it is absent.
    pub fn open_or_create(path: impl Into<PathBuf>) -> Result<Self, CredentialStoreError> {
        let path = path.into();
        match Self::open(path.clone()) {
            Err(CredentialStoreError::StoreAbsent(_)) => {
                log::warn!("password file {} not found, creating it", path.display());
                Self::create(path)
            }
            other => other,
        }
    }

    /// Creates an empty password file; fails if one is already there.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self, CredentialStoreError> {
        let path = path.into();
        password_file::create(&path)?;
        log::info!("created password file {}", path.display());
        Ok(Self::new(path, Credentials::empty()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn user_count(&self) -> usize {
        self.credentials.read().user_count()
    }

    pub fn digest(&self, userid: &str) -> Option<String> {
        self.credentials.read().digest(userid).map(str::to_string)
    }

    pub fn principal(&self, userid: &str) -> Option<Principal> {
        self.credentials.read().user(userid).map(|record| {
            Principal::new(&record.userid, Permissions::parse(&record.permissions))
        })
    }

    pub fn set_digest(&self, userid: &str, digest: &str) -> Result<(), CredentialStoreError> {
        self.credentials.write().set_digest(userid, digest)
    }

    pub fn save(&self) -> Result<(), CredentialStoreError> {
        let _guard = self.save_lock.lock();
        self.credentials.read().save(&self.path)
    }

    /// Re-reads the password file, replacing the in-memory mirror.
    pub fn reload(&self) -> Result<(), CredentialStoreError> {
        let _guard = self.save_lock.lock();
        let credentials = Credentials::load(&self.path)?;
        *self.credentials.write() = credentials;
        Ok(())
    }

    // The in-memory copy is replaced only after the file has been saved.
    fn commit<F>(&self, change: F) -> Result<(), CredentialStoreError>
    where
        F: FnOnce(&mut Credentials) -> Result<(), CredentialStoreError>,
    {
        let _guard = self.save_lock.lock();
        let mut updated = self.credentials.read().clone();
        change(&mut updated)?;
        updated.save(&self.path)?;
        *self.credentials.write() = updated;
        Ok(())
    }

    /// Sets a user's password and persists the file before returning.
    pub fn update_password(&self, userid: &str, password: &str) -> Result<(), CredentialStoreError> {
        self.update_user(userid, password, None)
    }

    /// Sets a user's password, and permissions when given, in a single save.
    pub fn update_user(
        &self,
        userid: &str,
        password: &str,
        permissions: Option<&str>,
    ) -> Result<(), CredentialStoreError> {
        let digest = derive_digest(userid, password);
        self.commit(|credentials| {
            credentials.set_digest(userid, &digest)?;
            match permissions {
                Some(permissions) => credentials.set_permissions(userid, permissions),
                None => Ok(()),
            }
        })?;
        log::info!("updated password for {} in {}", userid, self.path.display());
        Ok(())
    }

    pub fn update_permissions(&self, userid: &str, permissions: &str) -> Result<(), CredentialStoreError> {
        self.commit(|credentials| credentials.set_permissions(userid, permissions))?;
        log::info!("updated permissions for {} in {}", userid, self.path.display());
        Ok(())
    }
}
