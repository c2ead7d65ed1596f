pub mod challenge;
pub mod clock;
pub mod credentials;
pub mod crypto;
pub mod password_file;
pub mod sessions;
pub mod user;
