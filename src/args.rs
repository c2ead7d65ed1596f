use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(version, about)]
pub struct MimsrvArgs {
    /// TOML configuration file. It must exist; fields it leaves out take
    /// their built-in defaults.
    #[arg(long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Password file to use instead of the one named in the config.
    #[arg(long)]
    pub password_file: Option<PathBuf>,

    /// Create an empty password file and exit. Fails if the file exists.
    #[arg(long, conflicts_with = "update_password")]
    pub create_password_file: bool,

    /// Set the password of USERID in the existing password file and exit.
    #[arg(long, value_name = "USERID")]
    pub update_password: Option<String>,

    /// The new password; read from stdin when omitted.
    #[arg(long, requires = "update_password")]
    pub password: Option<String>,

    /// Space-separated permissions to grant, e.g. "edit".
    #[arg(long, requires = "update_password")]
    pub permissions: Option<String>,
}
