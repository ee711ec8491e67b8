//! File transfer collaborator types.
//!
//! Transfers run outside the interaction engine, over the same SSH
//! connection. This module only carries the method selection and the SFTP
//! error taxonomy transfers report through.

mod sftp_error;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use sftp_error::SftpError;

/// How files are moved over the connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileTransferMethod {
    /// Transfer via an SFTP subsystem channel.
    #[default]
    Sftp,
    /// Transfer via the remote `scp` command.
    Scp,
}

impl fmt::Display for FileTransferMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileTransferMethod::Sftp => write!(f, "sftp"),
            FileTransferMethod::Scp => write!(f, "scp"),
        }
    }
}

impl FromStr for FileTransferMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sftp" => Ok(FileTransferMethod::Sftp),
            "scp" => Ok(FileTransferMethod::Scp),
            other => Err(format!("unknown file transfer method '{}'", other)),
        }
    }
}
