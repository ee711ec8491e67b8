//! SSH connection configuration.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::transfer::FileTransferMethod;

/// Host key verification mode, analogous to OpenSSH's `StrictHostKeyChecking`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostKeyVerification {
    /// Reject unknown and changed keys. Connection fails if the host
    /// is not already in known_hosts.
    Strict,

    /// Accept and auto-learn unknown keys, but reject changed keys.
    /// This is the default and matches common SSH client behavior.
    #[default]
    AcceptNew,

    /// Accept all keys without checking. For testing and lab use only.
    Disabled,
}

/// Kind of proxy the connection is tunneled through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyKind {
    /// HTTP `CONNECT` proxy.
    Http,
    /// SOCKS proxy.
    Socks,
}

impl fmt::Display for ProxyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyKind::Http => write!(f, "HTTP"),
            ProxyKind::Socks => write!(f, "SOCKS"),
        }
    }
}

/// Proxy endpoint the surrounding system tunnels through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Proxy protocol.
    pub kind: ProxyKind,

    /// Proxy host.
    pub host: String,

    /// Proxy port.
    pub port: u16,
}

/// SSH connection configuration.
#[derive(Debug, Clone)]
pub struct SshConfig {
    /// Target host (hostname or IP address).
    pub host: String,

    /// SSH port (default: 22).
    pub port: u16,

    /// Username for authentication.
    pub username: String,

    /// Authentication method.
    pub auth: AuthMethod,

    /// Connection timeout.
    pub timeout: Duration,

    /// Host key verification mode.
    pub host_key_verification: HostKeyVerification,

    /// Path to known_hosts file.
    pub known_hosts_path: Option<PathBuf>,

    /// Proxy the connection must go through, if any.
    pub proxy: Option<ProxyConfig>,

    /// How files are transferred over this connection.
    pub file_transfer: FileTransferMethod,

    /// Request a PTY for executed commands. A PTY merges standard error
    /// into standard output.
    pub request_pty: bool,
}

impl SshConfig {
    /// Create a configuration with defaults for everything but host and user.
    pub fn new(host: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 22,
            username: username.into(),
            auth: AuthMethod::None,
            timeout: Duration::from_secs(30),
            host_key_verification: HostKeyVerification::default(),
            known_hosts_path: None,
            proxy: None,
            file_transfer: FileTransferMethod::default(),
            request_pty: false,
        }
    }

    /// Set the SSH port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Use password authentication.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.auth = AuthMethod::Password(SecretString::from(password.into()));
        self
    }

    /// Use private key authentication.
    pub fn with_private_key(mut self, path: impl Into<PathBuf>, passphrase: Option<String>) -> Self {
        self.auth = AuthMethod::PrivateKey {
            path: path.into(),
            passphrase: passphrase.map(SecretString::from),
        };
        self
    }

    /// Set the connection timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the host key verification mode.
    pub fn with_host_key_verification(mut self, mode: HostKeyVerification) -> Self {
        self.host_key_verification = mode;
        self
    }

    /// Route the connection through a proxy.
    pub fn with_proxy(mut self, proxy: ProxyConfig) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Select the file transfer method.
    pub fn with_file_transfer(mut self, method: FileTransferMethod) -> Self {
        self.file_transfer = method;
        self
    }

    /// Request a PTY for executed commands.
    pub fn with_pty(mut self, enabled: bool) -> Self {
        self.request_pty = enabled;
        self
    }

    /// Get the socket address for connection.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Authentication method for SSH connections.
#[derive(Debug, Clone)]
pub enum AuthMethod {
    /// No authentication (for testing only).
    None,

    /// Password authentication.
    Password(SecretString),

    /// Private key authentication.
    PrivateKey {
        /// Path to the private key file.
        path: PathBuf,
        /// Optional passphrase for encrypted keys.
        passphrase: Option<SecretString>,
    },
}

#[cfg(test)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = SshConfig::new("router1", "admin");
        assert_eq!(config.socket_addr(), "router1:22");
        assert_eq!(config.host_key_verification, HostKeyVerification::AcceptNew);
        assert_eq!(config.file_transfer, FileTransferMethod::Sftp);
        assert!(config.proxy.is_none());
        assert!(!config.request_pty);
    }

    #[test]
    fn test_password_is_redacted() {
        let config = SshConfig::new("h", "u").with_password("hunter2");
        assert!(!format!("{:?}", config).contains("hunter2"));
        match &config.auth {
            AuthMethod::Password(p) => assert_eq!(p.expose_secret(), "hunter2"),
            other => panic!("unexpected auth {:?}", other),
        }
    }

    #[test]
    fn test_proxy_kind_serde() {
        let proxy: ProxyConfig =
            serde_json::from_str(r#"{"kind":"socks","host":"gw","port":1080}"#).unwrap();
        assert_eq!(proxy.kind, ProxyKind::Socks);
        assert_eq!(proxy.kind.to_string(), "SOCKS");
    }
}
