//! SSH transport implementation using russh.

use std::path::PathBuf;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use log::{debug, warn};
use russh::client::{self, Handle};
use russh::keys::{PrivateKeyWithHashAlg, PublicKey, load_secret_key};
use russh::ChannelMsg;
use secrecy::ExposeSecret;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use super::config::{AuthMethod, HostKeyVerification, SshConfig};
use super::{InputSink, TransportStreams, receiver_source};
use crate::error::{Result, TransportError};

type OutputTx = mpsc::UnboundedSender<std::result::Result<Bytes, TransportError>>;

/// SSH transport wrapping a russh client session.
pub struct SshTransport {
    /// The russh session handle.
    session: Handle<SshHandler>,

    /// Configuration used for this connection.
    config: SshConfig,
}

impl SshTransport {
    /// Connect to the SSH server and authenticate.
    ///
    /// Fails with [`TransportError::ProxyRequired`] when a proxy is
    /// configured; establish the tunnel first and use
    /// [`connect_stream`](Self::connect_stream).
    pub async fn connect(config: SshConfig) -> Result<Self> {
        if let Some(proxy) = &config.proxy {
            return Err(TransportError::ProxyRequired {
                kind: proxy.kind,
                host: proxy.host.clone(),
                port: proxy.port,
            }
            .into());
        }

        let (ssh_config, handler, host_key_error) = Self::prepare(&config);

        let mut session = tokio::time::timeout(
            config.timeout,
            client::connect(ssh_config, (config.host.as_str(), config.port), handler),
        )
        .await
        .map_err(|_| TransportError::Timeout(config.timeout))?
        .map_err(|e| match e {
            russh::Error::IO(source) => TransportError::ConnectionFailed {
                host: config.host.clone(),
                port: config.port,
                source,
            },
            e => Self::connect_error(&host_key_error, e),
        })?;

        Self::authenticate(&mut session, &config).await?;

        Ok(Self { session, config })
    }

    /// Run the SSH handshake over an already established stream, such as
    /// a tunnel opened through the configured proxy.
    pub async fn connect_stream<S>(config: SshConfig, stream: S) -> Result<Self>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (ssh_config, handler, host_key_error) = Self::prepare(&config);

        let mut session = tokio::time::timeout(
            config.timeout,
            client::connect_stream(ssh_config, stream, handler),
        )
        .await
        .map_err(|_| TransportError::Timeout(config.timeout))?
        .map_err(|e| Self::connect_error(&host_key_error, e))?;

        Self::authenticate(&mut session, &config).await?;

        Ok(Self { session, config })
    }

    fn prepare(
        config: &SshConfig,
    ) -> (
        Arc<client::Config>,
        SshHandler,
        Arc<Mutex<Option<TransportError>>>,
    ) {
        let ssh_config = Arc::new(client::Config {
            inactivity_timeout: Some(config.timeout),
            ..Default::default()
        });

        let host_key_error: Arc<Mutex<Option<TransportError>>> = Arc::new(Mutex::new(None));

        let handler = SshHandler {
            host: config.host.clone(),
            port: config.port,
            host_key_verification: config.host_key_verification.clone(),
            known_hosts_path: config.known_hosts_path.clone(),
            host_key_error: host_key_error.clone(),
        };

        (ssh_config, handler, host_key_error)
    }

    /// Prefer the detailed host-key error stored by the handler over the
    /// generic russh one.
    fn connect_error(
        host_key_error: &Mutex<Option<TransportError>>,
        error: russh::Error,
    ) -> TransportError {
        host_key_error
            .lock()
            .ok()
            .and_then(|mut stored| stored.take())
            .unwrap_or(TransportError::Ssh(error))
    }

    /// Execute `command` and return its output sources and input sink.
    ///
    /// Channel data feeds standard output, extended data of type 1 feeds
    /// standard error. If the SSH channel disappears without an EOF or
    /// close message, both sources yield [`TransportError::Disconnected`].
    pub async fn exec(&self, command: &str) -> Result<TransportStreams<SshInput>> {
        let channel = self
            .session
            .channel_open_session()
            .await
            .map_err(TransportError::Ssh)?;

        if self.config.request_pty {
            channel
                .request_pty(true, "xterm", 511, 24, 0, 0, &[])
                .await
                .map_err(TransportError::Ssh)?;
        }

        channel
            .exec(true, command)
            .await
            .map_err(TransportError::Ssh)?;
        debug!("exec on {}: {:?}", self.config.socket_addr(), command);

        let writer: Pin<Box<dyn AsyncWrite + Send>> = Box::pin(channel.make_writer());

        let (stdout_tx, stdout_rx) = mpsc::unbounded_channel();
        let (stderr_tx, stderr_rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            let mut channel = channel;
            let mut finished = false;

            while let Some(msg) = channel.wait().await {
                match msg {
                    ChannelMsg::Data { data } => {
                        let _ = stdout_tx.send(Ok(Bytes::copy_from_slice(&data)));
                    }
                    ChannelMsg::ExtendedData { data, ext: 1 } => {
                        let _ = stderr_tx.send(Ok(Bytes::copy_from_slice(&data)));
                    }
                    ChannelMsg::ExitStatus { exit_status } => {
                        debug!("remote command exited with status {}", exit_status);
                    }
                    ChannelMsg::Eof | ChannelMsg::Close => {
                        finished = true;
                        break;
                    }
                    _ => {}
                }
            }

            if !finished {
                warn!("SSH channel ended without EOF");
                fail(&stdout_tx);
                fail(&stderr_tx);
            }
        });

        Ok(TransportStreams::new(
            receiver_source(stdout_rx),
            receiver_source(stderr_rx),
            SshInput { writer },
        ))
    }

    /// The configuration this transport was built from.
    pub fn config(&self) -> &SshConfig {
        &self.config
    }

    /// Whether the underlying SSH session is still running.
    pub fn is_alive(&self) -> bool {
        !self.session.is_closed()
    }

    /// Authenticate with the server.
    async fn authenticate(session: &mut Handle<SshHandler>, config: &SshConfig) -> Result<()> {
        let success = match &config.auth {
            AuthMethod::None => session
                .authenticate_none(&config.username)
                .await
                .map_err(TransportError::Ssh)?
                .success(),
            AuthMethod::Password(password) => session
                .authenticate_password(&config.username, password.expose_secret())
                .await
                .map_err(TransportError::Ssh)?
                .success(),
            AuthMethod::PrivateKey { path, passphrase } => {
                let passphrase = passphrase.as_ref().map(|p| p.expose_secret());
                let key = load_secret_key(path, passphrase)
                    .map_err(|e| TransportError::Key(e.to_string()))?;

                // Get the best RSA hash algorithm supported by the server
                let hash_alg = session
                    .best_supported_rsa_hash()
                    .await
                    .map_err(TransportError::Ssh)?
                    .flatten();

                session
                    .authenticate_publickey(
                        &config.username,
                        PrivateKeyWithHashAlg::new(Arc::new(key), hash_alg),
                    )
                    .await
                    .map_err(TransportError::Ssh)?
                    .success()
            }
        };

        if !success {
            return Err(TransportError::AuthenticationFailed {
                user: config.username.clone(),
            }
            .into());
        }

        Ok(())
    }

    /// Close the connection.
    pub async fn close(self) -> Result<()> {
        self.session
            .disconnect(russh::Disconnect::ByApplication, "", "en")
            .await
            .map_err(TransportError::Ssh)?;
        Ok(())
    }
}

fn fail(tx: &OutputTx) {
    let _ = tx.send(Err(TransportError::Disconnected));
}

/// Remote input of a command executed over SSH.
pub struct SshInput {
    writer: Pin<Box<dyn AsyncWrite + Send>>,
}

impl InputSink for SshInput {
    async fn write(&mut self, data: Bytes) -> std::result::Result<(), TransportError> {
        self.writer.write_all(&data).await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn close(&mut self) -> std::result::Result<(), TransportError> {
        self.writer.shutdown().await?;
        Ok(())
    }
}

/// Where a server key stands relative to known_hosts.
#[derive(Debug)]
enum KnownHost {
    /// Recorded with this key.
    Match,
    /// Not recorded at all.
    Absent,
    /// Recorded with a different key, or known_hosts is unusable.
    Conflict(TransportError),
}

/// What to do with a server key.
#[derive(Debug)]
enum Verdict {
    Accept,
    /// Accept and record the key.
    Learn,
    Reject(TransportError),
}

/// Decide on a server key. `lookup` is only called when the mode checks
/// known_hosts.
fn verdict(
    mode: &HostKeyVerification,
    host: &str,
    port: u16,
    lookup: impl FnOnce() -> KnownHost,
) -> Verdict {
    if *mode == HostKeyVerification::Disabled {
        return Verdict::Accept;
    }
    match (lookup(), mode) {
        (KnownHost::Match, _) => Verdict::Accept,
        (KnownHost::Conflict(e), _) => Verdict::Reject(e),
        (KnownHost::Absent, HostKeyVerification::Strict) => {
            Verdict::Reject(TransportError::HostKeyUnknown {
                host: host.to_string(),
                port,
            })
        }
        (KnownHost::Absent, _) => Verdict::Learn,
    }
}

/// russh client handler enforcing the configured host key policy.
struct SshHandler {
    host: String,
    port: u16,
    host_key_verification: HostKeyVerification,
    known_hosts_path: Option<PathBuf>,

    /// Why the key was rejected; russh itself only reports `UnknownKey`.
    host_key_error: Arc<Mutex<Option<TransportError>>>,
}

impl SshHandler {
    fn lookup(&self, key: &PublicKey) -> KnownHost {
        let (host, port) = (self.host.as_str(), self.port);
        let found = match &self.known_hosts_path {
            Some(path) => russh::keys::check_known_hosts_path(host, port, key, path),
            None => russh::keys::check_known_hosts(host, port, key),
        };

        match found {
            Ok(true) => KnownHost::Match,
            Ok(false) => KnownHost::Absent,
            Err(russh::keys::Error::KeyChanged { line }) => {
                KnownHost::Conflict(TransportError::HostKeyChanged {
                    host: self.host.clone(),
                    port,
                    line,
                })
            }
            Err(e) => KnownHost::Conflict(TransportError::KnownHosts(e.to_string())),
        }
    }

    fn learn(&self, key: &PublicKey) {
        let (host, port) = (self.host.as_str(), self.port);
        let saved = match &self.known_hosts_path {
            Some(path) => russh::keys::known_hosts::learn_known_hosts_path(host, port, key, path),
            None => russh::keys::known_hosts::learn_known_hosts(host, port, key),
        };
        match saved {
            Ok(()) => debug!("recorded host key for {}", self.host),
            Err(e) => warn!("could not record host key for {}: {}", self.host, e),
        }
    }
}

impl client::Handler for SshHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        let decision = verdict(&self.host_key_verification, &self.host, self.port, || {
            self.lookup(server_public_key)
        });

        match decision {
            Verdict::Accept => Ok(true),
            Verdict::Learn => {
                self.learn(server_public_key);
                Ok(true)
            }
            Verdict::Reject(e) => {
                warn!("rejecting host key of {}: {}", self.host, e);
                if let Ok(mut stored) = self.host_key_error.lock() {
                    *stored = Some(e);
                }
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use super::*;

    const KEY_A: &str =
        "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIAEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEB";
    const KEY_B: &str =
        "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIAICAgICAgICAgICAgICAgICAgICAgICAgICAgICAgIC";

    fn key(openssh: &str) -> PublicKey {
        PublicKey::from_openssh(openssh).unwrap()
    }

    fn handler(known_hosts: &Path) -> SshHandler {
        SshHandler {
            host: "db1.example.com".to_string(),
            port: 2222,
            host_key_verification: HostKeyVerification::Strict,
            known_hosts_path: Some(known_hosts.to_path_buf()),
            host_key_error: Arc::new(Mutex::new(None)),
        }
    }

    fn known_hosts(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "sshinteract-{}-{}-known_hosts",
            name,
            std::process::id()
        ));
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_verdict_modes() {
        let absent = || KnownHost::Absent;
        assert!(matches!(
            verdict(&HostKeyVerification::AcceptNew, "h", 22, absent),
            Verdict::Learn
        ));
        assert!(matches!(
            verdict(&HostKeyVerification::Strict, "h", 22, absent),
            Verdict::Reject(TransportError::HostKeyUnknown { port: 22, .. })
        ));
        assert!(matches!(
            verdict(&HostKeyVerification::Strict, "h", 22, || KnownHost::Match),
            Verdict::Accept
        ));
        assert!(matches!(
            verdict(&HostKeyVerification::AcceptNew, "h", 22, || {
                KnownHost::Conflict(TransportError::HostKeyChanged {
                    host: "h".to_string(),
                    port: 22,
                    line: 3,
                })
            }),
            Verdict::Reject(TransportError::HostKeyChanged { line: 3, .. })
        ));
    }

    #[test]
    fn test_disabled_skips_known_hosts() {
        let decision = verdict(&HostKeyVerification::Disabled, "h", 22, || {
            panic!("known_hosts consulted")
        });
        assert!(matches!(decision, Verdict::Accept));
    }

    #[test]
    fn test_lookup_against_known_hosts_file() {
        let path = known_hosts("lookup", &format!("[db1.example.com]:2222 {}\n", KEY_A));
        let handler = handler(&path);

        assert!(matches!(handler.lookup(&key(KEY_A)), KnownHost::Match));
        assert!(matches!(
            handler.lookup(&key(KEY_B)),
            KnownHost::Conflict(TransportError::HostKeyChanged { port: 2222, .. })
        ));

        let other = SshHandler {
            host: "web1.example.com".to_string(),
            ..handler
        };
        assert!(matches!(other.lookup(&key(KEY_A)), KnownHost::Absent));

        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_learned_key_is_found_later() {
        let path = known_hosts("learn", "");
        let handler = handler(&path);

        assert!(matches!(handler.lookup(&key(KEY_B)), KnownHost::Absent));
        handler.learn(&key(KEY_B));
        assert!(matches!(handler.lookup(&key(KEY_B)), KnownHost::Match));

        let _ = fs::remove_file(path);
    }
}
