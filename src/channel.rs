//! Secure request/reply channel to the gateway.
//!
//! A channel performs exactly one exchange: validate configuration, connect,
//! send one frame, receive one frame, close. The connector/transport split is
//! the injection seam for tests and alternative carriers; the default carrier
//! is TCP with length-prefixed frames, each sealed with ChaCha20-Poly1305
//! under the static-static ECDH key of the two long-term identity keys.

use std::time::Duration;

use async_trait::async_trait;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use rand::RngCore;
use secp256k1::ecdh::SharedSecret;
use secp256k1::{PublicKey, SecretKey};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use crate::error::ClientError;
use crate::util::hex_to_bytes;

const NONCE_BYTES: usize = 12;
const MAX_FRAME_BYTES: usize = 1 << 20;

/// The five mandatory channel credentials plus I/O timeout, validated once at
/// construction rather than re-read from the environment per call.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub public_key: String,
    pub secret_key: String,
    pub gateway_public_key: String,
    pub gateway_host: String,
    pub gateway_port: u16,
    pub io_timeout: Duration,
}

pub const ENV_PUBLIC_KEY: &str = "KEYGATE_PUBLIC_KEY";
pub const ENV_SECRET_KEY: &str = "KEYGATE_SECRET_KEY";
pub const ENV_GATEWAY_PUBLIC_KEY: &str = "KEYGATE_GATEWAY_PUBLIC_KEY";
pub const ENV_GATEWAY_HOST: &str = "KEYGATE_GATEWAY_HOST";
pub const ENV_GATEWAY_PORT: &str = "KEYGATE_GATEWAY_PORT";

const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(10);

fn required_env(name: &str) -> Result<String, ClientError> {
    match std::env::var(name) {
        Err(_) => Err(ClientError::Configuration(format!(
            "missing '{name}' environment variable"
        ))),
        Ok(v) if v.trim().is_empty() => Err(ClientError::Configuration(format!(
            "empty '{name}' environment variable"
        ))),
        Ok(v) => Ok(v),
    }
}

impl ChannelConfig {
    /// Loads the credential set from `KEYGATE_*` variables, reporting each
    /// missing or empty variable as its own configuration fault.
    pub fn from_env() -> Result<Self, ClientError> {
        let public_key = required_env(ENV_PUBLIC_KEY)?;
        let secret_key = required_env(ENV_SECRET_KEY)?;
        let gateway_public_key = required_env(ENV_GATEWAY_PUBLIC_KEY)?;
        let gateway_host = required_env(ENV_GATEWAY_HOST)?;
        let port_raw = required_env(ENV_GATEWAY_PORT)?;
        let gateway_port = port_raw.trim().parse::<u16>().map_err(|_| {
            ClientError::Configuration(format!("invalid '{ENV_GATEWAY_PORT}' value: {port_raw}"))
        })?;
        let config = Self {
            public_key,
            secret_key,
            gateway_public_key,
            gateway_host,
            gateway_port,
            io_timeout: DEFAULT_IO_TIMEOUT,
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks every credential individually; each absence is its own fault.
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.public_key.trim().is_empty() {
            return Err(ClientError::Configuration(
                "missing client public key".to_string(),
            ));
        }
        if self.secret_key.trim().is_empty() {
            return Err(ClientError::Configuration(
                "missing client secret key".to_string(),
            ));
        }
        if self.gateway_public_key.trim().is_empty() {
            return Err(ClientError::Configuration(
                "missing gateway public key".to_string(),
            ));
        }
        if self.gateway_host.trim().is_empty() {
            return Err(ClientError::Configuration(
                "missing gateway host".to_string(),
            ));
        }
        if self.gateway_port == 0 {
            return Err(ClientError::Configuration(
                "missing gateway port".to_string(),
            ));
        }
        Ok(())
    }

    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.gateway_host, self.gateway_port)
    }
}

/// One established carrier: a single send, a single receive, then close.
#[async_trait]
pub trait Transport: Send {
    async fn send(&mut self, frame: &[u8]) -> Result<(), ClientError>;
    async fn receive(&mut self) -> Result<Vec<u8>, ClientError>;
    async fn close(&mut self);
}

/// Establishes a [`Transport`] for a validated configuration.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, config: &ChannelConfig) -> Result<Box<dyn Transport>, ClientError>;
}

/// Derives the frame key shared by both ends: ECDH of one side's secret key
/// with the other side's public key. Symmetric, so the gateway computes the
/// same key from its own secret and the client's public key.
pub fn exchange_key(local_secret_hex: &str, remote_public_hex: &str) -> Result<[u8; 32], ClientError> {
    let sk_bytes = hex_to_bytes(local_secret_hex)
        .map_err(|_| ClientError::Configuration("secret key is not valid hex".to_string()))?;
    let sk = SecretKey::from_slice(&sk_bytes)
        .map_err(|_| ClientError::Configuration("invalid secret key".to_string()))?;
    let pk_bytes = hex_to_bytes(remote_public_hex)
        .map_err(|_| ClientError::Configuration("remote public key is not valid hex".to_string()))?;
    let pk = PublicKey::from_slice(&pk_bytes)
        .map_err(|_| ClientError::Configuration("invalid remote public key".to_string()))?;
    Ok(SharedSecret::new(&pk, &sk).secret_bytes())
}

/// Seals one frame: random nonce prepended to the AEAD ciphertext.
pub fn seal_frame(key: &[u8; 32], plaintext: &[u8]) -> Result<Vec<u8>, ClientError> {
    let mut nonce = [0u8; NONCE_BYTES];
    rand::thread_rng().fill_bytes(&mut nonce);
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    let sealed = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|_| ClientError::Send("frame seal failed".to_string()))?;
    let mut out = Vec::with_capacity(NONCE_BYTES + sealed.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&sealed);
    Ok(out)
}

/// Opens one sealed frame.
pub fn open_frame(key: &[u8; 32], frame: &[u8]) -> Result<Vec<u8>, ClientError> {
    if frame.len() < NONCE_BYTES {
        return Err(ClientError::Receive("frame too short".to_string()));
    }
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    cipher
        .decrypt(Nonce::from_slice(&frame[..NONCE_BYTES]), &frame[NONCE_BYTES..])
        .map_err(|_| ClientError::Receive("frame authentication failed".to_string()))
}

pub struct TcpConnector;

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self, config: &ChannelConfig) -> Result<Box<dyn Transport>, ClientError> {
        let key = exchange_key(&config.secret_key, &config.gateway_public_key)?;
        let endpoint = config.endpoint();
        let stream = timeout(config.io_timeout, TcpStream::connect(&endpoint))
            .await
            .map_err(|_| ClientError::Connection(format!("connect to {endpoint} timed out")))?
            .map_err(|err| ClientError::Connection(format!("connect to {endpoint} failed: {err}")))?;
        debug!(endpoint = %endpoint, "gateway connected");
        Ok(Box::new(TcpTransport {
            stream,
            key,
            io_timeout: config.io_timeout,
        }))
    }
}

pub struct TcpTransport {
    stream: TcpStream,
    key: [u8; 32],
    io_timeout: Duration,
}

#[async_trait]
impl Transport for TcpTransport {
    async fn send(&mut self, frame: &[u8]) -> Result<(), ClientError> {
        let sealed = seal_frame(&self.key, frame)?;
        let write = async {
            self.stream.write_u32(sealed.len() as u32).await?;
            self.stream.write_all(&sealed).await?;
            self.stream.flush().await
        };
        timeout(self.io_timeout, write)
            .await
            .map_err(|_| ClientError::Send("send timed out".to_string()))?
            .map_err(|err| ClientError::Send(err.to_string()))
    }

    async fn receive(&mut self) -> Result<Vec<u8>, ClientError> {
        let read = async {
            let len = self.stream.read_u32().await? as usize;
            if len > MAX_FRAME_BYTES {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "frame exceeds limit",
                ));
            }
            let mut buf = vec![0u8; len];
            self.stream.read_exact(&mut buf).await?;
            Ok(buf)
        };
        let sealed = timeout(self.io_timeout, read)
            .await
            .map_err(|_| ClientError::Receive("receive timed out".to_string()))?
            .map_err(|err: std::io::Error| ClientError::Receive(err.to_string()))?;
        open_frame(&self.key, &sealed)
    }

    async fn close(&mut self) {
        // no linger: drop the connection immediately
        let _ = self.stream.shutdown().await;
    }
}

pub struct SecureChannel {
    transport: Box<dyn Transport>,
}

impl SecureChannel {
    /// Validates the configuration and establishes the transport. No network
    /// I/O happens if any credential is missing.
    pub async fn open(config: &ChannelConfig, connector: &dyn Connector) -> Result<Self, ClientError> {
        config.validate()?;
        let transport = connector.connect(config).await?;
        Ok(Self { transport })
    }

    /// One full request/reply cycle. The channel is consumed and the
    /// transport closed on every exit path, success or failure.
    pub async fn exchange(mut self, frame: &[u8]) -> Result<Vec<u8>, ClientError> {
        let result = match self.transport.send(frame).await {
            Ok(()) => self.transport.receive().await,
            Err(err) => Err(err),
        };
        self.transport.close().await;
        result
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{exchange_key, open_frame, seal_frame, ChannelConfig};
    use crate::account::Account;

    fn full_config() -> ChannelConfig {
        ChannelConfig {
            public_key: "aa".to_string(),
            secret_key: "bb".to_string(),
            gateway_public_key: "cc".to_string(),
            gateway_host: "localhost".to_string(),
            gateway_port: 4041,
            io_timeout: Duration::from_secs(1),
        }
    }

    #[test]
    fn validate_reports_each_missing_credential() {
        let mut c = full_config();
        c.public_key = String::new();
        assert!(c.validate().unwrap_err().to_string().contains("client public key"));

        let mut c = full_config();
        c.secret_key = "  ".to_string();
        assert!(c.validate().unwrap_err().to_string().contains("client secret key"));

        let mut c = full_config();
        c.gateway_public_key = String::new();
        assert!(c.validate().unwrap_err().to_string().contains("gateway public key"));

        let mut c = full_config();
        c.gateway_host = String::new();
        assert!(c.validate().unwrap_err().to_string().contains("gateway host"));

        let mut c = full_config();
        c.gateway_port = 0;
        assert!(c.validate().unwrap_err().to_string().contains("gateway port"));
    }

    #[test]
    fn validate_accepts_full_config() {
        assert!(full_config().validate().is_ok());
        assert_eq!(full_config().endpoint(), "localhost:4041");
    }

    #[test]
    fn exchange_key_is_symmetric() {
        let client = Account::generate();
        let gateway = Account::generate();
        let a = exchange_key(&client.secret_key_hex(), &gateway.public_key_hex()).unwrap();
        let b = exchange_key(&gateway.secret_key_hex(), &client.public_key_hex()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn frames_roundtrip_and_reject_wrong_key() {
        let client = Account::generate();
        let gateway = Account::generate();
        let key = exchange_key(&client.secret_key_hex(), &gateway.public_key_hex()).unwrap();
        let frame = seal_frame(&key, b"hello").unwrap();
        assert_eq!(open_frame(&key, &frame).unwrap(), b"hello");

        let other = Account::generate();
        let wrong = exchange_key(&other.secret_key_hex(), &gateway.public_key_hex()).unwrap();
        assert!(open_frame(&wrong, &frame).is_err());
    }
}
