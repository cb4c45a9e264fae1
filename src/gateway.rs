//! Gateway client: signs, sends and post-processes protocol requests.
//!
//! Every failure is folded into a fail [`Reply`]; callers branch on
//! [`Reply::is_ok`] and never see a raw error from this layer.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine as _;
use tracing::{debug, warn};

use crate::account::Account;
use crate::channel::{ChannelConfig, Connector, SecureChannel, TcpConnector};
use crate::error::ClientError;
use crate::message::{Params, Reply, Request};

/// The remote operations this client knows how to issue. Each kind carries
/// its own reply-decoding step, so a new method with special reply handling
/// extends the enum rather than adding a string branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Provision a fresh keypair; the reply carries `public_key` and
    /// `secret_key` encrypted for the requester.
    GenerateKey,
}

impl RequestKind {
    pub fn method(&self) -> &'static str {
        match self {
            RequestKind::GenerateKey => "generate_key",
        }
    }

    /// Method-specific post-processing of an ok reply. Fail replies pass
    /// through untouched.
    fn decode_reply(&self, account: &Account, mut reply: Reply) -> Reply {
        if !reply.is_ok() {
            return reply;
        }
        match self {
            RequestKind::GenerateKey => {
                for field in ["public_key", "secret_key"] {
                    match decrypt_param(account, &reply, field) {
                        Ok(plaintext) => {
                            reply.params.insert(field.to_string(), plaintext.into());
                        }
                        Err(err) => {
                            warn!(field, error = %err, "credential decrypt failed");
                            return Reply::fail(err.to_string(), Params::new());
                        }
                    }
                }
                reply
            }
        }
    }
}

fn decrypt_param(account: &Account, reply: &Reply, field: &str) -> Result<String, ClientError> {
    let value = reply
        .params
        .get(field)
        .and_then(|v| v.as_str())
        .ok_or_else(|| {
            ClientError::MalformedReply(format!("reply is missing '{field}'"))
        })?;
    let ciphertext = STANDARD_NO_PAD
        .decode(value.trim())
        .map_err(|_| ClientError::Decryption(format!("'{field}' is not valid base64")))?;
    let plaintext = account.decrypt(&ciphertext)?;
    String::from_utf8(plaintext)
        .map_err(|_| ClientError::Decryption(format!("'{field}' is not valid utf-8")))
}

pub struct GatewayClient {
    config: ChannelConfig,
    connector: Arc<dyn Connector>,
}

impl GatewayClient {
    pub fn new(config: ChannelConfig) -> Self {
        Self::with_connector(config, Arc::new(TcpConnector))
    }

    /// Injection point for tests and alternative carriers.
    pub fn with_connector(config: ChannelConfig, connector: Arc<dyn Connector>) -> Self {
        Self { config, connector }
    }

    /// Sends an already-signed request over a fresh channel and parses the
    /// reply. An unsigned request never reaches the network.
    pub async fn send_request(&self, request: &Request) -> Reply {
        if !request.is_signed() {
            return Reply::fail(
                "failed to send request: the request should be signed first",
                Params::new(),
            );
        }
        let bytes = match request.to_bytes() {
            Ok(bytes) => bytes,
            Err(err) => return Reply::fail(err.to_string(), Params::new()),
        };

        let channel = match SecureChannel::open(&self.config, &*self.connector).await {
            Ok(channel) => channel,
            Err(err) => {
                warn!(error = %err, "gateway channel failed");
                return Reply::fail(
                    format!("failed to reach the gateway: {err}"),
                    Params::new(),
                );
            }
        };

        debug!(method = %request.method, "request sent");
        match channel.exchange(&bytes).await {
            Ok(raw) => Reply::from_bytes(&raw),
            Err(err) => {
                warn!(error = %err, "gateway exchange failed");
                Reply::fail(format!("gateway exchange failed: {err}"), Params::new())
            }
        }
    }

    /// Asks the gateway for a fresh keypair encrypted for the holder of
    /// `private_key`, returning it decrypted. The only method with reply
    /// post-processing: returned key material never crosses the wire as
    /// plaintext.
    pub async fn generate_credentials(&self, private_key: &str) -> Reply {
        let account = match Account::from_hex(private_key) {
            Ok(account) => account,
            Err(err) => return Reply::fail(err.to_string(), Params::new()),
        };

        let kind = RequestKind::GenerateKey;
        let mut request = Request::new(kind.method(), Params::new());
        if let Err(err) = request.sign(&account) {
            return Reply::fail(err.to_string(), Params::new());
        }

        let reply = self.send_request(&request).await;
        kind.decode_reply(&account, reply)
    }
}

#[cfg(test)]
mod tests {
    use base64::engine::general_purpose::STANDARD_NO_PAD;
    use base64::Engine as _;
    use serde_json::json;

    use super::RequestKind;
    use crate::account::Account;
    use crate::message::{Params, Reply};

    #[test]
    fn generate_key_decode_passes_fail_replies_through() {
        let account = Account::generate();
        let mut params = Params::new();
        params.insert("public_key".to_string(), json!("ciphertext"));
        let fail = Reply::fail("no keys left", params.clone());
        let out = RequestKind::GenerateKey.decode_reply(&account, fail.clone());
        assert_eq!(out, fail);
        assert_eq!(out.params.get("public_key"), Some(&json!("ciphertext")));
    }

    #[test]
    fn generate_key_decode_replaces_ciphertext_with_plaintext() {
        let account = Account::generate();
        let mut params = Params::new();
        for (field, plaintext) in [("public_key", "pk-plain"), ("secret_key", "sk-plain")] {
            let ct = Account::encrypt_for(&account.public_key_hex(), plaintext.as_bytes()).unwrap();
            params.insert(field.to_string(), json!(STANDARD_NO_PAD.encode(ct)));
        }
        let out = RequestKind::GenerateKey.decode_reply(&account, Reply::ok(params));
        assert!(out.is_ok());
        assert_eq!(out.params.get("public_key"), Some(&json!("pk-plain")));
        assert_eq!(out.params.get("secret_key"), Some(&json!("sk-plain")));
    }

    #[test]
    fn generate_key_decode_fails_for_wrong_recipient() {
        let account = Account::generate();
        let other = Account::generate();
        let mut params = Params::new();
        for field in ["public_key", "secret_key"] {
            let ct = Account::encrypt_for(&other.public_key_hex(), b"secret").unwrap();
            params.insert(field.to_string(), json!(STANDARD_NO_PAD.encode(ct)));
        }
        let out = RequestKind::GenerateKey.decode_reply(&account, Reply::ok(params));
        assert!(!out.is_ok());
        assert!(out.message.unwrap().starts_with("decryption:"));
    }

    #[test]
    fn generate_key_decode_reports_missing_fields() {
        let account = Account::generate();
        let out = RequestKind::GenerateKey.decode_reply(&account, Reply::ok(Params::new()));
        assert!(!out.is_ok());
        assert!(out.message.unwrap().contains("public_key"));
    }
}
