//! Protocol messages: request construction, signing hook, reply parsing.
//!
//! Wire encoding is JSON with params held in an ordered map, so identical
//! field values always serialize to identical bytes. The signature covers the
//! canonical encoding of `{method, params}` only; address and signature are
//! appended afterwards.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::account::Account;
use crate::error::ClientError;

pub type Params = BTreeMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub method: String,
    pub params: Params,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

// Signature input: method and params only, in this field order.
#[derive(Serialize)]
struct SigningView<'a> {
    method: &'a str,
    params: &'a Params,
}

impl Request {
    pub fn new(method: impl Into<String>, params: Params) -> Self {
        Self {
            method: method.into(),
            params,
            address: None,
            signature: None,
        }
    }

    pub fn is_signed(&self) -> bool {
        self.address.as_deref().is_some_and(|a| !a.is_empty())
    }

    /// Canonical bytes the signature is computed over.
    pub fn signing_payload(&self) -> Result<Vec<u8>, ClientError> {
        let view = SigningView {
            method: &self.method,
            params: &self.params,
        };
        serde_json::to_vec(&view)
            .map_err(|err| ClientError::Protocol(format!("request serialize failed: {err}")))
    }

    /// Signs the request and stamps the signer's public key as the address.
    /// A request that already carries an address must not change identity.
    pub fn sign(&mut self, account: &Account) -> Result<(), ClientError> {
        if self.is_signed() {
            return Err(ClientError::Protocol(
                "request is already signed; re-signing would change its identity".to_string(),
            ));
        }
        let payload = self.signing_payload()?;
        let signature = account.sign(&payload)?;
        self.address = Some(account.public_key_hex());
        self.signature = Some(signature);
        Ok(())
    }

    /// Full wire encoding. Only signed requests may cross the wire.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ClientError> {
        if !self.is_signed() {
            return Err(ClientError::Protocol(
                "request must be signed first".to_string(),
            ));
        }
        serde_json::to_vec(self)
            .map_err(|err| ClientError::Protocol(format!("request serialize failed: {err}")))
    }

    pub fn from_bytes(buffer: &[u8]) -> Result<Self, ClientError> {
        serde_json::from_slice(buffer)
            .map_err(|err| ClientError::MalformedReply(format!("invalid request: {err}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyStatus {
    Ok,
    Fail,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    pub status: ReplyStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub params: Params,
}

impl Reply {
    pub fn ok(params: Params) -> Self {
        Self {
            status: ReplyStatus::Ok,
            message: None,
            params,
        }
    }

    pub fn fail(message: impl Into<String>, params: Params) -> Self {
        Self {
            status: ReplyStatus::Fail,
            message: Some(message.into()),
            params,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ReplyStatus::Ok
    }

    /// Parses wire bytes. A parse failure is a result, not a fault: malformed
    /// bytes yield a synthetic fail reply carrying the parse error.
    pub fn from_bytes(buffer: &[u8]) -> Self {
        match serde_json::from_slice(buffer) {
            Ok(reply) => reply,
            Err(err) => Reply::fail(
                ClientError::MalformedReply(err.to_string()).to_string(),
                Params::new(),
            ),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ClientError> {
        serde_json::to_vec(self)
            .map_err(|err| ClientError::MalformedReply(format!("reply serialize failed: {err}")))
    }
}
