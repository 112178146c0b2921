use std::fmt;

use alloy_consensus::{SignableTransaction, TxEnvelope};
use alloy_eips::eip2718::Encodable2718;
use alloy_primitives::{Address, Bytes};
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use mockall::automock;

use crate::{
    error::{ProbeError, Result, SignerError},
    transaction::UnsignedTransaction,
};

pub const DEFAULT_CREDENTIAL_ENV: &str = "PK";

/// Output of a signer, in whichever representation the signer produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignedTransaction {
    Raw(Bytes),
    Hex(String),
}

/// Signing capability for the run's single sender account.
#[automock]
pub trait TransactionSigner: Send + Sync {
    fn address(&self) -> Address;

    fn sign(&self, tx: &UnsignedTransaction) -> std::result::Result<SignedTransaction, SignerError>;
}

/// Private key read from the environment. Never printed.
#[derive(Clone)]
pub struct Credential {
    source: String,
    secret: Option<String>,
}

impl Credential {
    pub fn from_env(var: &str) -> Self {
        Self {
            source: var.to_string(),
            secret: std::env::var(var).ok().filter(|v| !v.trim().is_empty()),
        }
    }

    pub fn new(source: impl Into<String>, secret: Option<String>) -> Self {
        Self {
            source: source.into(),
            secret,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_present(&self) -> bool {
        self.secret.is_some()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("source", &self.source)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Signs legacy EIP-155 transactions with an in-process secp256k1 key.
#[derive(Debug, Clone)]
pub struct LocalKeySigner {
    signer: PrivateKeySigner,
}

impl LocalKeySigner {
    pub fn from_credential(credential: &Credential) -> Result<Self> {
        let secret = credential
            .secret
            .as_deref()
            .ok_or_else(|| ProbeError::MissingCredential(credential.source.clone()))?;

        let signer: PrivateKeySigner = secret
            .trim()
            .parse()
            .map_err(|e| ProbeError::InvalidCredential(format!("{e}")))?;

        Ok(Self { signer })
    }
}

impl TransactionSigner for LocalKeySigner {
    fn address(&self) -> Address {
        self.signer.address()
    }

    fn sign(&self, tx: &UnsignedTransaction) -> std::result::Result<SignedTransaction, SignerError> {
        let legacy = tx.as_legacy().clone();
        let signature = self
            .signer
            .sign_hash_sync(&legacy.signature_hash())
            .map_err(|e| SignerError(e.to_string()))?;

        let envelope = TxEnvelope::from(legacy.into_signed(signature));
        Ok(SignedTransaction::Raw(envelope.encoded_2718().into()))
    }
}
