//! Confirmation latency probe for chains exposing a blocking
//! `eth_sendRawTransactionSync`-style send.
//!
//! A run sends a fixed number of `increment()` calls from one account,
//! times each blocking send, and reduces the successful samples to
//! p50/p95/p99. Persistence lives in `sync-latency-store`.

pub mod client;
pub mod command;
pub mod error;
pub mod nonce;
pub mod probe;
pub mod schedule;
pub mod settings;
pub mod signer;
pub mod stats;
pub mod submitter;
pub mod transaction;

pub use client::{ChainClient, InclusionReceipt, RpcChainClient};
pub use error::{AttemptError, ProbeError, Result, RpcFailure, SignerError, SubmitError};
pub use nonce::NonceSequencer;
pub use probe::{AttemptOutcome, LatencyProbe, ProbeConfig, ProbePhase, RunReport};
pub use signer::{Credential, LocalKeySigner, SignedTransaction, TransactionSigner};
pub use stats::{LatencyStats, Percentiles};
pub use submitter::SyncSubmitter;
pub use transaction::{GasParams, TransactionBuilder, UnsignedTransaction};
