use thiserror::Error;

pub type Result<T = ()> = std::result::Result<T, ProbeError>;

/// Errors that abort a measurement run.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("cannot connect to {endpoint}: {reason}")]
    Connection { endpoint: String, reason: String },
    #[error("environment variable {0} not set (signing account private key)")]
    MissingCredential(String),
    #[error("invalid signing credential: {0}")]
    InvalidCredential(String),
    #[error("nonce sequencer used before initialize()")]
    Uninitialized,
    #[error("{lookup} lookup failed: {source}")]
    ChainLookup {
        lookup: &'static str,
        #[source]
        source: RpcFailure,
    },
    #[error("no successful transactions out of {attempted} attempted ({failed} failed), cannot calculate metrics")]
    NoSuccessfulSamples { attempted: usize, failed: usize },
    #[error("result store error: {0}")]
    Store(#[from] sync_latency_store::StoreError),
}

/// Failure reported by the chain client for a single remote call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RpcFailure {
    /// The node answered with a JSON-RPC error object.
    #[error("rpc error {code}: {message}")]
    Remote { code: i64, message: String },
    /// The call never produced a JSON-RPC answer.
    #[error("transport error: {0}")]
    Transport(String),
}

/// Errors from one synchronous submission. Never abort a run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("invalid signed transaction: {0}")]
    InvalidInput(String),
    #[error("remote error {code}: {message}")]
    Remote { code: i64, message: String },
    #[error("sync rpc returned no receipt")]
    EmptyResult,
    #[error("transport error: {0}")]
    Transport(String),
}

impl From<RpcFailure> for SubmitError {
    fn from(failure: RpcFailure) -> Self {
        match failure {
            RpcFailure::Remote { code, message } => Self::Remote { code, message },
            RpcFailure::Transport(reason) => Self::Transport(reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("signing failed: {0}")]
pub struct SignerError(pub String);

/// Reason a single attempt failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttemptError {
    #[error(transparent)]
    Signing(#[from] SignerError),
    #[error(transparent)]
    Submit(#[from] SubmitError),
}
