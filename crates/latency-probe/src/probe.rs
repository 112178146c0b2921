use std::time::{Duration, Instant};

use alloy_primitives::Address;
use tracing::{debug, info, warn};

use crate::{
    client::{ChainClient, InclusionReceipt},
    error::{AttemptError, ProbeError, Result},
    nonce::NonceSequencer,
    signer::{Credential, LocalKeySigner, TransactionSigner},
    stats::LatencyStats,
    submitter::SyncSubmitter,
    transaction::{DEFAULT_GAS_LIMIT, GasParams, TransactionBuilder},
};

pub const DEFAULT_ATTEMPTS: usize = 10;

/// Everything a run needs besides the credential.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Endpoint label used in connection errors.
    pub endpoint: String,
    pub contract: Address,
    pub gas_limit: u64,
    pub attempts: usize,
    /// Delay between attempts. Zero sends them back to back.
    pub pacing: Duration,
}

impl ProbeConfig {
    pub fn new(endpoint: impl Into<String>, contract: Address) -> Self {
        Self {
            endpoint: endpoint.into(),
            contract,
            gas_limit: DEFAULT_GAS_LIMIT,
            attempts: DEFAULT_ATTEMPTS,
            pacing: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbePhase {
    NotStarted,
    Connecting,
    Measuring,
    Aggregated,
}

/// Result of a single attempt. Failures are values, not errors.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    Confirmed {
        attempt: usize,
        nonce: u64,
        latency_ms: f64,
        receipt: InclusionReceipt,
    },
    Failed {
        attempt: usize,
        nonce: u64,
        reason: AttemptError,
    },
}

impl AttemptOutcome {
    pub fn attempt(&self) -> usize {
        match self {
            Self::Confirmed { attempt, .. } | Self::Failed { attempt, .. } => *attempt,
        }
    }

    pub fn nonce(&self) -> u64 {
        match self {
            Self::Confirmed { nonce, .. } | Self::Failed { nonce, .. } => *nonce,
        }
    }

    pub fn latency_ms(&self) -> Option<f64> {
        match self {
            Self::Confirmed { latency_ms, .. } => Some(*latency_ms),
            Self::Failed { .. } => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub stats: LatencyStats,
    pub outcomes: Vec<AttemptOutcome>,
}

/// One measurement run against one endpoint.
pub struct LatencyProbe<C: ChainClient> {
    chain: C,
    config: ProbeConfig,
    builder: TransactionBuilder,
    phase: ProbePhase,
}

impl<C: ChainClient> LatencyProbe<C> {
    pub fn new(chain: C, config: ProbeConfig) -> Self {
        let builder = TransactionBuilder::new(config.contract);
        Self {
            chain,
            config,
            builder,
            phase: ProbePhase::NotStarted,
        }
    }

    pub fn phase(&self) -> ProbePhase {
        self.phase
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Connects, resolves the signing key from `credential` and measures.
    pub async fn run(&mut self, credential: &Credential) -> Result<RunReport> {
        self.connect().await?;
        let signer = LocalKeySigner::from_credential(credential)?;
        self.measure(&signer).await
    }

    pub async fn connect(&mut self) -> Result<u64> {
        self.phase = ProbePhase::Connecting;

        let head = self
            .chain
            .block_number()
            .await
            .map_err(|e| ProbeError::Connection {
                endpoint: self.config.endpoint.clone(),
                reason: e.to_string(),
            })?;

        info!(endpoint = %self.config.endpoint, head, "connected");
        Ok(head)
    }

    /// Runs the attempt loop with an already resolved signer.
    pub async fn measure<S: TransactionSigner + ?Sized>(&mut self, signer: &S) -> Result<RunReport> {
        self.phase = ProbePhase::Connecting;

        let mut sequencer = NonceSequencer::new(signer.address());
        sequencer.initialize(&self.chain).await?;
        let gas = self.gas_params().await?;
        debug!(?gas, sender = %signer.address(), "gas parameters fixed for run");

        self.phase = ProbePhase::Measuring;
        let submitter = SyncSubmitter::new(&self.chain);
        let mut outcomes = Vec::with_capacity(self.config.attempts);

        for attempt in 1..=self.config.attempts {
            if attempt > 1 && !self.config.pacing.is_zero() {
                tokio::time::sleep(self.config.pacing).await;
            }

            let nonce = sequencer.allocate()?;
            let tx = self.builder.build(signer.address(), nonce, gas);
            metrics::counter!("sync_latency_probe_attempts_total").increment(1);

            let signed = match signer.sign(&tx) {
                Ok(signed) => signed,
                Err(e) => {
                    outcomes.push(failed(attempt, nonce, e.into()));
                    continue;
                }
            };

            let start = Instant::now();
            let result = submitter.submit(&signed).await;
            let latency_ms = start.elapsed().as_secs_f64() * 1000.0;

            match result {
                Ok(receipt) => {
                    info!(attempt, nonce, latency_ms, "transaction confirmed");
                    metrics::histogram!("sync_latency_probe_confirmation_ms").record(latency_ms);
                    outcomes.push(AttemptOutcome::Confirmed {
                        attempt,
                        nonce,
                        latency_ms,
                        receipt,
                    });
                }
                Err(e) => outcomes.push(failed(attempt, nonce, e.into())),
            }
        }

        let samples: Vec<f64> = outcomes.iter().filter_map(AttemptOutcome::latency_ms).collect();
        let stats = LatencyStats::aggregate(&samples, outcomes.len())?;

        let rounded = stats.rounded();
        metrics::gauge!("sync_latency_probe_p50_ms").set(rounded.p50 as f64);
        metrics::gauge!("sync_latency_probe_p95_ms").set(rounded.p95 as f64);
        metrics::gauge!("sync_latency_probe_p99_ms").set(rounded.p99 as f64);

        self.phase = ProbePhase::Aggregated;
        info!(
            succeeded = stats.succeeded,
            failed = stats.failed,
            p50 = stats.p50,
            p95 = stats.p95,
            p99 = stats.p99,
            "run aggregated"
        );

        Ok(RunReport { stats, outcomes })
    }

    async fn gas_params(&self) -> Result<GasParams> {
        let chain_id = self
            .chain
            .chain_id()
            .await
            .map_err(|source| ProbeError::ChainLookup {
                lookup: "chain id",
                source,
            })?;
        let gas_price = self
            .chain
            .gas_price()
            .await
            .map_err(|source| ProbeError::ChainLookup {
                lookup: "gas price",
                source,
            })?;

        Ok(GasParams {
            gas_limit: self.config.gas_limit,
            gas_price,
            chain_id,
        })
    }
}

fn failed(attempt: usize, nonce: u64, reason: AttemptError) -> AttemptOutcome {
    warn!(attempt, nonce, error = %reason, "attempt failed");
    metrics::counter!("sync_latency_probe_failures_total").increment(1);
    AttemptOutcome::Failed {
        attempt,
        nonce,
        reason,
    }
}
