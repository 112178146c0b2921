use alloy_primitives::Address;
use tracing::debug;

use crate::{
    client::ChainClient,
    error::{ProbeError, Result},
};

/// Hands out transaction sequence numbers for one sender within one run.
///
/// Values start at the sender's confirmed transaction count and only grow.
/// A value handed out for a failed attempt is not handed out again.
#[derive(Debug)]
pub struct NonceSequencer {
    address: Address,
    next_sequence: Option<u64>,
}

impl NonceSequencer {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            next_sequence: None,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Loads the starting value from the chain. Calling it again is a no-op
    /// so the counter never moves backwards mid-run.
    pub async fn initialize<C: ChainClient + ?Sized>(&mut self, chain: &C) -> Result<u64> {
        if let Some(next) = self.next_sequence {
            debug!(next, "nonce sequencer already initialized");
            return Ok(next);
        }

        let start = chain
            .transaction_count(self.address)
            .await
            .map_err(|source| ProbeError::ChainLookup {
                lookup: "transaction count",
                source,
            })?;

        debug!(address = %self.address, start, "nonce sequencer initialized");
        self.next_sequence = Some(start);
        Ok(start)
    }

    pub fn allocate(&mut self) -> Result<u64> {
        let next = self.next_sequence.as_mut().ok_or(ProbeError::Uninitialized)?;
        let nonce = *next;
        *next += 1;
        Ok(nonce)
    }

    /// Value the next `allocate()` would return.
    pub fn peek(&self) -> Option<u64> {
        self.next_sequence
    }
}
