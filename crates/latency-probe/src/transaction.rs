use alloy_consensus::TxLegacy;
use alloy_primitives::{Address, Bytes, TxKind, U256};
use alloy_sol_types::{SolCall, sol};

sol! {
    /// Counter contract exercised by every probe transaction.
    interface Counter {
        function increment() external;
    }
}

pub const DEFAULT_GAS_LIMIT: u64 = 100_000;

/// Gas and chain parameters fetched once per run and reused by every attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasParams {
    pub gas_limit: u64,
    pub gas_price: u128,
    pub chain_id: u64,
}

/// A fully specified transaction awaiting a signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedTransaction {
    sender: Address,
    tx: TxLegacy,
}

impl UnsignedTransaction {
    pub fn sender(&self) -> Address {
        self.sender
    }

    pub fn nonce(&self) -> u64 {
        self.tx.nonce
    }

    pub fn recipient(&self) -> Option<Address> {
        self.tx.to.to().copied()
    }

    pub fn call_data(&self) -> &Bytes {
        &self.tx.input
    }

    pub fn gas_limit(&self) -> u64 {
        self.tx.gas_limit
    }

    pub fn gas_price(&self) -> u128 {
        self.tx.gas_price
    }

    pub fn chain_id(&self) -> Option<u64> {
        self.tx.chain_id
    }

    /// EIP-155 legacy payload to be signed.
    pub fn as_legacy(&self) -> &TxLegacy {
        &self.tx
    }
}

/// Builds `increment()` calls against one contract. Holds no per-attempt state.
#[derive(Debug, Clone)]
pub struct TransactionBuilder {
    contract: Address,
    call_data: Bytes,
}

impl TransactionBuilder {
    pub fn new(contract: Address) -> Self {
        Self {
            contract,
            call_data: Counter::incrementCall {}.abi_encode().into(),
        }
    }

    pub fn contract(&self) -> Address {
        self.contract
    }

    pub fn build(&self, sender: Address, nonce: u64, gas: GasParams) -> UnsignedTransaction {
        UnsignedTransaction {
            sender,
            tx: TxLegacy {
                chain_id: Some(gas.chain_id),
                nonce,
                gas_price: gas.gas_price,
                gas_limit: gas.gas_limit,
                to: TxKind::Call(self.contract),
                value: U256::ZERO,
                input: self.call_data.clone(),
            },
        }
    }
}
