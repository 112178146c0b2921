use alloy_eips::BlockId;
use alloy_network::Ethereum;
use alloy_primitives::{Address, B256, U64};
use alloy_provider::{Provider, RootProvider};
use alloy_rpc_client::RpcClient;
use alloy_transport::{RpcError, TransportError};
use async_trait::async_trait;
use mockall::automock;
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::error::RpcFailure;

pub const DEFAULT_SYNC_METHOD: &str = "eth_sendRawTransactionSync";

/// What could be read from the result of the synchronous send.
///
/// Nodes differ in what they return: a full receipt object, a partial one, or a
/// bare transaction hash. Any non-null result means the transaction was
/// included, so fields that are missing or do not parse are left empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InclusionReceipt {
    pub transaction_hash: Option<B256>,
    pub block_number: Option<U64>,
    pub status: Option<U64>,
}

impl InclusionReceipt {
    pub fn from_result(result: &Value) -> Self {
        match result {
            Value::String(_) => Self {
                transaction_hash: parse_field(result),
                ..Default::default()
            },
            Value::Object(fields) => Self {
                transaction_hash: fields.get("transactionHash").and_then(parse_field),
                block_number: fields.get("blockNumber").and_then(parse_field),
                status: fields.get("status").and_then(parse_status),
            },
            _ => Self::default(),
        }
    }
}

fn parse_field<T: DeserializeOwned>(value: &Value) -> Option<T> {
    T::deserialize(value).ok()
}

fn parse_status(value: &Value) -> Option<U64> {
    match value {
        Value::Bool(ok) => Some(U64::from(*ok as u8)),
        Value::Number(n) => n.as_u64().map(U64::from),
        other => parse_field(other),
    }
}

/// Remote calls a measurement run needs from the chain.
#[automock]
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Cheapest round trip to check the endpoint answers at all.
    async fn block_number(&self) -> Result<u64, RpcFailure>;

    /// Confirmed transaction count of `address` at the latest block.
    async fn transaction_count(&self, address: Address) -> Result<u64, RpcFailure>;

    async fn chain_id(&self) -> Result<u64, RpcFailure>;

    async fn gas_price(&self) -> Result<u128, RpcFailure>;

    /// Submits a `0x`-prefixed raw transaction and blocks until the node
    /// reports it included. Returns the raw JSON-RPC result; `Ok(None)` means
    /// the call succeeded with a `null` result.
    async fn send_raw_transaction_sync(&self, raw_tx: String) -> Result<Option<Value>, RpcFailure>;
}

/// JSON-RPC over HTTP client for a single endpoint.
#[derive(Debug, Clone)]
pub struct RpcChainClient {
    provider: RootProvider<Ethereum>,
    sync_method: String,
}

impl RpcChainClient {
    pub fn new(url: Url, sync_method: impl Into<String>) -> Self {
        let client = RpcClient::builder().http(url);
        Self {
            provider: RootProvider::<Ethereum>::new(client),
            sync_method: sync_method.into(),
        }
    }
}

#[async_trait]
impl ChainClient for RpcChainClient {
    async fn block_number(&self) -> Result<u64, RpcFailure> {
        Ok(self.provider.get_block_number().await?)
    }

    async fn transaction_count(&self, address: Address) -> Result<u64, RpcFailure> {
        Ok(self
            .provider
            .get_transaction_count(address)
            .block_id(BlockId::latest())
            .await?)
    }

    async fn chain_id(&self) -> Result<u64, RpcFailure> {
        Ok(self.provider.get_chain_id().await?)
    }

    async fn gas_price(&self) -> Result<u128, RpcFailure> {
        Ok(self.provider.get_gas_price().await?)
    }

    async fn send_raw_transaction_sync(&self, raw_tx: String) -> Result<Option<Value>, RpcFailure> {
        debug!(method = %self.sync_method, "submitting raw transaction");

        let result = self
            .provider
            .client()
            .request::<_, Option<Value>>(self.sync_method.clone(), (raw_tx,))
            .await;

        match result {
            Ok(Some(Value::Null)) | Err(RpcError::NullResp) => Ok(None),
            Ok(value) => Ok(value),
            Err(err) => Err(err.into()),
        }
    }
}

impl From<TransportError> for RpcFailure {
    fn from(err: TransportError) -> Self {
        match err {
            RpcError::ErrorResp(payload) => {
                let message = match &payload.data {
                    Some(data) => format!("{} ({})", payload.message, data.get()),
                    None => payload.message.to_string(),
                };
                RpcFailure::Remote {
                    code: payload.code,
                    message,
                }
            }
            other => RpcFailure::Transport(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::b256;
    use serde_json::json;

    const HASH: B256 = b256!("9f2ab4a3a1d7e2b1c24f1e8cf0a0ab6b1f3b10a2e1dbd7f7c3a5e34a7a2b8c11");

    #[test]
    fn test_receipt_from_full_object() {
        let receipt = InclusionReceipt::from_result(&json!({
            "transactionHash": HASH,
            "blockNumber": "0x1b4",
            "status": "0x1",
            "logs": [],
            "gasUsed": "0x6d60"
        }));

        assert_eq!(receipt.transaction_hash, Some(HASH));
        assert_eq!(receipt.block_number, Some(U64::from(436)));
        assert_eq!(receipt.status, Some(U64::from(1)));
    }

    #[test]
    fn test_receipt_from_bare_hash() {
        let receipt = InclusionReceipt::from_result(&json!(HASH));
        assert_eq!(receipt.transaction_hash, Some(HASH));
        assert_eq!(receipt.block_number, None);
    }

    #[test]
    fn test_receipt_tolerates_odd_field_types() {
        let receipt = InclusionReceipt::from_result(&json!({
            "status": true,
            "blockNumber": 12,
            "transactionHash": "not a hash"
        }));
        assert_eq!(receipt.status, Some(U64::from(1)));
        assert_eq!(receipt.transaction_hash, None);

        assert_eq!(InclusionReceipt::from_result(&json!({})), InclusionReceipt::default());
        assert_eq!(InclusionReceipt::from_result(&json!(7)), InclusionReceipt::default());
    }
}
