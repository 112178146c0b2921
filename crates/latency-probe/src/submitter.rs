use alloy_primitives::hex;
use tracing::debug;

use crate::{
    client::{ChainClient, InclusionReceipt},
    error::SubmitError,
    signer::SignedTransaction,
};

/// Sends signed transactions through the node's blocking send extension.
pub struct SyncSubmitter<'a, C: ChainClient + ?Sized> {
    chain: &'a C,
}

impl<'a, C: ChainClient + ?Sized> SyncSubmitter<'a, C> {
    pub fn new(chain: &'a C) -> Self {
        Self { chain }
    }

    /// Returns once the node reports the transaction included.
    pub async fn submit(&self, signed: &SignedTransaction) -> Result<InclusionReceipt, SubmitError> {
        let raw_tx = canonical_hex(signed)?;
        debug!(bytes = (raw_tx.len() - 2) / 2, "sync submit");

        let result = self
            .chain
            .send_raw_transaction_sync(raw_tx)
            .await?
            .ok_or(SubmitError::EmptyResult)?;
        Ok(InclusionReceipt::from_result(&result))
    }
}

/// Normalizes either representation to lowercase `0x`-prefixed hex.
pub fn canonical_hex(signed: &SignedTransaction) -> Result<String, SubmitError> {
    match signed {
        SignedTransaction::Raw(bytes) => {
            if bytes.is_empty() {
                return Err(SubmitError::InvalidInput("empty transaction bytes".to_string()));
            }
            Ok(hex::encode_prefixed(bytes))
        }
        SignedTransaction::Hex(text) => {
            let trimmed = text.trim();
            let digits = trimmed
                .strip_prefix("0x")
                .or_else(|| trimmed.strip_prefix("0X"))
                .unwrap_or(trimmed);

            if digits.is_empty() {
                return Err(SubmitError::InvalidInput("empty transaction hex".to_string()));
            }
            let bytes = hex::decode(digits)
                .map_err(|e| SubmitError::InvalidInput(format!("not hex encoded: {e}")))?;
            Ok(hex::encode_prefixed(bytes))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{client::MockChainClient, error::RpcFailure};
    use alloy_primitives::{Bytes, U64, b256};
    use mockall::predicate::eq;
    use serde_json::json;

    #[test]
    fn test_canonical_hex_forms_agree() {
        let raw = SignedTransaction::Raw(Bytes::from_static(&[0xf8, 0x6b, 0x01]));
        let bare = SignedTransaction::Hex("f86b01".to_string());
        let prefixed = SignedTransaction::Hex("0xF86B01".to_string());

        assert_eq!(canonical_hex(&raw).unwrap(), "0xf86b01");
        assert_eq!(canonical_hex(&bare).unwrap(), "0xf86b01");
        assert_eq!(canonical_hex(&prefixed).unwrap(), "0xf86b01");
    }

    #[test]
    fn test_canonical_hex_rejects_bad_input() {
        for bad in [
            SignedTransaction::Raw(Bytes::new()),
            SignedTransaction::Hex("0x".to_string()),
            SignedTransaction::Hex("0xzz".to_string()),
        ] {
            assert!(matches!(
                canonical_hex(&bad),
                Err(SubmitError::InvalidInput(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_submit_returns_receipt() {
        let mut chain = MockChainClient::new();
        chain
            .expect_send_raw_transaction_sync()
            .with(eq("0xabcd".to_string()))
            .times(1)
            .returning(|_| Ok(Some(json!({"blockNumber": "0x9", "status": "0x1"}))));

        let submitter = SyncSubmitter::new(&chain);
        let got = submitter
            .submit(&SignedTransaction::Hex("abcd".to_string()))
            .await
            .unwrap();
        assert_eq!(got.block_number, Some(U64::from(9)));
        assert_eq!(got.status, Some(U64::from(1)));
    }

    #[tokio::test]
    async fn test_submit_accepts_non_object_result() {
        let hash = b256!("9f2ab4a3a1d7e2b1c24f1e8cf0a0ab6b1f3b10a2e1dbd7f7c3a5e34a7a2b8c11");
        let mut chain = MockChainClient::new();
        chain
            .expect_send_raw_transaction_sync()
            .times(1)
            .returning(move |_| Ok(Some(json!(hash))));

        let got = SyncSubmitter::new(&chain)
            .submit(&SignedTransaction::Raw(Bytes::from_static(&[1])))
            .await
            .unwrap();
        assert_eq!(got.transaction_hash, Some(hash));
    }

    #[tokio::test]
    async fn test_submit_accepts_boolean_status() {
        let mut chain = MockChainClient::new();
        chain
            .expect_send_raw_transaction_sync()
            .returning(|_| Ok(Some(json!({"status": true}))));

        let got = SyncSubmitter::new(&chain)
            .submit(&SignedTransaction::Raw(Bytes::from_static(&[1])))
            .await
            .unwrap();
        assert_eq!(got.status, Some(U64::from(1)));
    }

    #[tokio::test]
    async fn test_submit_null_result_is_empty() {
        let mut chain = MockChainClient::new();
        chain
            .expect_send_raw_transaction_sync()
            .returning(|_| Ok(None));

        let err = SyncSubmitter::new(&chain)
            .submit(&SignedTransaction::Raw(Bytes::from_static(&[1])))
            .await
            .unwrap_err();
        assert_eq!(err, SubmitError::EmptyResult);
    }

    #[tokio::test]
    async fn test_submit_surfaces_remote_error() {
        let mut chain = MockChainClient::new();
        chain.expect_send_raw_transaction_sync().returning(|_| {
            Err(RpcFailure::Remote {
                code: -32000,
                message: "replacement transaction underpriced".to_string(),
            })
        });

        let err = SyncSubmitter::new(&chain)
            .submit(&SignedTransaction::Raw(Bytes::from_static(&[1])))
            .await
            .unwrap_err();
        assert!(matches!(err, SubmitError::Remote { code: -32000, .. }));
    }

    #[tokio::test]
    async fn test_invalid_input_never_reaches_node() {
        let mut chain = MockChainClient::new();
        chain.expect_send_raw_transaction_sync().never();

        let err = SyncSubmitter::new(&chain)
            .submit(&SignedTransaction::Hex("not hex".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, SubmitError::InvalidInput(_)));
    }
}
