//! Transaction builder for price batch submission

use alloy_primitives::{hex, Address, Bytes, U256};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use oracle_core::{ExecutionError, ExecutionResult, MAX_DECIMALS};

use crate::notifee::PriceChange;

/// Endpoint of the aggregator contract receiving price batches
pub const SUBMIT_BATCH_FUNCTION: &str = "submitBatch";

/// Transaction format version sent to the gateway
pub const TX_VERSION: u32 = 1;

/// Account-independent part of a transaction, as produced by the builder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxPayload {
    pub receiver: Address,
    pub value: U256,
    pub data: Bytes,
    pub gas_limit: u64,
}

/// Complete transaction, signed once a nonce has been assigned
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub nonce: u64,
    pub value: U256,
    pub receiver: Address,
    pub sender: Address,
    pub gas_price: u64,
    pub gas_limit: u64,
    pub data: Bytes,
    pub chain_id: String,
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<Bytes>,
}

impl Transaction {
    /// Canonical bytes covered by the signature
    pub fn signing_message(&self) -> ExecutionResult<Vec<u8>> {
        let unsigned = Transaction {
            signature: None,
            ..self.clone()
        };
        serde_json::to_vec(&unsigned)
            .map_err(|e| ExecutionError::SigningFailed(format!("cannot serialize transaction: {}", e)))
    }

    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }
}

/// Transaction builder
#[derive(Debug, Clone)]
pub struct TransactionBuilder {
    contract: Address,
    base_gas_limit: u64,
    gas_limit_for_each: u64,
}

impl TransactionBuilder {
    pub fn new(contract: Address, base_gas_limit: u64, gas_limit_for_each: u64) -> Self {
        Self {
            contract,
            base_gas_limit,
            gas_limit_for_each,
        }
    }

    pub fn contract(&self) -> Address {
        self.contract
    }

    /// Gas limit of a batch carrying `num_prices` values
    pub fn gas_limit(&self, num_prices: usize) -> u64 {
        self.gas_limit_for_each
            .saturating_mul(num_prices as u64)
            .saturating_add(self.base_gas_limit)
    }

    /// Build the contract call for a batch of price changes
    pub fn build_submit_batch(&self, changes: &[PriceChange]) -> ExecutionResult<TxPayload> {
        let data = encode_submit_batch(changes)?;

        Ok(TxPayload {
            receiver: self.contract,
            value: U256::ZERO,
            data: Bytes::from(data.into_bytes()),
            gas_limit: self.gas_limit(changes.len()),
        })
    }
}

/// `submitBatch@base@quote@timestamp@price@decimals...` call data
pub fn encode_submit_batch(changes: &[PriceChange]) -> ExecutionResult<String> {
    if changes.is_empty() {
        return Err(ExecutionError::InvalidNotification("empty price batch".into()));
    }

    let mut data = String::from(SUBMIT_BATCH_FUNCTION);
    for change in changes {
        let timestamp = u64::try_from(change.timestamp.timestamp()).map_err(|_| {
            ExecutionError::InvalidNotification(format!(
                "{}-{}: timestamp before epoch",
                change.base, change.quote
            ))
        })?;
        let price = denominate(change.price, change.decimals).map_err(|e| match e {
            ExecutionError::InvalidNotification(reason) => ExecutionError::InvalidNotification(
                format!("{}-{}: {}", change.base, change.quote, reason),
            ),
            other => other,
        })?;

        for arg in [
            hex::encode(change.base.as_bytes()),
            hex::encode(change.quote.as_bytes()),
            encode_uint(U256::from(timestamp)),
            encode_uint(price),
            encode_uint(U256::from(change.decimals)),
        ] {
            data.push('@');
            data.push_str(&arg);
        }
    }
    Ok(data)
}

/// Integer value of `price * 10^decimals`, truncated
pub fn denominate(price: Decimal, decimals: u32) -> ExecutionResult<U256> {
    if price.is_sign_negative() && !price.is_zero() {
        return Err(ExecutionError::InvalidNotification(format!("negative price {}", price)));
    }
    if decimals > MAX_DECIMALS {
        return Err(ExecutionError::InvalidNotification(format!(
            "decimals {} above maximum {}",
            decimals, MAX_DECIMALS
        )));
    }

    let mantissa = U256::from(price.mantissa().unsigned_abs());
    let scale = price.scale();
    let ten = U256::from(10u8);

    if decimals >= scale {
        ten.checked_pow(U256::from(decimals - scale))
            .and_then(|factor| mantissa.checked_mul(factor))
            .ok_or_else(|| ExecutionError::InvalidNotification(format!("price {} overflows", price)))
    } else {
        let divisor = ten.pow(U256::from(scale - decimals));
        Ok(mantissa / divisor)
    }
}

/// Minimal big-endian hex, empty for zero
fn encode_uint(value: U256) -> String {
    hex::encode(value.to_be_bytes_trimmed_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::str::FromStr;

    fn change(base: &str, quote: &str, price: &str, decimals: u32) -> PriceChange {
        PriceChange {
            base: base.into(),
            quote: quote.into(),
            price: Decimal::from_str(price).unwrap(),
            decimals,
            timestamp: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        }
    }

    #[test]
    fn test_denominate() {
        assert_eq!(denominate(Decimal::from_str("10.1").unwrap(), 2).unwrap(), U256::from(1010u64));
        assert_eq!(denominate(Decimal::from_str("41.239").unwrap(), 2).unwrap(), U256::from(4123u64));
        assert_eq!(
            denominate(Decimal::from_str("1.5").unwrap(), 18).unwrap(),
            U256::from(1_500_000_000_000_000_000u128)
        );
        assert_eq!(denominate(Decimal::ZERO, 6).unwrap(), U256::ZERO);
        assert!(denominate(Decimal::from_str("-1").unwrap(), 2).is_err());
    }

    #[test]
    fn test_encode_single_price() {
        let data = encode_submit_batch(&[change("EGLD", "USD", "10.1", 2)]).unwrap();
        // 1_700_000_000 = 0x6553f100, 1010 = 0x03f2
        assert_eq!(data, "submitBatch@45474c44@555344@6553f100@03f2@02");
    }

    #[test]
    fn test_encode_batch_repeats_arguments() {
        let data = encode_submit_batch(&[
            change("EGLD", "USD", "10.1", 2),
            change("BTC", "USD", "0", 0),
        ])
        .unwrap();
        let args: Vec<&str> = data.split('@').collect();
        assert_eq!(args.len(), 1 + 2 * 5);
        assert_eq!(args[6], "425443");
        // zero encodes as an empty argument
        assert_eq!(args[9], "");
        assert_eq!(args[10], "");
    }

    #[test]
    fn test_empty_batch_rejected() {
        let err = encode_submit_batch(&[]).unwrap_err();
        assert!(matches!(err, ExecutionError::InvalidNotification(_)));
    }

    #[test]
    fn test_gas_limit_scales_with_batch() {
        let builder = TransactionBuilder::new(Address::repeat_byte(7), 5_000_000, 1_500_000);
        assert_eq!(builder.gas_limit(1), 6_500_000);
        assert_eq!(builder.gas_limit(2), 8_000_000);

        let payload = builder
            .build_submit_batch(&[change("EGLD", "USD", "10.1", 2), change("BTC", "USD", "1", 2)])
            .unwrap();
        assert_eq!(payload.gas_limit, 8_000_000);
        assert_eq!(payload.receiver, Address::repeat_byte(7));
        assert_eq!(payload.value, U256::ZERO);
        assert!(payload.data.starts_with(b"submitBatch@"));
    }

    #[test]
    fn test_signing_message_excludes_signature() {
        let tx = Transaction {
            nonce: 3,
            value: U256::ZERO,
            receiver: Address::repeat_byte(1),
            sender: Address::repeat_byte(2),
            gas_price: 1_000_000_000,
            gas_limit: 6_500_000,
            data: Bytes::from_static(b"submitBatch"),
            chain_id: "D".into(),
            version: TX_VERSION,
            signature: None,
        };
        let signed = Transaction {
            signature: Some(Bytes::from(vec![1u8; 65])),
            ..tx.clone()
        };

        assert_eq!(tx.signing_message().unwrap(), signed.signing_message().unwrap());
        let json: serde_json::Value = serde_json::from_slice(&tx.signing_message().unwrap()).unwrap();
        assert!(json.get("signature").is_none());
        assert_eq!(json["gasLimit"], 6_500_000);
        assert_eq!(json["chainId"], "D");
    }
}
