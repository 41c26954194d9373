use std::path::Path;

use serde::{Deserialize, Serialize};

use tbtc_common::error::AppError;
use tbtc_common::types::{Deposit, PriceSample};

/// A full picture of the deposits and the latest price, as fetched from the
/// subgraph and price feed. Every refresh replaces the previous snapshot
/// wholesale; nothing is patched in place.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub deposits: Vec<Deposit>,
    /// `None` until the price feed has produced a sample.
    #[serde(default)]
    pub price: Option<PriceSample>,
}

impl Snapshot {
    pub fn from_json(raw: &str) -> Result<Self, AppError> {
        serde_json::from_str(raw).map_err(|e| AppError::Snapshot(format!("invalid snapshot: {}", e)))
    }

    /// Read and parse a snapshot file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let raw = tokio::fs::read_to_string(path.as_ref()).await?;
        Self::from_json(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_deposits_and_price() {
        let snapshot = Snapshot::from_json(
            r#"{
                "deposits": [{
                    "id": "dp-1",
                    "lotSizeSatoshis": "100000000",
                    "currentState": "ACTIVE",
                    "updatedAt": "1600000000",
                    "initialCollateralizedPercent": 150,
                    "undercollateralizedThresholdPercent": 135,
                    "severelyUndercollateralizedThresholdPercent": 110,
                    "bondedECDSAKeep": { "totalBondAmount": "150000000000000000000" }
                }],
                "price": { "weiPerSat": "30000000000", "timestamp": 1600000000 }
            }"#,
        )
        .unwrap();

        assert_eq!(snapshot.deposits.len(), 1);
        assert_eq!(snapshot.deposits[0].id, "dp-1");
        assert_eq!(snapshot.price.unwrap().wei_per_satoshi(), Ok(3e10));
    }

    #[test]
    fn test_missing_price_is_none() {
        let snapshot = Snapshot::from_json(r#"{ "deposits": [] }"#).unwrap();
        assert!(snapshot.deposits.is_empty());
        assert!(snapshot.price.is_none());
    }

    #[test]
    fn test_malformed_price_is_kept() {
        let snapshot =
            Snapshot::from_json(r#"{ "deposits": [], "price": { "weiPerSat": "3.0e10", "timestamp": 1600000000 } }"#)
                .unwrap();
        let price = snapshot.price.unwrap();
        assert_eq!(price.raw(), "3.0e10");
        assert!(price.btc_per_eth().is_err());
    }

    #[test]
    fn test_rejects_invalid_json() {
        assert!(matches!(Snapshot::from_json("{ nope"), Err(AppError::Snapshot(_))));
    }

    #[tokio::test]
    async fn test_load_missing_file_is_io_error() {
        let result = Snapshot::load("/definitely/not/here/snapshot.json").await;
        assert!(matches!(result, Err(AppError::Io(_))));
    }
}
