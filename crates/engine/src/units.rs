//! Conversions between integer base units and human decimal units.
//!
//! Results are `f64` and meant for display only. Amounts are parsed into
//! `U256` first so wei values beyond 2^53 keep ~15 significant digits.

use alloy::primitives::U256;

use tbtc_common::error::Unavailable;
use tbtc_common::numeric::{self, widen};
use tbtc_common::types::RawAmount;

/// Decimal places of BTC (satoshis per BTC = 10^8).
pub const BTC_DECIMALS: u32 = 8;

/// Decimal places of ETH (wei per ETH = 10^18).
pub const ETH_DECIMALS: u32 = 18;

/// TBTC amounts are reported in satoshi-equivalent units.
pub const TBTC_DECIMALS: u32 = BTC_DECIMALS;

/// Decimal shift between wei and satoshi base units.
pub const WEI_SATOSHI_SHIFT: u32 = ETH_DECIMALS - BTC_DECIMALS;

pub fn satoshis_to_btc(sats: u64) -> f64 {
    numeric::fixed_to_f64(widen(U256::from(sats)), BTC_DECIMALS)
}

pub fn satoshis_to_tbtc(sats: u64) -> f64 {
    numeric::fixed_to_f64(widen(U256::from(sats)), TBTC_DECIMALS)
}

/// Satoshi amount as delivered by the subgraph, converted to BTC.
pub fn raw_satoshis_to_btc(sats: &RawAmount) -> Result<f64, Unavailable> {
    Ok(numeric::fixed_to_f64(widen(sats.parse()?), BTC_DECIMALS))
}

/// Wei amount (decimal string, any size up to 256 bits) converted to ETH.
pub fn wei_to_eth(wei: &str) -> Result<f64, Unavailable> {
    Ok(wei_amount_to_eth(numeric::parse_integer(wei)?))
}

pub fn wei_amount_to_eth(wei: U256) -> f64 {
    numeric::fixed_to_f64(widen(wei), ETH_DECIMALS)
}

/// Signer fee as a fraction of the lot, from the governance fee divisor.
///
/// Returns `None` for a zero divisor.
pub fn signer_fee_fraction(divisor: u64) -> Option<f64> {
    (divisor > 0).then(|| 1.0 / divisor as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_satoshis_to_btc() {
        assert_eq!(satoshis_to_btc(100_000_000), 1.0);
        assert_eq!(satoshis_to_btc(50_000_000), 0.5);
        assert_eq!(satoshis_to_btc(1), 0.00000001);
        assert_eq!(satoshis_to_btc(0), 0.0);
    }

    #[test]
    fn test_tbtc_shares_btc_shift() {
        for sats in [0, 1, 1_000_000, 100_000_000, 2_100_000_000_000_000] {
            assert_eq!(satoshis_to_tbtc(sats), satoshis_to_btc(sats));
        }
    }

    #[test]
    fn test_raw_satoshis() {
        assert_eq!(raw_satoshis_to_btc(&RawAmount::new("1000000")).unwrap(), 0.01);
        assert!(raw_satoshis_to_btc(&RawAmount::new("0.5")).is_err());
    }

    #[test]
    fn test_wei_to_eth() {
        assert_eq!(wei_to_eth("1000000000000000000").unwrap(), 1.0);
        assert_eq!(wei_to_eth("150000000000000000000").unwrap(), 150.0);
        assert_eq!(wei_to_eth("1").unwrap(), 1e-18);
    }

    #[test]
    fn test_wei_to_eth_beyond_u64() {
        // 12345678901234567890.123456789012345678 ETH, far past u64 wei.
        let eth = wei_to_eth("12345678901234567890123456789012345678").unwrap();
        assert!((eth / 12345678901234567890.123456789 - 1.0).abs() < 1e-14);
    }

    #[test]
    fn test_wei_to_eth_malformed() {
        assert!(matches!(wei_to_eth("0xff"), Err(Unavailable::MalformedNumeric(_))));
        assert!(matches!(wei_to_eth(""), Err(Unavailable::MalformedNumeric(_))));
    }

    #[test]
    fn test_shift_is_difference_of_decimals() {
        assert_eq!(WEI_SATOSHI_SHIFT, 10);
    }

    #[test]
    fn test_signer_fee_fraction() {
        assert_eq!(signer_fee_fraction(2000), Some(0.0005));
        assert_eq!(signer_fee_fraction(0), None);
    }
}
