//! Collateralization ratio calculator.
//!
//! CR = bond_value_wei / lot_value_wei, where lot_value_wei = lot_size_satoshis * wei_per_satoshi.
//!
//! All intermediate products are exact 512-bit integers. Threshold checks are
//! decided by cross-multiplication, so a ratio sitting exactly on a threshold
//! is never pushed across it by float rounding. The `f64` ratio is derived
//! from an 18-decimal quotient and only feeds display and sorting.

use alloy::primitives::{U256, U512};

use tbtc_common::error::Unavailable;
use tbtc_common::numeric::{self, pow10, widen};
use tbtc_common::types::{Deposit, PriceSample};

use crate::units::WEI_SATOSHI_SHIFT;

/// Fractional digits kept in quotients before converting to `f64`.
const QUOTIENT_DECIMALS: u32 = 18;

/// Exact collateralization of one deposit at one price.
#[derive(Debug, Clone, PartialEq)]
pub struct Collateralization {
    bond_wei: U512,
    /// Lot value in wei, scaled by 10^18 (the price's fixed-point scale).
    lot_value_wei_fixed: U512,
    ratio: f64,
}

impl Collateralization {
    /// Bond value divided by lot value (1.5 = 150%).
    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    pub fn ratio_percent(&self) -> f64 {
        self.ratio * 100.0
    }

    /// Lot value in wei, for display.
    pub fn lot_value_wei(&self) -> f64 {
        numeric::fixed_to_f64(self.lot_value_wei_fixed, PriceSample::DECIMALS)
    }

    /// Whether `ratio * 100 < threshold_percent`, decided exactly.
    ///
    /// Equality is not "below": a ratio exactly on the threshold belongs to
    /// the less severe side.
    pub fn is_below_percent(&self, threshold_percent: u32) -> bool {
        // bond / (lot_fixed / 10^18) * 100 < threshold
        //   <=> bond * 100 * 10^18 < threshold * lot_fixed
        let lhs = self.bond_wei * U512::from(100u64) * pow10(PriceSample::DECIMALS);
        match U512::from(threshold_percent).checked_mul(self.lot_value_wei_fixed) {
            Some(rhs) => lhs < rhs,
            // rhs exceeds 512 bits, so it is larger than any lhs.
            None => true,
        }
    }
}

/// Compute the collateralization of a bond against a lot at the given price.
///
/// Unavailable when there is no price sample yet, the sample is malformed, or
/// the lot is worth zero wei.
pub fn collateralization(
    bond_wei: U256,
    lot_size_satoshis: U256,
    price: Option<&PriceSample>,
) -> Result<Collateralization, Unavailable> {
    let price = price.ok_or(Unavailable::MissingPrice)?;

    let wei_per_satoshi = price.wei_per_satoshi_fixed()?;

    let bond_wei = widen(bond_wei);
    let lot_value_wei_fixed = widen(lot_size_satoshis) * widen(wei_per_satoshi);
    if lot_value_wei_fixed.is_zero() {
        return Err(Unavailable::ZeroLotValue);
    }

    // ratio * 10^18 = bond * 10^18 / (lot_fixed / 10^18)
    let scaled = bond_wei * pow10(QUOTIENT_DECIMALS + PriceSample::DECIMALS) / lot_value_wei_fixed;
    let mut ratio = numeric::fixed_to_f64(scaled, QUOTIENT_DECIMALS);
    if ratio == 0.0 && !bond_wei.is_zero() {
        // Quotient underflowed 18 decimals; fall back to float division so a
        // non-zero bond never reports a zero ratio.
        let bond = numeric::fixed_to_f64(bond_wei, 0);
        let lot_value = numeric::fixed_to_f64(lot_value_wei_fixed, PriceSample::DECIMALS);
        ratio = bond / lot_value;
    }

    Ok(Collateralization {
        bond_wei,
        lot_value_wei_fixed,
        ratio,
    })
}

/// Collateralization ratio as a plain number (1.5 = 150%).
pub fn collateralization_ratio(
    bond_wei: U256,
    lot_size_satoshis: U256,
    price: Option<&PriceSample>,
) -> Result<f64, Unavailable> {
    collateralization(bond_wei, lot_size_satoshis, price).map(|c| c.ratio())
}

/// Collateralization of a deposit snapshot. Malformed amounts are unavailable.
pub fn deposit_collateralization(
    deposit: &Deposit,
    price: Option<&PriceSample>,
) -> Result<Collateralization, Unavailable> {
    let bond_wei = deposit.bond.total_bond_amount.parse()?;
    let lot_size = deposit.lot_size_satoshis.parse()?;
    collateralization(bond_wei, lot_size, price).inspect_err(|reason| {
        tracing::debug!(deposit_id = %deposit.id, %reason, "Collateralization unavailable");
    })
}

/// BTC-per-ETH price at which the deposit would sit exactly at `target_ratio`.
///
/// Inverse of the ratio formula: with ratio = bond / (lot * wei_per_satoshi),
/// wei_per_satoshi = bond / (ratio * lot). Wei carry 18 decimals and satoshis
/// carry 8, so BTC/ETH = 10^(18 - 8) / wei_per_satoshi = ratio * lot * 10^10 / bond.
pub fn price_at_collateralization_ratio(
    bond_wei: U256,
    lot_size_satoshis: U256,
    target_ratio: f64,
) -> Result<f64, Unavailable> {
    if !target_ratio.is_finite() || target_ratio < 0.0 {
        return Err(Unavailable::MalformedNumeric(target_ratio.to_string()));
    }
    if bond_wei.is_zero() {
        return Err(Unavailable::ZeroBond);
    }

    // lot * 10^10 / bond, kept with 18 fractional digits.
    let scaled = widen(lot_size_satoshis) * pow10(WEI_SATOSHI_SHIFT + QUOTIENT_DECIMALS) / widen(bond_wei);
    Ok(target_ratio * numeric::fixed_to_f64(scaled, QUOTIENT_DECIMALS))
}

/// Prices (BTC per ETH) at which a deposit crosses its collateral thresholds.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct ThresholdPrices {
    /// Crossing `undercollateralized_threshold_percent` (courtesy call).
    pub courtesy_call: f64,
    /// Crossing `severely_undercollateralized_threshold_percent` (liquidation).
    pub liquidation: f64,
}

pub fn threshold_prices(deposit: &Deposit) -> Result<ThresholdPrices, Unavailable> {
    let bond_wei = deposit.bond.total_bond_amount.parse()?;
    let lot_size = deposit.lot_size_satoshis.parse()?;
    let at = |percent: u32| price_at_collateralization_ratio(bond_wei, lot_size, f64::from(percent) / 100.0);

    Ok(ThresholdPrices {
        courtesy_call: at(deposit.undercollateralized_threshold()?)?,
        liquidation: at(deposit.severely_undercollateralized_threshold()?)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn eth(n: u64) -> U256 {
        U256::from(n) * U256::from(10u64).pow(U256::from(18u64))
    }

    fn price(wei_per_sat: &str) -> PriceSample {
        PriceSample::from_decimal(wei_per_sat, Utc::now()).unwrap()
    }

    #[test]
    fn test_ratio_150_eth_bond_one_btc_lot() {
        let p = price("30000000000");
        let c = collateralization(eth(150), U256::from(100_000_000u64), Some(&p)).unwrap();
        assert_eq!(c.lot_value_wei(), 3e18);
        assert_eq!(c.ratio(), 50.0);
        assert_eq!(c.ratio_percent(), 5000.0);
    }

    #[test]
    fn test_missing_price_is_unavailable_not_zero() {
        let result = collateralization_ratio(eth(150), U256::from(100_000_000u64), None);
        assert_eq!(result, Err(Unavailable::MissingPrice));
    }

    #[test]
    fn test_zero_lot_value_is_unavailable() {
        let p = price("30000000000");
        assert_eq!(
            collateralization_ratio(eth(150), U256::ZERO, Some(&p)),
            Err(Unavailable::ZeroLotValue)
        );
        let zero = price("0");
        assert_eq!(
            collateralization_ratio(eth(150), U256::from(100_000_000u64), Some(&zero)),
            Err(Unavailable::ZeroLotValue)
        );
    }

    #[test]
    fn test_zero_bond_is_zero_ratio() {
        let p = price("30000000000");
        assert_eq!(collateralization_ratio(U256::ZERO, U256::from(100_000_000u64), Some(&p)), Ok(0.0));
    }

    #[test]
    fn test_is_below_percent_exact_on_threshold() {
        // 135 ETH bond against 100 ETH of lot value is exactly 135%.
        let p = price("1000000000000");
        let c = collateralization(eth(135), U256::from(100_000_000u64), Some(&p)).unwrap();
        assert!(!c.is_below_percent(135));
        assert!(c.is_below_percent(136));
        assert!(!c.is_below_percent(134));
    }

    #[test]
    fn test_is_below_percent_one_wei_under() {
        let p = price("1000000000000");
        let bond = eth(135) - U256::from(1u64);
        let c = collateralization(bond, U256::from(100_000_000u64), Some(&p)).unwrap();
        assert!(c.is_below_percent(135));
    }

    #[test]
    fn test_malformed_price_is_unavailable() {
        let p = PriceSample::from_raw("3.0e10", Utc::now());
        assert_eq!(
            collateralization_ratio(eth(150), U256::from(100_000_000u64), Some(&p)),
            Err(Unavailable::MalformedNumeric("3.0e10".to_string()))
        );
    }

    #[test]
    fn test_price_at_ratio_pins_ten_decimal_shift() {
        // 1 BTC lot, 10 ETH bond: at ratio 1.0 the lot is worth exactly the bond,
        // i.e. 10 ETH per BTC = 0.1 BTC per ETH.
        let price = price_at_collateralization_ratio(eth(10), U256::from(100_000_000u64), 1.0).unwrap();
        assert!((price - 0.1).abs() < 1e-15);
    }

    #[test]
    fn test_price_at_ratio_round_trip() {
        let p = price("30000000000");
        let bond = eth(150);
        let lot = U256::from(100_000_000u64);
        let ratio = collateralization_ratio(bond, lot, Some(&p)).unwrap();
        let recovered = price_at_collateralization_ratio(bond, lot, ratio).unwrap();
        let expected = p.btc_per_eth().unwrap();
        assert!((recovered - expected).abs() / expected < 1e-12);
    }

    #[test]
    fn test_price_at_ratio_rejects_bad_input() {
        let lot = U256::from(100_000_000u64);
        assert_eq!(price_at_collateralization_ratio(U256::ZERO, lot, 1.5), Err(Unavailable::ZeroBond));
        assert!(matches!(
            price_at_collateralization_ratio(eth(1), lot, f64::NAN),
            Err(Unavailable::MalformedNumeric(_))
        ));
        assert!(matches!(
            price_at_collateralization_ratio(eth(1), lot, -1.0),
            Err(Unavailable::MalformedNumeric(_))
        ));
    }

    #[test]
    fn test_huge_bond_does_not_overflow() {
        let p = price("30000000000");
        let ratio = collateralization_ratio(U256::MAX, U256::from(1u64), Some(&p)).unwrap();
        assert!(ratio.is_finite());
        assert!(ratio > 1e50);
    }
}
