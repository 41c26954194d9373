//! Liquidation ranking: which deposits in a lifecycle bucket are most at risk.
//!
//! For a bucket and a price sample:
//! 1. Keep deposits whose `current_state` equals the bucket's state exactly
//! 2. Compute each deposit's collateralization (or why it is unavailable)
//! 3. Stable-sort by ascending ratio, most undercollateralized first
//!
//! Deposits without a computable ratio keep their input order and sit after
//! every ranked deposit. With no price at all, the input order is returned as is.

use std::cmp::Ordering;

use serde::Serialize;

use tbtc_common::error::Unavailable;
use tbtc_common::types::{Deposit, LifecycleState, PriceSample};

use crate::classifier::{RiskTier, risk_tier};
use crate::cr_calculator::{Collateralization, deposit_collateralization};

/// Lifecycle buckets offered by the liquidation scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LiquidationBucket {
    Active,
    CourtesyCall,
    FraudLiquidationInProgress,
    LiquidationInProgress,
    Liquidated,
}

impl LiquidationBucket {
    pub const ALL: [LiquidationBucket; 5] = [
        LiquidationBucket::Active,
        LiquidationBucket::CourtesyCall,
        LiquidationBucket::FraudLiquidationInProgress,
        LiquidationBucket::LiquidationInProgress,
        LiquidationBucket::Liquidated,
    ];

    pub fn state(&self) -> LifecycleState {
        match self {
            LiquidationBucket::Active => LifecycleState::Active,
            LiquidationBucket::CourtesyCall => LifecycleState::CourtesyCall,
            LiquidationBucket::FraudLiquidationInProgress => LifecycleState::FraudLiquidationInProgress,
            LiquidationBucket::LiquidationInProgress => LifecycleState::LiquidationInProgress,
            LiquidationBucket::Liquidated => LifecycleState::Liquidated,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            LiquidationBucket::Active => "Active deposits",
            LiquidationBucket::CourtesyCall => "Courtesy call",
            LiquidationBucket::FraudLiquidationInProgress => "Fraud liquidation in progress",
            LiquidationBucket::LiquidationInProgress => "Liquidation in progress",
            LiquidationBucket::Liquidated => "Liquidated",
        }
    }

    /// Liquidated deposits have no bond left at risk; their ratio is not reported.
    pub fn reports_ratio(&self) -> bool {
        !matches!(self, LiquidationBucket::Liquidated)
    }
}

impl std::fmt::Display for LiquidationBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.state())
    }
}

/// A deposit in ranked position, with the figures used to rank it.
#[derive(Debug, Clone)]
pub struct RankedDeposit<'a> {
    pub deposit: &'a Deposit,
    pub collateralization: Result<Collateralization, Unavailable>,
    pub tier: RiskTier,
}

impl RankedDeposit<'_> {
    pub fn ratio(&self) -> Option<f64> {
        self.collateralization.as_ref().ok().map(Collateralization::ratio)
    }
}

/// Deposits whose state equals `state` exactly, in input order.
pub fn filter_by_state<'a>(deposits: &'a [Deposit], state: &LifecycleState) -> Vec<&'a Deposit> {
    deposits.iter().filter(|d| &d.current_state == state).collect()
}

/// Filter `deposits` to `bucket` and order them most at-risk first.
///
/// Recomputed from scratch on every call; the same inputs always produce the
/// same order.
pub fn rank_for_liquidation<'a>(
    deposits: &'a [Deposit],
    bucket: LiquidationBucket,
    price: Option<&PriceSample>,
) -> Vec<RankedDeposit<'a>> {
    let mut ranked: Vec<RankedDeposit<'a>> = filter_by_state(deposits, &bucket.state())
        .into_iter()
        .map(|deposit| {
            let collateralization = deposit_collateralization(deposit, price);
            let tier = risk_tier(deposit, collateralization.as_ref().ok());
            RankedDeposit {
                deposit,
                collateralization,
                tier,
            }
        })
        .collect();

    // `sort_by` is stable, so ties and unavailable ratios keep input order.
    ranked.sort_by(|a, b| compare_ratios(a.ratio(), b.ratio()));
    ranked
}

/// Ascending by ratio; unavailable ratios compare equal to each other and
/// after every available ratio, keeping the order total.
fn compare_ratios(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Number of deposits per liquidation bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BucketCount {
    pub bucket: LiquidationBucket,
    pub count: usize,
}

pub fn bucket_counts(deposits: &[Deposit]) -> Vec<BucketCount> {
    LiquidationBucket::ALL
        .iter()
        .map(|&bucket| BucketCount {
            bucket,
            count: filter_by_state(deposits, &bucket.state()).len(),
        })
        .collect()
}
