//! Liquidation scanner report.
//!
//! For every lifecycle bucket the report holds the total count and the most
//! at-risk deposits, ranked by ascending collateralization. Each row carries
//! what an operator needs to act on it: tier, label, threshold prices, phase
//! progress and whether anyone may redeem.

use chrono::{DateTime, Utc};
use serde::Serialize;

use tbtc_common::error::Unavailable;
use tbtc_common::types::PriceSample;
use tbtc_engine::classifier::{RiskTier, StateLabel, state_label};
use tbtc_engine::cr_calculator::{ThresholdPrices, threshold_prices};
use tbtc_engine::phase_timer::{PhaseProgress, is_notifiable, phase_timing};
use tbtc_engine::ranking::{LiquidationBucket, RankedDeposit, rank_for_liquidation};
use tbtc_engine::redemption::{RedemptionEligibility, redemption_eligibility};
use tbtc_engine::units;

use crate::snapshot::Snapshot;

#[derive(Debug, Clone, Default)]
pub struct ReportOptions {
    /// Rows kept per bucket.
    pub top_n: usize,
    pub vending_machine_address: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DepositRow {
    pub id: String,
    pub label: StateLabel,
    pub tier: RiskTier,
    /// `None` when unavailable or not reported for the bucket.
    pub ratio_percent: Option<f64>,
    /// Why the ratio is missing, if it is.
    pub unavailable_reason: Option<String>,
    pub lot_size_btc: Option<f64>,
    pub bond_eth: Option<f64>,
    pub threshold_prices: Option<ThresholdPrices>,
    pub redemption: RedemptionEligibility,
    pub phase: Option<PhaseProgress>,
    pub notifiable: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct BucketReport {
    pub bucket: LiquidationBucket,
    pub title: &'static str,
    pub count: usize,
    pub deposits: Vec<DepositRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub generated_at: DateTime<Utc>,
    pub btc_per_eth: Option<f64>,
    pub eth_per_btc: Option<f64>,
    /// Why the price views are missing: no sample yet, or a malformed or zero sample.
    pub price_unavailable_reason: Option<String>,
    pub buckets: Vec<BucketReport>,
}

impl ScanReport {
    pub fn bucket(&self, bucket: LiquidationBucket) -> Option<&BucketReport> {
        self.buckets.iter().find(|b| b.bucket == bucket)
    }
}

/// Rank every bucket of the snapshot at `now`.
pub fn build_report(snapshot: &Snapshot, options: &ReportOptions, now: DateTime<Utc>) -> ScanReport {
    let price = snapshot.price.as_ref();

    let buckets = LiquidationBucket::ALL
        .iter()
        .map(|&bucket| {
            let ranked = rank_for_liquidation(&snapshot.deposits, bucket, price);
            BucketReport {
                bucket,
                title: bucket.title(),
                count: ranked.len(),
                deposits: ranked
                    .iter()
                    .take(options.top_n)
                    .map(|r| deposit_row(r, bucket, options, now))
                    .collect(),
            }
        })
        .collect();

    let btc_per_eth = price.ok_or(Unavailable::MissingPrice).and_then(PriceSample::btc_per_eth);

    ScanReport {
        generated_at: now,
        btc_per_eth: btc_per_eth.as_ref().ok().copied(),
        eth_per_btc: price.and_then(|p| p.eth_per_btc().ok()),
        price_unavailable_reason: btc_per_eth.err().map(|reason| reason.to_string()),
        buckets,
    }
}

fn deposit_row(
    ranked: &RankedDeposit<'_>,
    bucket: LiquidationBucket,
    options: &ReportOptions,
    now: DateTime<Utc>,
) -> DepositRow {
    let deposit = ranked.deposit;

    let (ratio_percent, unavailable_reason) = match (&ranked.collateralization, bucket.reports_ratio()) {
        (_, false) => (None, None),
        (Ok(c), true) => (Some(c.ratio_percent()), None),
        (Err(reason), true) => (None, Some(reason.to_string())),
    };

    let phase = match phase_timing(deposit, now) {
        Ok(progress) => Some(progress),
        Err(e) => {
            tracing::warn!(deposit_id = %deposit.id, error = %e, "Skipping phase progress");
            None
        }
    };

    DepositRow {
        id: deposit.id.clone(),
        label: state_label(deposit),
        tier: ranked.tier,
        ratio_percent,
        unavailable_reason,
        lot_size_btc: units::raw_satoshis_to_btc(&deposit.lot_size_satoshis).ok(),
        bond_eth: units::wei_to_eth(deposit.bond.total_bond_amount.as_str()).ok(),
        threshold_prices: threshold_prices(deposit).ok(),
        redemption: redemption_eligibility(deposit, now, options.vending_machine_address.as_deref()),
        phase,
        notifiable: is_notifiable(deposit, now),
    }
}

/// Emit the report as structured log events.
pub fn log_report(report: &ScanReport) {
    tracing::info!(
        btc_per_eth = ?report.btc_per_eth,
        eth_per_btc = ?report.eth_per_btc,
        "Liquidation scan complete"
    );
    if let Some(reason) = &report.price_unavailable_reason {
        tracing::warn!(%reason, "Price unavailable, collateralization not computed");
    }

    for bucket in &report.buckets {
        tracing::info!(bucket = %bucket.bucket, count = bucket.count, "{}", bucket.title);

        for (rank, row) in bucket.deposits.iter().enumerate() {
            tracing::info!(
                bucket = %bucket.bucket,
                rank = rank + 1,
                deposit_id = %row.id,
                state = row.label.key(),
                tier = %row.tier,
                ratio_percent = ?row.ratio_percent,
                lot_size_btc = ?row.lot_size_btc,
                bond_eth = ?row.bond_eth,
                liquidation_btc_per_eth = ?row.threshold_prices.map(|p| p.liquidation),
                redeemable_by_anyone = row.redemption.redeemable_by_anyone(),
                notifiable = row.notifiable,
                "Ranked deposit"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tbtc_common::types::Deposit;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_600_000_000 + secs, 0).unwrap()
    }

    fn make_deposit(id: &str, state: &str, bond_eth: u64) -> Deposit {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "lotSizeSatoshis": "100000000",
            "currentState": state,
            "updatedAt": t(0).timestamp(),
            "initialCollateralizedPercent": 150,
            "undercollateralizedThresholdPercent": 135,
            "severelyUndercollateralizedThresholdPercent": 110,
            "bondedECDSAKeep": { "totalBondAmount": format!("{}000000000000000000", bond_eth) }
        }))
        .unwrap()
    }

    fn make_snapshot(with_price: bool) -> Snapshot {
        Snapshot {
            deposits: vec![
                make_deposit("a-150", "ACTIVE", 150),
                make_deposit("a-120", "ACTIVE", 120),
                make_deposit("a-105", "ACTIVE", 105),
                make_deposit("c-130", "COURTESY_CALL", 130),
                make_deposit("l-90", "LIQUIDATED", 90),
            ],
            // 1 BTC = 100 ETH.
            price: with_price.then(|| PriceSample::from_decimal("1000000000000", t(0)).unwrap()),
        }
    }

    fn options(top_n: usize) -> ReportOptions {
        ReportOptions {
            top_n,
            vending_machine_address: None,
        }
    }

    #[test]
    fn test_buckets_ranked_and_truncated() {
        let report = build_report(&make_snapshot(true), &options(2), t(10));

        assert_eq!(report.buckets.len(), 5);
        let active = report.bucket(LiquidationBucket::Active).unwrap();
        assert_eq!(active.count, 3);
        let ids: Vec<&str> = active.deposits.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["a-105", "a-120"]);
        assert_eq!(active.deposits[0].tier, RiskTier::Severe);
        assert_eq!(active.deposits[1].tier, RiskTier::Courtesy);
        assert!((active.deposits[0].ratio_percent.unwrap() - 105.0).abs() < 1e-9);
        assert_eq!(active.deposits[0].bond_eth, Some(105.0));
        assert_eq!(active.deposits[0].lot_size_btc, Some(1.0));
        assert_eq!(report.eth_per_btc, Some(100.0));
    }

    #[test]
    fn test_liquidated_bucket_has_no_ratio() {
        let report = build_report(&make_snapshot(true), &options(10), t(10));
        let liquidated = report.bucket(LiquidationBucket::Liquidated).unwrap();
        assert_eq!(liquidated.count, 1);
        assert_eq!(liquidated.deposits[0].ratio_percent, None);
        assert_eq!(liquidated.deposits[0].unavailable_reason, None);
    }

    #[test]
    fn test_courtesy_call_row_is_open_to_anyone() {
        let report = build_report(&make_snapshot(true), &options(10), t(10));
        let courtesy = report.bucket(LiquidationBucket::CourtesyCall).unwrap();
        assert!(courtesy.deposits[0].redemption.redeemable_by_anyone());
        assert_eq!(courtesy.deposits[0].label.key(), "utils.state_label.courtesy_call");
    }

    #[test]
    fn test_without_price_reports_unavailable() {
        let report = build_report(&make_snapshot(false), &options(10), t(10));
        assert_eq!(report.btc_per_eth, None);
        assert_eq!(report.price_unavailable_reason.as_deref(), Some("no price sample available"));

        let active = report.bucket(LiquidationBucket::Active).unwrap();
        let ids: Vec<&str> = active.deposits.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["a-150", "a-120", "a-105"]);
        for row in &active.deposits {
            assert_eq!(row.tier, RiskTier::Unknown);
            assert_eq!(row.ratio_percent, None);
            assert_eq!(row.unavailable_reason.as_deref(), Some("no price sample available"));
            // Threshold prices do not depend on the price sample.
            assert!(row.threshold_prices.is_some());
        }
    }

    #[test]
    fn test_malformed_price_still_ranks_every_deposit() {
        let mut snapshot = make_snapshot(false);
        snapshot.price = Some(PriceSample::from_raw("3.0e10", t(0)));
        let report = build_report(&snapshot, &options(10), t(10));

        assert_eq!(report.btc_per_eth, None);
        assert_eq!(
            report.price_unavailable_reason.as_deref(),
            Some("malformed numeric value: 3.0e10")
        );
        let active = report.bucket(LiquidationBucket::Active).unwrap();
        assert_eq!(active.count, 3);
        for row in &active.deposits {
            assert_eq!(row.tier, RiskTier::Unknown);
            assert_eq!(row.unavailable_reason.as_deref(), Some("malformed numeric value: 3.0e10"));
        }
    }

    #[test]
    fn test_report_serializes() {
        let report = build_report(&make_snapshot(true), &options(1), t(10));
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["buckets"][0]["bucket"], "ACTIVE");
        assert_eq!(json["buckets"][0]["deposits"][0]["tier"], "severe");
        assert_eq!(json["buckets"][0]["deposits"][0]["phase"]["kind"], "no_expiry");
    }
}
