use std::str::FromStr;

use alloy::primitives::U256;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Unavailable;
use crate::numeric::{self, NumberOrString};

/// Lifecycle state of a deposit, as assigned by the indexer.
///
/// The core never transitions these; it only labels them. Unrecognized state
/// strings are kept verbatim in [`LifecycleState::Unknown`] instead of failing
/// the whole snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LifecycleState {
    AwaitingSignerSetup,
    AwaitingBtcFundingProof,
    FailedSetup,
    Active,
    CourtesyCall,
    AwaitingWithdrawalSignature,
    AwaitingWithdrawalProof,
    Redeemed,
    LiquidationInProgress,
    Liquidated,
    FraudLiquidationInProgress,
    Unknown(String),
}

impl LifecycleState {
    pub fn as_str(&self) -> &str {
        match self {
            LifecycleState::AwaitingSignerSetup => "AWAITING_SIGNER_SETUP",
            LifecycleState::AwaitingBtcFundingProof => "AWAITING_BTC_FUNDING_PROOF",
            LifecycleState::FailedSetup => "FAILED_SETUP",
            LifecycleState::Active => "ACTIVE",
            LifecycleState::CourtesyCall => "COURTESY_CALL",
            LifecycleState::AwaitingWithdrawalSignature => "AWAITING_WITHDRAWAL_SIGNATURE",
            LifecycleState::AwaitingWithdrawalProof => "AWAITING_WITHDRAWAL_PROOF",
            LifecycleState::Redeemed => "REDEEMED",
            LifecycleState::LiquidationInProgress => "LIQUIDATION_IN_PROGRESS",
            LifecycleState::Liquidated => "LIQUIDATED",
            LifecycleState::FraudLiquidationInProgress => "FRAUD_LIQUIDATION_IN_PROGRESS",
            LifecycleState::Unknown(raw) => raw,
        }
    }
}

impl From<&str> for LifecycleState {
    fn from(raw: &str) -> Self {
        match raw {
            "AWAITING_SIGNER_SETUP" => LifecycleState::AwaitingSignerSetup,
            "AWAITING_BTC_FUNDING_PROOF" => LifecycleState::AwaitingBtcFundingProof,
            "FAILED_SETUP" => LifecycleState::FailedSetup,
            "ACTIVE" => LifecycleState::Active,
            "COURTESY_CALL" => LifecycleState::CourtesyCall,
            "AWAITING_WITHDRAWAL_SIGNATURE" => LifecycleState::AwaitingWithdrawalSignature,
            "AWAITING_WITHDRAWAL_PROOF" => LifecycleState::AwaitingWithdrawalProof,
            "REDEEMED" => LifecycleState::Redeemed,
            "LIQUIDATION_IN_PROGRESS" => LifecycleState::LiquidationInProgress,
            "LIQUIDATED" => LifecycleState::Liquidated,
            "FRAUD_LIQUIDATION_IN_PROGRESS" => LifecycleState::FraudLiquidationInProgress,
            other => LifecycleState::Unknown(other.to_string()),
        }
    }
}

impl FromStr for LifecycleState {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(LifecycleState::from(s))
    }
}

impl From<String> for LifecycleState {
    fn from(raw: String) -> Self {
        LifecycleState::from(raw.as_str())
    }
}

impl From<LifecycleState> for String {
    fn from(state: LifecycleState) -> Self {
        state.as_str().to_string()
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why deposit setup failed. Only meaningful in `FAILED_SETUP`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SetupFailureReason {
    FundingTimeout,
    SignerSetupFailedDepositor,
    SignerSetupFailed,
    Other(String),
}

impl SetupFailureReason {
    pub fn as_str(&self) -> &str {
        match self {
            SetupFailureReason::FundingTimeout => "FUNDING_TIMEOUT",
            SetupFailureReason::SignerSetupFailedDepositor => "SIGNER_SETUP_FAILED_DEPOSITOR",
            SetupFailureReason::SignerSetupFailed => "SIGNER_SETUP_FAILED",
            SetupFailureReason::Other(raw) => raw,
        }
    }
}

impl From<String> for SetupFailureReason {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "FUNDING_TIMEOUT" => SetupFailureReason::FundingTimeout,
            "SIGNER_SETUP_FAILED_DEPOSITOR" => SetupFailureReason::SignerSetupFailedDepositor,
            "SIGNER_SETUP_FAILED" => SetupFailureReason::SignerSetupFailed,
            _ => SetupFailureReason::Other(raw),
        }
    }
}

impl From<SetupFailureReason> for String {
    fn from(reason: SetupFailureReason) -> Self {
        reason.as_str().to_string()
    }
}

impl std::fmt::Display for SetupFailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An unsigned numeric field (satoshis, wei, a price or a percentage) exactly
/// as the subgraph sent it.
///
/// Parsing is deferred to the calculators so a single malformed field turns
/// into [`Unavailable::MalformedNumeric`] for that deposit instead of
/// rejecting the whole snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAmount(String);

impl RawAmount {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn parse(&self) -> Result<U256, Unavailable> {
        numeric::parse_integer(&self.0)
    }

    /// Parse a decimal value into a fixed-point integer with `decimals` digits.
    pub fn parse_fixed(&self, decimals: u32) -> Result<U256, Unavailable> {
        numeric::parse_fixed(&self.0, decimals)
    }

    /// Parse a small integer such as a threshold percentage.
    pub fn parse_u32(&self) -> Result<u32, Unavailable> {
        self.0
            .trim()
            .parse()
            .map_err(|_| Unavailable::MalformedNumeric(self.0.clone()))
    }
}

impl From<u64> for RawAmount {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

impl From<U256> for RawAmount {
    fn from(value: U256) -> Self {
        Self(value.to_string())
    }
}

impl Serialize for RawAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for RawAmount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match NumberOrString::deserialize(deserializer)? {
            NumberOrString::Int(i) => Self(i.to_string()),
            // Floats are never valid base-unit amounts; keep them so parsing reports them.
            NumberOrString::Float(f) => Self(f.to_string()),
            NumberOrString::Text(s) => Self(s),
        })
    }
}

/// A custodian group member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub address: String,
}

/// Collateral pledged by the custodian group backing a deposit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BondRecord {
    #[serde(default)]
    pub id: String,
    /// Total bond in wei.
    pub total_bond_amount: RawAmount,
    #[serde(default)]
    pub members: Vec<Member>,
    /// Custody public key, present once signer setup has produced one.
    #[serde(default)]
    pub public_key: Option<String>,
    #[serde(
        default,
        deserialize_with = "numeric::deserialize_opt_timestamp",
        serialize_with = "numeric::serialize_opt_timestamp"
    )]
    pub created_at: Option<DateTime<Utc>>,
}

impl BondRecord {
    pub fn has_public_key(&self) -> bool {
        self.public_key
            .as_deref()
            .is_some_and(|k| !k.is_empty() && k != "0x")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositSetup {
    #[serde(default)]
    pub failure_reason: Option<SetupFailureReason>,
}

/// The deposit's ownership token (TDT).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TdtToken {
    pub owner: String,
    #[serde(default)]
    pub minter: Option<String>,
}

/// Read-only deposit snapshot. Replaced wholesale on every re-fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deposit {
    pub id: String,
    #[serde(default)]
    pub contract_address: Option<String>,
    pub lot_size_satoshis: RawAmount,
    pub current_state: LifecycleState,
    /// Absent means the current phase never expires.
    #[serde(
        default,
        deserialize_with = "numeric::deserialize_opt_timestamp",
        serialize_with = "numeric::serialize_opt_timestamp"
    )]
    pub current_state_times_out_at: Option<DateTime<Utc>>,
    #[serde(
        deserialize_with = "numeric::deserialize_timestamp",
        serialize_with = "numeric::serialize_timestamp"
    )]
    pub updated_at: DateTime<Utc>,
    #[serde(
        default,
        deserialize_with = "numeric::deserialize_opt_timestamp",
        serialize_with = "numeric::serialize_opt_timestamp"
    )]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(
        default,
        deserialize_with = "numeric::deserialize_opt_timestamp",
        serialize_with = "numeric::serialize_opt_timestamp"
    )]
    pub end_of_term: Option<DateTime<Utc>>,
    /// Percentages scaled by 100 (150 = 150%).
    pub initial_collateralized_percent: RawAmount,
    pub undercollateralized_threshold_percent: RawAmount,
    pub severely_undercollateralized_threshold_percent: RawAmount,
    #[serde(default)]
    pub deposit_setup: Option<DepositSetup>,
    #[serde(rename = "bondedECDSAKeep")]
    pub bond: BondRecord,
    #[serde(default)]
    pub tdt_token: Option<TdtToken>,
}

impl Deposit {
    /// Setup failure reason, treating an empty string as absent.
    pub fn setup_failure_reason(&self) -> Option<&SetupFailureReason> {
        self.deposit_setup
            .as_ref()
            .and_then(|s| s.failure_reason.as_ref())
            .filter(|r| !r.as_str().is_empty())
    }

    /// Courtesy call threshold in percent.
    pub fn undercollateralized_threshold(&self) -> Result<u32, Unavailable> {
        self.undercollateralized_threshold_percent.parse_u32()
    }

    /// Liquidation threshold in percent.
    pub fn severely_undercollateralized_threshold(&self) -> Result<u32, Unavailable> {
        self.severely_undercollateralized_threshold_percent.parse_u32()
    }

    pub fn initial_collateralization(&self) -> Result<u32, Unavailable> {
        self.initial_collateralized_percent.parse_u32()
    }
}

/// A price feed sample: how many wei one satoshi is worth.
///
/// The value is kept as the feed sent it and parsed on use, so a malformed
/// sample makes every ratio unavailable instead of rejecting the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceSample {
    /// Decimal wei per satoshi, e.g. `"30000000000"` or `"1071428571428.571428"`.
    #[serde(rename = "weiPerSat")]
    wei_per_satoshi: RawAmount,
    #[serde(
        deserialize_with = "numeric::deserialize_timestamp",
        serialize_with = "numeric::serialize_timestamp"
    )]
    pub timestamp: DateTime<Utc>,
}

impl PriceSample {
    /// Fractional digits carried by [`PriceSample::wei_per_satoshi_fixed`].
    pub const DECIMALS: u32 = 18;

    /// Build a sample from a decimal wei-per-satoshi string, rejecting malformed input.
    pub fn from_decimal(wei_per_satoshi: &str, timestamp: DateTime<Utc>) -> Result<Self, Unavailable> {
        let sample = Self::from_raw(wei_per_satoshi, timestamp);
        sample.wei_per_satoshi_fixed()?;
        Ok(sample)
    }

    /// Build a sample without validating it; errors surface when it is used.
    pub fn from_raw(wei_per_satoshi: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            wei_per_satoshi: RawAmount::new(wei_per_satoshi),
            timestamp,
        }
    }

    /// Build a sample from an already scaled 18-decimal fixed-point value.
    pub fn from_fixed(wei_per_satoshi: U256, timestamp: DateTime<Utc>) -> Self {
        let text = numeric::fixed_to_decimal_string(numeric::widen(wei_per_satoshi), Self::DECIMALS);
        Self::from_raw(text, timestamp)
    }

    /// The sample exactly as received.
    pub fn raw(&self) -> &str {
        self.wei_per_satoshi.as_str()
    }

    /// Wei per satoshi as an 18-decimal fixed-point integer.
    pub fn wei_per_satoshi_fixed(&self) -> Result<U256, Unavailable> {
        self.wei_per_satoshi.parse_fixed(Self::DECIMALS)
    }

    /// Wei per satoshi as a float, for display.
    pub fn wei_per_satoshi(&self) -> Result<f64, Unavailable> {
        let fixed = self.wei_per_satoshi_fixed()?;
        Ok(numeric::fixed_to_f64(numeric::widen(fixed), Self::DECIMALS))
    }

    /// ETH per BTC. One BTC is 10^8 satoshis and one ETH is 10^18 wei.
    pub fn eth_per_btc(&self) -> Result<f64, Unavailable> {
        Ok(self.wei_per_satoshi()? / 1e10)
    }

    /// BTC per ETH. Unavailable for a malformed or zero sample.
    pub fn btc_per_eth(&self) -> Result<f64, Unavailable> {
        let eth_per_btc = self.eth_per_btc()?;
        if eth_per_btc > 0.0 {
            Ok(1.0 / eth_per_btc)
        } else {
            Err(Unavailable::ZeroPrice)
        }
    }
}
