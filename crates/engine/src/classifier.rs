//! Deposit state classifier: risk tier, state label and badge tone.
//!
//! Classification approach:
//! 1. Pick a label from the lifecycle state, refined by the custody public key
//!    (signer setup) or the setup failure reason (failed setup)
//! 2. Derive the risk tier from the collateralization, if one is computable
//! 3. Attach the badge tone and tooltip used when rendering the state
//!
//! Unknown states and failure reasons never fail classification; they fall
//! back to a passthrough or generic label.

use serde::Serialize;

use tbtc_common::types::{Deposit, LifecycleState, SetupFailureReason};

use crate::cr_calculator::Collateralization;

/// Collateral risk tier of a deposit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    /// No price or no computable ratio. Never rendered as normal.
    Unknown,
    Normal,
    Courtesy,
    Severe,
}

impl std::fmt::Display for RiskTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskTier::Unknown => write!(f, "unknown"),
            RiskTier::Normal => write!(f, "normal"),
            RiskTier::Courtesy => write!(f, "courtesy"),
            RiskTier::Severe => write!(f, "severe"),
        }
    }
}

/// Canonical state label. Resolves to a translation key via [`StateLabel::key`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StateLabel {
    AwaitingSignerSetup,
    /// Signer setup is done in all but name: the custody key already exists.
    AwaitingFunding,
    AwaitingFundingProof,
    FundingTimeout,
    SignerSetupFailed,
    SetupFailed,
    Active,
    CourtesyCall,
    AwaitingWithdrawalSignature,
    AwaitingWithdrawalProof,
    Redeemed,
    LiquidationInProgress,
    FraudLiquidationInProgress,
    Liquidated,
    /// Unknown state, shown as the raw state string.
    Raw(String),
}

impl StateLabel {
    /// Translation key for this label, or the raw state for unknown states.
    pub fn key(&self) -> &str {
        match self {
            StateLabel::AwaitingSignerSetup => "utils.state_label.awaiting_signer_setup",
            StateLabel::AwaitingFunding => "utils.state_label.awaiting_funding",
            StateLabel::AwaitingFundingProof => "utils.state_label.awaiting_funding_proof",
            StateLabel::FundingTimeout => "utils.state_label.funding_timeout",
            StateLabel::SignerSetupFailed => "utils.state_label.signer_setup_failed",
            StateLabel::SetupFailed => "utils.state_label.setup_failed",
            StateLabel::Active => "utils.state_label.active",
            StateLabel::CourtesyCall => "utils.state_label.courtesy_call",
            StateLabel::AwaitingWithdrawalSignature => "utils.state_label.awaiting_withdrawal_signature",
            StateLabel::AwaitingWithdrawalProof => "utils.state_label.awaiting_withdrawal_proof",
            StateLabel::Redeemed => "utils.state_label.redeemed",
            StateLabel::LiquidationInProgress => "utils.state_label.liquidation_in_progress",
            StateLabel::FraudLiquidationInProgress => "utils.state_label.fraud_liquidation_in_progress",
            StateLabel::Liquidated => "utils.state_label.liquidated",
            StateLabel::Raw(raw) => raw,
        }
    }
}

impl Serialize for StateLabel {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.key())
    }
}

/// Badge category for a lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StateTone {
    InProgress,
    Active,
    Redeemed,
    /// Liquidated: filled failure badge.
    Failed,
    /// Failed setup: outlined failure badge.
    SetupFailed,
    Neutral,
}

/// Everything the presentation layer needs to render a deposit's state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepositClassification {
    pub tier: RiskTier,
    pub label: StateLabel,
    pub tone: StateTone,
    pub tooltip_key: &'static str,
}

/// Classify a deposit. `collateralization` is `None` when no ratio is computable.
pub fn classify_deposit(deposit: &Deposit, collateralization: Option<&Collateralization>) -> DepositClassification {
    DepositClassification {
        tier: risk_tier(deposit, collateralization),
        label: state_label(deposit),
        tone: state_tone(&deposit.current_state),
        tooltip_key: tooltip_key(&deposit.current_state),
    }
}

/// Risk tier from the deposit's thresholds. Comparisons are strict: a ratio
/// exactly on a threshold falls on the less severe side. A malformed
/// threshold leaves the tier unknown.
pub fn risk_tier(deposit: &Deposit, collateralization: Option<&Collateralization>) -> RiskTier {
    let Some(c) = collateralization else {
        return RiskTier::Unknown;
    };
    let thresholds = (
        deposit.severely_undercollateralized_threshold(),
        deposit.undercollateralized_threshold(),
    );
    let (severe, courtesy) = match thresholds {
        (Ok(severe), Ok(courtesy)) => (severe, courtesy),
        (Err(reason), _) | (_, Err(reason)) => {
            tracing::debug!(deposit_id = %deposit.id, %reason, "Threshold unavailable, tier unknown");
            return RiskTier::Unknown;
        }
    };

    if c.is_below_percent(severe) {
        RiskTier::Severe
    } else if c.is_below_percent(courtesy) {
        RiskTier::Courtesy
    } else {
        RiskTier::Normal
    }
}

/// Canonical label for the deposit's current state.
pub fn state_label(deposit: &Deposit) -> StateLabel {
    match &deposit.current_state {
        LifecycleState::AwaitingSignerSetup if deposit.bond.has_public_key() => StateLabel::AwaitingFunding,
        LifecycleState::FailedSetup => match deposit.setup_failure_reason() {
            Some(reason) => failure_label(reason),
            None => StateLabel::SetupFailed,
        },
        state => label_for_state(state),
    }
}

fn failure_label(reason: &SetupFailureReason) -> StateLabel {
    match reason {
        SetupFailureReason::FundingTimeout | SetupFailureReason::SignerSetupFailedDepositor => {
            StateLabel::FundingTimeout
        }
        SetupFailureReason::SignerSetupFailed => StateLabel::SignerSetupFailed,
        SetupFailureReason::Other(raw) => {
            tracing::debug!(reason = %raw, "Unknown setup failure reason, using generic label");
            StateLabel::SetupFailed
        }
    }
}

/// Plain state → label mapping, ignoring public key and failure reason.
pub fn label_for_state(state: &LifecycleState) -> StateLabel {
    match state {
        LifecycleState::AwaitingSignerSetup => StateLabel::AwaitingSignerSetup,
        LifecycleState::AwaitingBtcFundingProof => StateLabel::AwaitingFundingProof,
        LifecycleState::FailedSetup => StateLabel::SetupFailed,
        LifecycleState::Active => StateLabel::Active,
        LifecycleState::CourtesyCall => StateLabel::CourtesyCall,
        LifecycleState::AwaitingWithdrawalSignature => StateLabel::AwaitingWithdrawalSignature,
        LifecycleState::AwaitingWithdrawalProof => StateLabel::AwaitingWithdrawalProof,
        LifecycleState::Redeemed => StateLabel::Redeemed,
        LifecycleState::LiquidationInProgress => StateLabel::LiquidationInProgress,
        LifecycleState::FraudLiquidationInProgress => StateLabel::FraudLiquidationInProgress,
        LifecycleState::Liquidated => StateLabel::Liquidated,
        LifecycleState::Unknown(raw) => {
            tracing::debug!(state = %raw, "Unknown lifecycle state, passing through");
            StateLabel::Raw(raw.clone())
        }
    }
}

pub fn state_tone(state: &LifecycleState) -> StateTone {
    match state {
        LifecycleState::AwaitingSignerSetup
        | LifecycleState::AwaitingBtcFundingProof
        | LifecycleState::AwaitingWithdrawalSignature
        | LifecycleState::AwaitingWithdrawalProof
        | LifecycleState::CourtesyCall
        | LifecycleState::LiquidationInProgress
        | LifecycleState::FraudLiquidationInProgress => StateTone::InProgress,
        LifecycleState::Active => StateTone::Active,
        LifecycleState::Redeemed => StateTone::Redeemed,
        LifecycleState::Liquidated => StateTone::Failed,
        LifecycleState::FailedSetup => StateTone::SetupFailed,
        LifecycleState::Unknown(_) => StateTone::Neutral,
    }
}

pub fn tooltip_key(state: &LifecycleState) -> &'static str {
    match state {
        LifecycleState::Redeemed => "utils.state_tooltip.redeemed",
        LifecycleState::LiquidationInProgress => "utils.state_tooltip.liquidation_in_progress",
        _ => "utils.state_tooltip.default",
    }
}
