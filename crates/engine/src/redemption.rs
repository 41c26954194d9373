//! Redemption eligibility.
//!
//! Only `ACTIVE` and `COURTESY_CALL` deposits can be redeemed. Normally only
//! the TDT holder may redeem; the deposit opens up to anyone once it is in
//! courtesy call, has reached its term, or its TDT sits in the vending machine.

use chrono::{DateTime, Utc};
use serde::Serialize;

use tbtc_common::types::{Deposit, LifecycleState};

/// Why anyone (not just the TDT holder) may redeem a deposit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OpenRedemptionReason {
    CourtesyCall,
    AtTerm,
    VendingMachineOwned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RedemptionEligibility {
    pub can_be_redeemed: bool,
    /// `Some` when anyone may redeem.
    pub open_to_anyone: Option<OpenRedemptionReason>,
}

impl RedemptionEligibility {
    pub fn redeemable_by_anyone(&self) -> bool {
        self.open_to_anyone.is_some()
    }
}

/// Evaluate redemption eligibility at `now`.
///
/// `vending_machine` is the vending machine contract address, if known;
/// addresses are compared case-insensitively.
pub fn redemption_eligibility(
    deposit: &Deposit,
    now: DateTime<Utc>,
    vending_machine: Option<&str>,
) -> RedemptionEligibility {
    let can_be_redeemed = matches!(
        deposit.current_state,
        LifecycleState::Active | LifecycleState::CourtesyCall
    );
    if !can_be_redeemed {
        return RedemptionEligibility {
            can_be_redeemed,
            open_to_anyone: None,
        };
    }

    let open_to_anyone = if deposit.current_state == LifecycleState::CourtesyCall {
        Some(OpenRedemptionReason::CourtesyCall)
    } else if deposit.end_of_term.is_some_and(|term| term <= now) {
        Some(OpenRedemptionReason::AtTerm)
    } else if is_vending_machine_owned(deposit, vending_machine) {
        Some(OpenRedemptionReason::VendingMachineOwned)
    } else {
        None
    };

    RedemptionEligibility {
        can_be_redeemed,
        open_to_anyone,
    }
}

/// Whether the deposit's TDT is held by the vending machine, i.e. TBTC was minted against it.
pub fn is_vending_machine_owned(deposit: &Deposit, vending_machine: Option<&str>) -> bool {
    match (deposit.tdt_token.as_ref(), vending_machine) {
        (Some(token), Some(vm)) => token.owner.eq_ignore_ascii_case(vm.trim()),
        _ => false,
    }
}
