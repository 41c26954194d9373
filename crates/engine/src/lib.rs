pub mod classifier;
pub mod cr_calculator;
pub mod phase_timer;
pub mod ranking;
pub mod redemption;
pub mod units;
