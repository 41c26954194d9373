use thiserror::Error;

/// Reason a price- or amount-dependent figure could not be computed.
///
/// This is the "unavailable" sentinel handed to the presentation layer. It is
/// never fatal: callers render a placeholder instead of a number.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Unavailable {
    #[error("no price sample available")]
    MissingPrice,

    #[error("malformed numeric value: {0}")]
    MalformedNumeric(String),

    #[error("lot value is zero")]
    ZeroLotValue,

    #[error("bond amount is zero")]
    ZeroBond,

    #[error("price sample is zero")]
    ZeroPrice,
}

/// Errors surfaced by the phase timer.
///
/// Unlike [`Unavailable`], these point at broken upstream data or a caller bug
/// and are reported rather than absorbed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PhaseTimerError {
    #[error("invalid phase duration: {0}")]
    InvalidDuration(String),
}

/// Application-level errors for binaries (configuration, snapshot loading).
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Snapshot error: {0}")]
    Snapshot(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
