use crate::error::AppError;

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Refresh interval for phase timers in milliseconds (default: 800)
    pub phase_tick_interval_ms: u64,

    /// Vending machine contract address. Deposits whose TDT is owned by it
    /// can be redeemed by anyone.
    pub vending_machine_address: Option<String>,

    /// Path of the deposit + price snapshot consumed by the scanner
    pub snapshot_path: String,

    /// How often the scanner re-reads the snapshot, in milliseconds (default: 5000)
    pub scanner_poll_interval_ms: u64,

    /// Number of ranked deposits the scanner reports per bucket (default: 10)
    pub scanner_top_n: usize,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let config = Self {
            phase_tick_interval_ms: parse_var("PHASE_TICK_INTERVAL_MS", "800")?,
            vending_machine_address: std::env::var("VENDING_MACHINE_ADDRESS")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            snapshot_path: std::env::var("SNAPSHOT_PATH")
                .unwrap_or_else(|_| "snapshot.json".to_string()),
            scanner_poll_interval_ms: parse_var("SCANNER_POLL_INTERVAL_MS", "5000")?,
            scanner_top_n: parse_var("SCANNER_TOP_N", "10")?,
        };
        config.validate()?;

        tracing::debug!(
            phase_tick_interval_ms = config.phase_tick_interval_ms,
            snapshot_path = %config.snapshot_path,
            scanner_poll_interval_ms = config.scanner_poll_interval_ms,
            scanner_top_n = config.scanner_top_n,
            vending_machine_configured = config.vending_machine_address.is_some(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Intervals must be non-zero.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.phase_tick_interval_ms == 0 {
            return Err(AppError::Config("PHASE_TICK_INTERVAL_MS must be greater than zero".to_string()));
        }
        if self.scanner_poll_interval_ms == 0 {
            return Err(AppError::Config("SCANNER_POLL_INTERVAL_MS must be greater than zero".to_string()));
        }
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            phase_tick_interval_ms: 800,
            vending_machine_address: None,
            snapshot_path: "snapshot.json".to_string(),
            scanner_poll_interval_ms: 5000,
            scanner_top_n: 10,
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: &str) -> Result<T, AppError> {
    parse_value(name, std::env::var(name).ok().as_deref(), default)
}

/// Parse an already read variable, falling back to `default` when it is unset.
fn parse_value<T: std::str::FromStr>(name: &str, raw: Option<&str>, default: &str) -> Result<T, AppError> {
    raw.unwrap_or(default).trim().parse().map_err(|_| {
        AppError::Config(format!(
            "{} must be a valid {}",
            name,
            std::any::type_name::<T>()
        ))
    })
}
