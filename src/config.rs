use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub balance: BalanceConfig,
    #[serde(default)]
    pub kill_switch: KillSwitchConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
    #[serde(default)]
    pub paper: PaperConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionConfig {
    /// Deadline for every remote call in seconds
    #[serde(default = "default_api_timeout_secs")]
    pub api_timeout_secs: u64,
    /// Total attempts for a retryable remote call (first try included)
    #[serde(default = "default_max_retry_attempts")]
    pub max_retry_attempts: u32,
    /// Lower bound of the backoff between attempts in milliseconds
    #[serde(default = "default_retry_min_wait_ms")]
    pub retry_min_wait_ms: u64,
    /// Upper bound of the backoff between attempts in milliseconds
    #[serde(default = "default_retry_max_wait_ms")]
    pub retry_max_wait_ms: u64,
    /// Jitter as a fraction of the computed backoff (0.0 to 1.0)
    #[serde(default = "default_retry_jitter")]
    pub retry_jitter: f64,
    /// Minimum spacing between any two remote calls in milliseconds
    #[serde(default = "default_min_call_spacing_ms")]
    pub min_call_spacing_ms: u64,
    /// Relative fill-price deviation that triggers a slippage warning (0.01 = 1%)
    #[serde(default = "default_slippage_warn_threshold")]
    pub slippage_warn_threshold: Decimal,
    /// How long to poll a resting order for a fill before returning it as open
    #[serde(default = "default_fill_confirm_timeout_ms")]
    pub fill_confirm_timeout_ms: u64,
    /// Polling interval for order status in milliseconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Restrict limit prices to (0, 1] as on binary prediction markets
    #[serde(default = "default_true")]
    pub binary_price_bounds: bool,
}

fn default_api_timeout_secs() -> u64 {
    5
}

fn default_max_retry_attempts() -> u32 {
    3
}

fn default_retry_min_wait_ms() -> u64 {
    500
}

fn default_retry_max_wait_ms() -> u64 {
    2000
}

fn default_retry_jitter() -> f64 {
    0.25
}

fn default_min_call_spacing_ms() -> u64 {
    100
}

fn default_slippage_warn_threshold() -> Decimal {
    dec!(0.01)
}

fn default_fill_confirm_timeout_ms() -> u64 {
    3000
}

fn default_poll_interval() -> u64 {
    500
}

fn default_true() -> bool {
    true
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            api_timeout_secs: default_api_timeout_secs(),
            max_retry_attempts: default_max_retry_attempts(),
            retry_min_wait_ms: default_retry_min_wait_ms(),
            retry_max_wait_ms: default_retry_max_wait_ms(),
            retry_jitter: default_retry_jitter(),
            min_call_spacing_ms: default_min_call_spacing_ms(),
            slippage_warn_threshold: default_slippage_warn_threshold(),
            fill_confirm_timeout_ms: default_fill_confirm_timeout_ms(),
            poll_interval_ms: default_poll_interval(),
            binary_price_bounds: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RiskConfig {
    /// Daily loss limit in USD (absolute value)
    #[serde(default = "default_max_daily_loss")]
    pub max_daily_loss: Decimal,
    /// Number of consecutive losses before the breaker trips
    #[serde(default = "default_max_consecutive_losses")]
    pub max_consecutive_losses: u32,
    /// Bankroll floor; breaching it trips the breaker until an operator reset
    #[serde(default = "default_min_bankroll")]
    pub min_bankroll: Decimal,
    /// Trade windows to sit out after a loss
    #[serde(default = "default_cooldown_windows")]
    pub cooldown_windows: u32,
    /// Length of one trade window in seconds (15-minute markets by default)
    #[serde(default = "default_window_duration_secs")]
    pub window_duration_secs: u64,
    /// Maximum new trades per calendar day
    #[serde(default = "default_max_daily_trades")]
    pub max_daily_trades: u32,
}

fn default_max_daily_loss() -> Decimal {
    dec!(30)
}

fn default_max_consecutive_losses() -> u32 {
    5
}

fn default_min_bankroll() -> Decimal {
    dec!(50)
}

fn default_cooldown_windows() -> u32 {
    1
}

fn default_window_duration_secs() -> u64 {
    900
}

fn default_max_daily_trades() -> u32 {
    48
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_daily_loss: default_max_daily_loss(),
            max_consecutive_losses: default_max_consecutive_losses(),
            min_bankroll: default_min_bankroll(),
            cooldown_windows: default_cooldown_windows(),
            window_duration_secs: default_window_duration_secs(),
            max_daily_trades: default_max_daily_trades(),
        }
    }
}

impl RiskConfig {
    /// Cooldown imposed after a losing trade
    pub fn cooldown(&self) -> chrono::Duration {
        chrono::Duration::seconds(
            i64::from(self.cooldown_windows).saturating_mul(self.window_duration_secs as i64),
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BalanceConfig {
    /// Wallet / account address whose funds are checked
    #[serde(default)]
    pub account_address: String,
    /// How long a fetched balance is trusted
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    /// Refresh before approving a request above this share of cached available funds
    #[serde(default = "default_refresh_ratio")]
    pub refresh_ratio: Decimal,
}

fn default_cache_ttl_secs() -> u64 {
    30
}

fn default_refresh_ratio() -> Decimal {
    dec!(0.8)
}

impl Default for BalanceConfig {
    fn default() -> Self {
        Self {
            account_address: String::new(),
            cache_ttl_secs: default_cache_ttl_secs(),
            refresh_ratio: default_refresh_ratio(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct KillSwitchConfig {
    /// Presence of this file halts new orders
    #[serde(default = "default_sentinel_path")]
    pub sentinel_path: PathBuf,
    /// Optional environment variable that halts new orders when truthy
    #[serde(default)]
    pub env_var: Option<String>,
}

fn default_sentinel_path() -> PathBuf {
    PathBuf::from("KILL_SWITCH")
}

impl Default for KillSwitchConfig {
    fn default() -> Self {
        Self {
            sentinel_path: default_sentinel_path(),
            env_var: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceConfig {
    /// Directory holding the risk state and order journal
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
    #[serde(default = "default_risk_state_file")]
    pub risk_state_file: String,
    #[serde(default = "default_order_journal_file")]
    pub order_journal_file: String,
}

fn default_state_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("tradeguard"))
        .unwrap_or_else(|| PathBuf::from("data"))
}

fn default_risk_state_file() -> String {
    "risk_state.json".to_string()
}

fn default_order_journal_file() -> String {
    "orders.jsonl".to_string()
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
            risk_state_file: default_risk_state_file(),
            order_journal_file: default_order_journal_file(),
        }
    }
}

impl PersistenceConfig {
    pub fn risk_state_path(&self) -> PathBuf {
        self.state_dir.join(&self.risk_state_file)
    }

    pub fn order_journal_path(&self) -> PathBuf {
        self.state_dir.join(&self.order_journal_file)
    }
}

/// Paper exchange settings used by the dry-run binary path
#[derive(Debug, Clone, Deserialize)]
pub struct PaperConfig {
    /// Starting cash of the simulated account
    #[serde(default = "default_paper_balance")]
    pub starting_balance: Decimal,
}

fn default_paper_balance() -> Decimal {
    dec!(1000)
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            starting_balance: default_paper_balance(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
    /// Directory for daily rolling log files (disabled when unset)
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            log_dir: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            // Start with default values
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("TRADEGUARD_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (TRADEGUARD_RISK__MAX_DAILY_LOSS, etc.)
            .add_source(
                Environment::with_prefix("TRADEGUARD")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        // Execution params
        if self.execution.api_timeout_secs == 0 {
            errors.push("api_timeout_secs must be positive".to_string());
        }
        if self.execution.max_retry_attempts == 0 {
            errors.push("max_retry_attempts must be at least 1".to_string());
        }
        if self.execution.retry_min_wait_ms > self.execution.retry_max_wait_ms {
            errors.push("retry_min_wait_ms must not exceed retry_max_wait_ms".to_string());
        }
        if !(0.0..=1.0).contains(&self.execution.retry_jitter) {
            errors.push("retry_jitter must be between 0 and 1".to_string());
        }
        if self.execution.slippage_warn_threshold < Decimal::ZERO {
            errors.push("slippage_warn_threshold must not be negative".to_string());
        }

        // Risk params
        if self.risk.max_daily_loss <= Decimal::ZERO {
            errors.push("max_daily_loss must be positive".to_string());
        }
        if self.risk.max_consecutive_losses == 0 {
            errors.push("max_consecutive_losses must be at least 1".to_string());
        }
        if self.risk.min_bankroll < Decimal::ZERO {
            errors.push("min_bankroll must not be negative".to_string());
        }
        if self.risk.max_daily_trades == 0 {
            errors.push("max_daily_trades must be at least 1".to_string());
        }

        // Balance params
        if self.balance.cache_ttl_secs == 0 {
            errors.push("balance cache_ttl_secs must be positive".to_string());
        }
        if self.balance.refresh_ratio <= Decimal::ZERO || self.balance.refresh_ratio > Decimal::ONE {
            errors.push("balance refresh_ratio must be in (0, 1]".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
