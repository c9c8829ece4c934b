//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and `INFOSCREEN_*` environment variable
//! overrides.

use crate::display::DisplaySettings;
use crate::sources::{HttpSettings, RestaurantRef};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub sources: SourcesConfig,

    #[serde(default)]
    pub polling: PollingConfig,

    #[serde(default)]
    pub windows: WindowsConfig,

    #[serde(default)]
    pub display: DisplayConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Allowed CORS origins; empty allows any
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8082
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
        }
    }
}

impl ApiConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Upstream data sources
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    #[serde(default = "default_unicafe_url")]
    pub unicafe_url: String,

    /// Restaurants picked out of the Unicafe listing, in display order
    #[serde(default = "default_restaurants")]
    pub restaurants: Vec<RestaurantRef>,

    /// Event providers, in display order
    #[serde(default = "default_event_feeds")]
    pub events: Vec<EventFeedConfig>,

    #[serde(default)]
    pub election: ElectionConfig,

    #[serde(default = "default_source_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_unicafe_url() -> String {
    "https://unicafe.fi/wp-json/swiss/v1/restaurants/?lang=en".to_string()
}

fn default_restaurants() -> Vec<RestaurantRef> {
    vec![RestaurantRef::new("exactum", 15), RestaurantRef::new("chemicum", 16)]
}

fn default_event_feeds() -> Vec<EventFeedConfig> {
    vec![
        EventFeedConfig {
            name: "TKO-äly".to_string(),
            url: String::new(),
            interval_minutes: 5,
            max_events: default_max_events(),
        },
        EventFeedConfig {
            name: "Ilotalo".to_string(),
            url: String::new(),
            interval_minutes: 15,
            max_events: default_max_events(),
        },
    ]
}

fn default_source_timeout() -> u64 {
    10
}

fn default_user_agent() -> String {
    format!("infoscreen/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            unicafe_url: default_unicafe_url(),
            restaurants: default_restaurants(),
            events: default_event_feeds(),
            election: ElectionConfig::default(),
            request_timeout_secs: default_source_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

impl SourcesConfig {
    pub fn http(&self) -> HttpSettings {
        HttpSettings {
            timeout: Duration::from_secs(self.request_timeout_secs),
            user_agent: self.user_agent.clone(),
        }
    }
}

/// One event provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventFeedConfig {
    /// Subtitle shown above the provider's events
    pub name: String,

    /// Feed URL; providers without one are skipped
    #[serde(default)]
    pub url: String,

    #[serde(default = "default_event_interval")]
    pub interval_minutes: u64,

    #[serde(default = "default_max_events")]
    pub max_events: usize,
}

fn default_event_interval() -> u64 {
    15
}

fn default_max_events() -> usize {
    10
}

/// Election turnout feed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectionConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_by_faculty_url")]
    pub by_faculty_url: String,

    #[serde(default = "default_by_hour_url")]
    pub by_hour_url: String,

    #[serde(default = "default_faculty")]
    pub faculty: String,
}

fn default_by_faculty_url() -> String {
    "http://vaalitulos.hyy.fi/2022/votes_by_faculty.json".to_string()
}

fn default_by_hour_url() -> String {
    "http://vaalitulos.hyy.fi/2022/votes_by_hour.json".to_string()
}

fn default_faculty() -> String {
    "Matemaattis-luonnontieteellinen".to_string()
}

impl Default for ElectionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            by_faculty_url: default_by_faculty_url(),
            by_hour_url: default_by_hour_url(),
            faculty: default_faculty(),
        }
    }
}

/// Poll intervals for sources without their own
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_restaurants_interval")]
    pub restaurants_minutes: u64,

    #[serde(default = "default_election_interval")]
    pub election_minutes: u64,
}

fn default_restaurants_interval() -> u64 {
    60
}

fn default_election_interval() -> u64 {
    60
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            restaurants_minutes: default_restaurants_interval(),
            election_minutes: default_election_interval(),
        }
    }
}

/// Time windows and the timers that follow them
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowsConfig {
    #[serde(default = "default_countdown_lead")]
    pub countdown_lead_minutes: i64,

    #[serde(default = "default_menu_padding")]
    pub menu_padding_minutes: i64,

    /// Longest single timer sleep; longer waits are chained
    #[serde(default = "default_max_timer")]
    pub max_timer_ms: u64,

    /// IANA zone that dates and lunch hours are read in
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

fn default_countdown_lead() -> i64 {
    120
}

fn default_menu_padding() -> i64 {
    60
}

fn default_max_timer() -> u64 {
    (1 << 31) - 1
}

fn default_timezone() -> String {
    "Europe/Helsinki".to_string()
}

impl Default for WindowsConfig {
    fn default() -> Self {
        Self {
            countdown_lead_minutes: default_countdown_lead(),
            menu_padding_minutes: default_menu_padding(),
            max_timer_ms: default_max_timer(),
            timezone: default_timezone(),
        }
    }
}

impl WindowsConfig {
    pub fn timezone(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("unknown time zone {:?}", self.timezone)))
    }
}

/// Screen presentation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    #[serde(default = "default_carousel_interval")]
    pub carousel_interval_secs: u64,

    #[serde(default = "default_restaurant_prefix")]
    pub restaurant_prefix: String,

    /// Longest a `/api/display/changes` request waits
    #[serde(default = "default_long_poll")]
    pub long_poll_secs: u64,
}

fn default_carousel_interval() -> u64 {
    10
}

fn default_restaurant_prefix() -> String {
    "Unicafe".to_string()
}

fn default_long_poll() -> u64 {
    30
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            carousel_interval_secs: default_carousel_interval(),
            restaurant_prefix: default_restaurant_prefix(),
            long_poll_secs: default_long_poll(),
        }
    }
}

/// Longest countdown lead or menu padding, one year
const MAX_WINDOW_MINUTES: i64 = 365 * 24 * 60;

fn window_minutes(name: &str, minutes: i64) -> Result<chrono::Duration, ConfigError> {
    if minutes < 0 {
        return Err(ConfigError::Invalid(format!("{} must not be negative", name)));
    }
    if minutes > MAX_WINDOW_MINUTES {
        return Err(ConfigError::Invalid(format!("{} is too large", name)));
    }
    chrono::Duration::try_minutes(minutes)
        .ok_or_else(|| ConfigError::Invalid(format!("{} is too large", name)))
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,

    pub file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("infoscreen").join("config.toml")),
            Some(PathBuf::from("/etc/infoscreen/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Runtime settings for the display, validating the time zone
    pub fn display_settings(&self) -> Result<DisplaySettings, ConfigError> {
        if self.windows.max_timer_ms == 0 {
            return Err(ConfigError::Invalid("max_timer_ms must be positive".to_string()));
        }

        Ok(DisplaySettings {
            countdown_lead: window_minutes("countdown_lead_minutes", self.windows.countdown_lead_minutes)?,
            menu_padding: window_minutes("menu_padding_minutes", self.windows.menu_padding_minutes)?,
            max_timer: Duration::from_millis(self.windows.max_timer_ms),
            timezone: self.windows.timezone()?,
            carousel_interval: Duration::from_secs(self.display.carousel_interval_secs.max(1)),
            restaurant_prefix: self.display.restaurant_prefix.clone(),
        })
    }

    /// A poll interval given in minutes
    pub fn poll_interval(name: &str, minutes: u64) -> Result<Duration, ConfigError> {
        if minutes == 0 {
            return Err(ConfigError::Invalid(format!("{} must be positive", name)));
        }
        minutes
            .checked_mul(60)
            .map(Duration::from_secs)
            .ok_or_else(|| ConfigError::Invalid(format!("{} is too large", name)))
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides read through `var`
    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        // API overrides
        if let Some(host) = var("INFOSCREEN_API_HOST") {
            self.api.host = host;
        }
        if let Some(port) = var("INFOSCREEN_API_PORT") {
            if let Ok(p) = port.parse() {
                self.api.port = p;
            }
        }

        // Source overrides
        if let Some(url) = var("INFOSCREEN_UNICAFE_URL") {
            self.sources.unicafe_url = url;
        }
        if let Some(enabled) = var("INFOSCREEN_ELECTION_ENABLED") {
            if let Ok(e) = enabled.parse() {
                self.sources.election.enabled = e;
            }
        }

        // Window overrides
        if let Some(tz) = var("INFOSCREEN_TIMEZONE") {
            self.windows.timezone = tz;
        }

        // Logging overrides
        if let Some(level) = var("INFOSCREEN_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("INFOSCREEN_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Infoscreen Configuration
#
# Environment variables override these settings:
# - INFOSCREEN_API_HOST
# - INFOSCREEN_API_PORT
# - INFOSCREEN_UNICAFE_URL
# - INFOSCREEN_ELECTION_ENABLED
# - INFOSCREEN_TIMEZONE
# - INFOSCREEN_LOG_LEVEL
# - INFOSCREEN_LOG_FORMAT

[api]
# API server host
host = "0.0.0.0"

# API server port
port = 8082

# Allowed CORS origins (empty allows any)
cors_origins = []

[sources]
# Unicafe restaurant listing
unicafe_url = "https://unicafe.fi/wp-json/swiss/v1/restaurants/?lang=en"

# Timeout for upstream requests (seconds)
request_timeout_secs = 10

# Restaurants to show, by position in the listing
restaurants = [
    { slug = "exactum", id = 15 },
    { slug = "chemicum", id = 16 },
    # { slug = "kaivopiha", id = 0 },
]

# Event providers; a provider without a url is skipped
[[sources.events]]
name = "TKO-äly"
url = ""
interval_minutes = 5

[[sources.events]]
name = "Ilotalo"
url = ""
interval_minutes = 15

[sources.election]
# Show election turnout
enabled = false
by_faculty_url = "http://vaalitulos.hyy.fi/2022/votes_by_faculty.json"
by_hour_url = "http://vaalitulos.hyy.fi/2022/votes_by_hour.json"
faculty = "Matemaattis-luonnontieteellinen"

[polling]
# Poll intervals (minutes)
restaurants_minutes = 60
election_minutes = 60

[windows]
# Registration countdown starts this long before opening
countdown_lead_minutes = 120

# Menus are shown this long before opening and after closing
menu_padding_minutes = 60

# Longest single timer sleep (ms)
max_timer_ms = 2147483647

# Time zone for dates and lunch hours
timezone = "Europe/Helsinki"

[display]
# Seconds each restaurant stays on screen
carousel_interval_secs = 10

# Prefix for restaurant titles
restaurant_prefix = "Unicafe"

# Longest wait for /api/display/changes (seconds)
long_poll_secs = 30

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"

# Optional log file path
# file = "/var/log/infoscreen/infoscreen.log"
"#
    .to_string()
}
