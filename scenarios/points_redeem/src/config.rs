use std::time::Duration;

pub const BASE_URL_VAR: &str = "BASE_URL";
pub const USER_ID_VAR: &str = "USER_ID";
pub const AMOUNT_VAR: &str = "AMOUNT";
pub const PAUSE_MS_VAR: &str = "PAUSE_MS";
pub const IDEMPOTENCY_KEYS_VAR: &str = "IDEMPOTENCY_KEYS";

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_USER_ID: &str = "1";
pub const DEFAULT_AMOUNT: i64 = 1000;
pub const DEFAULT_PAUSE: Duration = Duration::from_millis(100);

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("BASE_URL `{0}` is not a valid URL: {1}")]
    InvalidBaseUrl(String, url::ParseError),
    #[error("AMOUNT `{0}` is not a whole number")]
    InvalidAmount(String),
    #[error("PAUSE_MS `{0}` is not a whole number of milliseconds")]
    InvalidPause(String),
    #[error("IDEMPOTENCY_KEYS `{0}` must be one of true, false, 1 or 0")]
    InvalidFlag(String),
}

/// Settings for the whole run, read once before any agent starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfiguration {
    pub base_url: String,
    pub user_id: String,
    pub amount: i64,
    /// How long each agent waits after checking a response.
    pub pause: Duration,
    /// Send a fresh `Idempotency-Key` header with every redemption.
    pub idempotency_keys: bool,
}

impl Default for RunConfiguration {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_id: DEFAULT_USER_ID.to_string(),
            amount: DEFAULT_AMOUNT,
            pause: DEFAULT_PAUSE,
            idempotency_keys: false,
        }
    }
}

impl RunConfiguration {
    /// Read the configuration from the environment. A connection string from the command line
    /// replaces `BASE_URL`.
    pub fn from_env(connection_string: Option<&str>) -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok(), connection_string)
    }

    /// Read the configuration through `lookup`, using the default for any variable that is
    /// missing or empty.
    ///
    /// The base URL is validated after `connection_string` is applied, so an unused `BASE_URL`
    /// is never checked.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
        connection_string: Option<&str>,
    ) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|value| !value.is_empty());
        let mut config = Self::default();

        if let Some(base_url) = connection_string
            .map(str::to_string)
            .or_else(|| var(BASE_URL_VAR))
        {
            config.base_url = base_url;
        }
        if let Some(user_id) = var(USER_ID_VAR) {
            config.user_id = user_id;
        }
        if let Some(amount) = var(AMOUNT_VAR) {
            config.amount = amount
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidAmount(amount.clone()))?;
        }
        if let Some(pause) = var(PAUSE_MS_VAR) {
            let millis: u64 = pause
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidPause(pause.clone()))?;
            config.pause = Duration::from_millis(millis);
        }
        if let Some(flag) = var(IDEMPOTENCY_KEYS_VAR) {
            config.idempotency_keys = match flag.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => true,
                "false" | "0" => false,
                _ => return Err(ConfigError::InvalidFlag(flag)),
            };
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        url::Url::parse(&self.base_url)
            .map_err(|e| ConfigError::InvalidBaseUrl(self.base_url.clone(), e))?;
        Ok(())
    }
}
