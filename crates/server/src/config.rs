use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration build error: {0}")]
    Build(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

#[derive(Clone, Debug, Deserialize)]
pub struct OAuth2Config {
    /// Authorization code lifetime in seconds
    #[serde(default = "default_grant_lifetime")]
    pub grant_lifetime: i64,
    /// Access token lifetime in seconds
    #[serde(default = "default_access_token_lifetime")]
    pub access_token_lifetime: i64,
}

impl Default for OAuth2Config {
    fn default() -> Self {
        Self {
            grant_lifetime: default_grant_lifetime(),
            access_token_lifetime: default_access_token_lifetime(),
        }
    }
}

/// Argon2id cost parameters.
///
/// Production keeps the (expensive) defaults; test configurations lower them.
#[derive(Clone, Debug, Deserialize)]
pub struct PasswordConfig {
    /// Memory cost in KiB
    #[serde(default = "default_memory_cost")]
    pub memory_cost: u32,
    /// Number of iterations
    #[serde(default = "default_time_cost")]
    pub time_cost: u32,
    #[serde(default = "default_parallelism")]
    pub parallelism: u32,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            memory_cost: default_memory_cost(),
            time_cost: default_time_cost(),
            parallelism: default_parallelism(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct ThrottleConfig {
    #[serde(default = "default_window_seconds")]
    pub window_seconds: i64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u64,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            window_seconds: default_window_seconds(),
            max_attempts: default_max_attempts(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct PasswordResetConfig {
    #[serde(default = "default_reset_lifetime_days")]
    pub lifetime_days: i64,
    /// Cap on simultaneously active reset codes for one user
    #[serde(default = "default_max_active_resets")]
    pub max_active_per_user: u64,
}

impl Default for PasswordResetConfig {
    fn default() -> Self {
        Self {
            lifetime_days: default_reset_lifetime_days(),
            max_active_per_user: default_max_active_resets(),
        }
    }
}

/// First superuser, created at startup when no superuser exists yet.
#[derive(Clone, Deserialize)]
pub struct BootstrapConfig {
    pub email: String,
    pub full_name: String,
    pub password: String,
}

impl std::fmt::Debug for BootstrapConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapConfig")
            .field("email", &self.email)
            .field("full_name", &self.full_name)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Public base URL of this service
    pub issuer_url: String,
    #[serde(default)]
    pub oauth2: OAuth2Config,
    #[serde(default)]
    pub password: PasswordConfig,
    #[serde(default)]
    pub throttle: ThrottleConfig,
    #[serde(default)]
    pub password_reset: PasswordResetConfig,
    #[serde(default)]
    pub bootstrap: Option<BootstrapConfig>,
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_grant_lifetime() -> i64 {
    100
}

fn default_access_token_lifetime() -> i64 {
    3600
}

fn default_memory_cost() -> u32 {
    argon2::Params::DEFAULT_M_COST
}

fn default_time_cost() -> u32 {
    argon2::Params::DEFAULT_T_COST
}

fn default_parallelism() -> u32 {
    argon2::Params::DEFAULT_P_COST
}

fn default_window_seconds() -> i64 {
    900
}

fn default_max_attempts() -> u64 {
    5
}

fn default_reset_lifetime_days() -> i64 {
    7
}

fn default_max_active_resets() -> u64 {
    3
}

impl AppConfig {
    /// Range checks that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.oauth2.grant_lifetime <= 0 || self.oauth2.grant_lifetime > 600 {
            return Err(ConfigError::Validation(
                "oauth2.grant_lifetime must be between 1 and 600 seconds".into(),
            ));
        }
        if self.oauth2.access_token_lifetime <= 0 {
            return Err(ConfigError::Validation(
                "oauth2.access_token_lifetime must be > 0".into(),
            ));
        }
        if self.throttle.window_seconds <= 0 || self.throttle.max_attempts == 0 {
            return Err(ConfigError::Validation(
                "throttle.window_seconds and throttle.max_attempts must be > 0".into(),
            ));
        }
        if self.password_reset.lifetime_days <= 0 {
            return Err(ConfigError::Validation(
                "password_reset.lifetime_days must be > 0".into(),
            ));
        }
        if self.password.parallelism == 0
            || self.password.time_cost == 0
            || self.password.memory_cost < 8 * self.password.parallelism
        {
            return Err(ConfigError::Validation(
                "password cost parameters are out of range (memory_cost >= 8 * parallelism)".into(),
            ));
        }
        Ok(())
    }
}

/// Load application configuration from `config.yaml` + environment overrides.
///
/// Any variable matching the key path separated by double underscores
/// (e.g. `THROTTLE__MAX_ATTEMPTS`) overrides the file value.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    use config::{Config, Environment, File};
    let cfg = Config::builder()
        .add_source(File::with_name("config.yaml").required(false))
        .add_source(Environment::default().separator("__"))
        .build()?;

    let app: AppConfig = cfg.try_deserialize()?;
    app.validate()?;
    Ok(app)
}
