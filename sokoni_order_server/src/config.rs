use std::env;

use daraja::DarajaConfig;
use log::*;
use sokoni_common::Secret;
use sokoni_order_engine::traits::MarketConfig;

const DEFAULT_SOKONI_HOST: &str = "127.0.0.1";
const DEFAULT_SOKONI_PORT: u16 = 8460;
const DEFAULT_EXPIRY_CHECK_INTERVAL_SECS: u64 = 60;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub auth: AuthConfig,
    /// Marketplace policy handed to the checkout API: commission rate and pickup window.
    pub market: MarketConfig,
    /// Mobile-money gateway credentials and endpoints.
    pub daraja: DarajaConfig,
    /// How often the pickup-deadline sweep runs.
    pub expiry_check_interval: std::time::Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_SOKONI_HOST.to_string(),
            port: DEFAULT_SOKONI_PORT,
            database_url: String::default(),
            auth: AuthConfig::default(),
            market: MarketConfig::default(),
            daraja: DarajaConfig::default(),
            expiry_check_interval: std::time::Duration::from_secs(DEFAULT_EXPIRY_CHECK_INTERVAL_SECS),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("SOKONI_HOST").ok().unwrap_or_else(|| DEFAULT_SOKONI_HOST.into());
        let port = env::var("SOKONI_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for SOKONI_PORT. {e} Using the default, {DEFAULT_SOKONI_PORT}, \
                         instead."
                    );
                    DEFAULT_SOKONI_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_SOKONI_PORT);
        let database_url = env::var("SOKONI_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ SOKONI_DATABASE_URL is not set. Please set it to the URL for the order database.");
            String::default()
        });
        let auth = AuthConfig::try_from_env().unwrap_or_else(|e| {
            warn!("🪛️ Could not load the authentication configuration from the environment. {e}. Reverting to the default configuration.");
            AuthConfig::default()
        });
        let market = market_config_from_env();
        let daraja = DarajaConfig::from_env_or_default();
        let expiry_check_interval = env::var("SOKONI_EXPIRY_CHECK_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(std::time::Duration::from_secs)
            .unwrap_or(std::time::Duration::from_secs(DEFAULT_EXPIRY_CHECK_INTERVAL_SECS));
        Self { host, port, database_url, auth, market, daraja, expiry_check_interval }
    }
}

fn market_config_from_env() -> MarketConfig {
    let defaults = MarketConfig::default();
    let commission_rate_bps = env::var("SOKONI_COMMISSION_RATE_BPS")
        .ok()
        .and_then(|s| s.parse::<u32>().ok())
        .filter(|bps| {
            let valid = *bps <= 10_000;
            if !valid {
                error!("🪛️ SOKONI_COMMISSION_RATE_BPS must be at most 10000. Using the default instead.");
            }
            valid
        })
        .unwrap_or(defaults.commission_rate_bps);
    let pickup_window_days = env::var("SOKONI_PICKUP_WINDOW_DAYS")
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .filter(|days| {
            let valid = *days > 0;
            if !valid {
                error!("🪛️ SOKONI_PICKUP_WINDOW_DAYS must be positive. Using the default instead.");
            }
            valid
        })
        .unwrap_or(defaults.pickup_window_days);
    MarketConfig { commission_rate_bps, pickup_window_days }
}

#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// The HS256 secret shared with the identity service that issues the access tokens.
    pub jwt_secret: Secret<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        warn!(
            "🪛️ Using the built-in development JWT secret. Tokens signed with it are worthless in production; set \
             SOKONI_JWT_SECRET."
        );
        Self { jwt_secret: Secret::new("sokoni-dev-secret-do-not-deploy".to_string()) }
    }
}

impl AuthConfig {
    pub fn new(secret: &str) -> Self {
        Self { jwt_secret: Secret::new(secret.to_string()) }
    }

    pub fn try_from_env() -> Result<Self, String> {
        let secret = env::var("SOKONI_JWT_SECRET").map_err(|_| "SOKONI_JWT_SECRET is not set".to_string())?;
        if secret.len() < 16 {
            return Err("SOKONI_JWT_SECRET must be at least 16 characters".to_string());
        }
        Ok(Self { jwt_secret: Secret::new(secret) })
    }
}
