use log::*;
use sokoni_common::Secret;

#[derive(Debug, Clone)]
pub struct DarajaConfig {
    /// Base url for the Daraja API, e.g. "https://sandbox.safaricom.co.ke"
    pub api_base: String,
    pub consumer_key: Secret<String>,
    pub consumer_secret: Secret<String>,
    /// The business paybill shortcode that receives the payments.
    pub shortcode: String,
    pub passkey: Secret<String>,
    /// The publicly reachable url that Daraja posts payment callbacks to.
    pub callback_url: String,
}

impl Default for DarajaConfig {
    fn default() -> Self {
        Self {
            api_base: "https://sandbox.safaricom.co.ke".to_string(),
            consumer_key: Secret::default(),
            consumer_secret: Secret::default(),
            shortcode: "174379".to_string(),
            passkey: Secret::default(),
            callback_url: String::default(),
        }
    }
}

impl DarajaConfig {
    pub fn from_env_or_default() -> Self {
        let api_base = std::env::var("SOKONI_DARAJA_API_BASE").unwrap_or_else(|_| {
            warn!("SOKONI_DARAJA_API_BASE not set, using the sandbox endpoint");
            "https://sandbox.safaricom.co.ke".to_string()
        });
        let consumer_key = Secret::new(std::env::var("SOKONI_DARAJA_CONSUMER_KEY").unwrap_or_else(|_| {
            warn!("SOKONI_DARAJA_CONSUMER_KEY not set. Payment initiation will fail until it is configured.");
            String::default()
        }));
        let consumer_secret = Secret::new(std::env::var("SOKONI_DARAJA_CONSUMER_SECRET").unwrap_or_else(|_| {
            warn!("SOKONI_DARAJA_CONSUMER_SECRET not set. Payment initiation will fail until it is configured.");
            String::default()
        }));
        let shortcode = std::env::var("SOKONI_DARAJA_SHORTCODE").unwrap_or_else(|_| {
            warn!("SOKONI_DARAJA_SHORTCODE not set, using the sandbox test shortcode");
            "174379".to_string()
        });
        let passkey = Secret::new(std::env::var("SOKONI_DARAJA_PASSKEY").unwrap_or_else(|_| {
            warn!("SOKONI_DARAJA_PASSKEY not set. Payment initiation will fail until it is configured.");
            String::default()
        }));
        let callback_url = std::env::var("SOKONI_DARAJA_CALLBACK_URL").unwrap_or_else(|_| {
            warn!("SOKONI_DARAJA_CALLBACK_URL not set. Daraja will have nowhere to post payment results.");
            String::default()
        });
        Self { api_base, consumer_key, consumer_secret, shortcode, passkey, callback_url }
    }
}
