use std::env;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub key_id: String,
    pub key_secret: String,
    pub signature_secret: String,
    pub currency: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub poll_interval_secs: u64,
    pub retry_interval_secs: u64,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub allow_empty_cart: bool,
    pub gateway: GatewayConfig,
    pub scheduler: SchedulerConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        let allow_empty_cart = env::var("ALLOW_EMPTY_CART_CHECKOUT")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let gateway = GatewayConfig {
            base_url: env::var("GATEWAY_BASE_URL")
                .unwrap_or_else(|_| "https://api.gateway.example/v1".to_string()),
            key_id: env::var("GATEWAY_KEY_ID")?,
            key_secret: env::var("GATEWAY_KEY_SECRET")?,
            signature_secret: env::var("GATEWAY_SIGNATURE_SECRET")?,
            currency: env::var("GATEWAY_CURRENCY").unwrap_or_else(|_| "INR".to_string()),
            timeout_secs: env::var("GATEWAY_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
        };

        let scheduler = SchedulerConfig {
            poll_interval_secs: env::var("REFUND_POLL_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(300),
            retry_interval_secs: env::var("SETTLEMENT_RETRY_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3600),
        };

        Ok(Self {
            database_url,
            host,
            port,
            allow_empty_cart,
            gateway,
            scheduler,
        })
    }
}
