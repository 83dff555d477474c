use dotenvy::dotenv;
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_url: String,
    pub paystack_secret_key: String,
    pub paystack_base_url: String,
    pub solana_rpc_url: String,
    pub sweep_interval_secs: u64,
    pub sweep_stuck_after_secs: i64,
    pub sweep_batch_size: i64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok(); // Load .env file if present

        Ok(Config {
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            database_url: env::var("DATABASE_URL")?,
            paystack_secret_key: env::var("PAYSTACK_SECRET_KEY")?,
            paystack_base_url: env::var("PAYSTACK_BASE_URL")
                .unwrap_or_else(|_| "https://api.paystack.co".to_string()),
            solana_rpc_url: env::var("SOLANA_RPC_URL")
                .unwrap_or_else(|_| "https://api.mainnet-beta.solana.com".to_string()),
            sweep_interval_secs: env::var("SWEEP_INTERVAL_SECS")
                .unwrap_or_else(|_| "120".to_string())
                .parse()?,
            sweep_stuck_after_secs: env::var("SWEEP_STUCK_AFTER_SECS")
                .unwrap_or_else(|_| "120".to_string())
                .parse()?,
            sweep_batch_size: env::var("SWEEP_BATCH_SIZE")
                .unwrap_or_else(|_| "20".to_string())
                .parse()?,
        })
    }
}
