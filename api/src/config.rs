use std::env;

use anyhow::Context;

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    /// Bearer key for every route except /health
    pub admin_api_key: String,
    pub port: u16,
    /// Ledger events are POSTed here when set; otherwise they are only logged
    pub notify_webhook_url: Option<String>,
    /// How long rejected-import reports stay downloadable
    pub import_report_ttl_secs: i64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let admin_api_key = env::var("ADMIN_API_KEY").context("ADMIN_API_KEY must be set")?;
        if admin_api_key.trim().is_empty() {
            anyhow::bail!("ADMIN_API_KEY must not be empty");
        }

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            admin_api_key,
            port: env::var("PORT")
                .ok()
                .map(|p| p.parse().context("PORT must be a port number"))
                .transpose()?
                .unwrap_or(8080),
            notify_webhook_url: env::var("NOTIFY_WEBHOOK_URL")
                .ok()
                .filter(|u| !u.trim().is_empty()),
            import_report_ttl_secs: env::var("IMPORT_REPORT_TTL_SECS")
                .ok()
                .map(|s| s.parse().context("IMPORT_REPORT_TTL_SECS must be an integer"))
                .transpose()?
                .unwrap_or(3600),
        })
    }
}
