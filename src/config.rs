use anyhow::Context;
use serde::Deserialize;

/// Config, from a TOML file whose values can be overridden by env vars.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// <address>:<port> to serve the JSON API on
    pub listen_address: String,

    /// <address>:<port> to serve metrics on
    pub metrics_address: String,

    /// By default, output JSON logs. Only if this flag is set to true, output colourful human-friendly logs
    #[serde(default)]
    pub human_logs: bool,

    /// Max HTTP body size the API accepts
    #[serde(default = "max_body_size")]
    pub max_body_size: usize,

    /// Postgres connection string. Overridden by `DATABASE_URL`.
    pub db_dsn: String,

    /// maximum number of connections maintained by PostgresStore
    pub db_pool_size: u32,

    /// maximum seconds waiting for a database connection
    pub db_connection_timeout: u64,

    /// Key used to sign session and password-reset tokens. Overridden by `SECRET_KEY`.
    pub secret_key: String,

    #[serde(default = "session_ttl_secs")]
    pub session_ttl_secs: u64,

    #[serde(default = "reset_token_ttl_secs")]
    pub reset_token_ttl_secs: u64,

    /// How many posts a feed, profile or search page holds
    #[serde(default = "posts_per_page")]
    pub posts_per_page: u32,

    /// From: address of password reset emails
    #[serde(default = "mail_sender")]
    pub mail_sender: String,
}

impl Config {
    pub fn from_file(filepath: &str) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(filepath)
            .with_context(|| format!("couldn't read config file {}", filepath))?;
        let mut config = Self::from_toml(&contents)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn from_toml(contents: &str) -> anyhow::Result<Self> {
        toml::from_str(contents).context("couldn't parse config file")
    }

    /// The database location and signing key usually come from the deployment environment
    /// rather than the checked-in file.
    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(dsn) = var("DATABASE_URL") {
            self.db_dsn = dsn;
        }
        if let Some(key) = var("SECRET_KEY") {
            self.secret_key = key;
        }
    }
}

fn max_body_size() -> usize {
    65536
}

fn session_ttl_secs() -> u64 {
    7 * 24 * 60 * 60
}

fn reset_token_ttl_secs() -> u64 {
    600
}

fn posts_per_page() -> u32 {
    25
}

fn mail_sender() -> String {
    "no-reply@microblog.local".to_owned()
}
