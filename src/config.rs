//! Configuration parsing and validation for the relay server
//!
//! Command-line argument parsing via clap. The upstream credential comes from
//! the DEEPSEEK_API_KEY environment variable and is required, so a missing
//! key aborts the process before it ever binds a listener.
use anyhow::anyhow;
use chat_relay::auth::ApiKey;
use clap::Parser;
use url::Url;

#[derive(Debug, Clone, Parser)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// The port on which the relay server will listen.
    #[arg(short = 'p', long, default_value_t = 8000)]
    pub port: u16,

    /// The upstream chat-completions endpoint.
    #[arg(long, default_value = "https://api.deepseek.com/v1/chat/completions")]
    pub upstream_url: Url,

    /// The model name sent upstream with every request.
    #[arg(long, default_value = "deepseek-chat")]
    pub upstream_model: String,

    /// Upstream request timeout in seconds, connect and read combined.
    #[arg(long, default_value_t = 30)]
    pub upstream_timeout_secs: u64,

    /// The bearer credential for the upstream API.
    #[arg(long, env = "DEEPSEEK_API_KEY", hide_env_values = true)]
    pub api_key: ApiKey,

    /// Maximum number of idle HTTP connections to keep alive to the upstream
    /// host.
    #[arg(long, default_value_t = 32)]
    pub pool_max_idle_per_host: usize,

    /// How long (in seconds) to keep idle HTTP connections alive.
    #[arg(long, default_value_t = 90)]
    pub pool_idle_timeout_secs: u64,
}

impl Config {
    pub fn validate(self) -> Result<Self, anyhow::Error> {
        match self.upstream_url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(anyhow!(
                    "Upstream url '{}' has unsupported scheme '{}'",
                    self.upstream_url,
                    other
                ));
            }
        }
        if self.api_key.expose().is_empty() {
            return Err(anyhow!("DEEPSEEK_API_KEY is set but empty"));
        }
        if self.upstream_timeout_secs == 0 {
            return Err(anyhow!("Upstream timeout must be at least one second"));
        }
        Ok(self)
    }
}
