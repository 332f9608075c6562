use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

/// Daemon configuration loaded from environment variables.
///
/// | Env Var                | Default                  |
/// |------------------------|--------------------------|
/// | `CUTPLAN_BIND_ADDR`    | `127.0.0.1:7777`         |
/// | `ML_SERVICE_URL`       | `http://127.0.0.1:8001`  |
/// | `DESCRIBE_CONCURRENCY` | `8`                      |
/// | `SAMPLE_WIDTH`         | `320`                    |
/// | `CUTPLAN_CACHE_DIR`    | `.cache/cutplan`         |
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub ml_service_url: String,
    /// Upper bound on frame descriptions in flight for one preprocessing request.
    pub describe_concurrency: usize,
    /// Decoded frames are scaled to this width before sampling.
    pub sample_width: u32,
    pub cache_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 7777)),
            ml_service_url: "http://127.0.0.1:8001".to_string(),
            describe_concurrency: 8,
            sample_width: 320,
            cache_dir: PathBuf::from(".cache/cutplan"),
        }
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{name} has an invalid value: {raw:?}")),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let defaults = Config::default();

        let describe_concurrency: usize =
            parse_var("DESCRIBE_CONCURRENCY", defaults.describe_concurrency)?;
        if describe_concurrency == 0 {
            anyhow::bail!("DESCRIBE_CONCURRENCY must be at least 1");
        }
        let sample_width: u32 = parse_var("SAMPLE_WIDTH", defaults.sample_width)?;
        if sample_width < 2 {
            anyhow::bail!("SAMPLE_WIDTH must be at least 2");
        }

        Ok(Config {
            bind_addr: parse_var("CUTPLAN_BIND_ADDR", defaults.bind_addr)?,
            ml_service_url: std::env::var("ML_SERVICE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.ml_service_url),
            describe_concurrency,
            sample_width,
            cache_dir: std::env::var("CUTPLAN_CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.cache_dir),
        })
    }
}
