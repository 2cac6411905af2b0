use std::time::Duration;

/// Which record store backend serves searches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    /// Direct Postgres connection via `DATABASE_URL`.
    Postgres { database_url: String },
    /// PostgREST / Supabase REST API.
    Rest { base_url: String, api_key: String },
    /// In-process store seeded from a JSON file.
    Memory { seed_file: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub backend: StoreBackend,
    pub port: u16,
    /// Upper bound for every single store call.
    pub store_timeout: Duration,
    /// Search result cache TTL; zero disables caching.
    pub search_cache_ttl: Duration,
    pub rate_limit_per_second: u64,
    pub rate_limit_burst: u32,
}

fn required(name: &str) -> anyhow::Result<String> {
    let value = std::env::var(name)
        .map_err(|_| anyhow::anyhow!("{} environment variable required", name))?;
    if value.trim().is_empty() {
        anyhow::bail!("{} cannot be empty", name);
    }
    Ok(value)
}

fn parse_or<T: std::str::FromStr>(name: &str, default: T) -> anyhow::Result<T> {
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{} must be a valid number, got '{}'", name, raw)),
        _ => Ok(default),
    }
}

impl StoreBackend {
    fn from_env() -> anyhow::Result<Self> {
        let kind = std::env::var("STORE_BACKEND").unwrap_or_else(|_| "postgres".to_string());

        match kind.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" => {
                let database_url = std::env::var("DB_URL")
                    .or_else(|_| std::env::var("DATABASE_URL"))
                    .map_err(|_| {
                        anyhow::anyhow!("DB_URL or DATABASE_URL environment variable required")
                    })
                    .and_then(|url| {
                        if url.trim().is_empty() {
                            anyhow::bail!("DB_URL cannot be empty");
                        }
                        if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
                            anyhow::bail!("DB_URL must start with postgresql:// or postgres://");
                        }
                        Ok(url)
                    })?;
                Ok(StoreBackend::Postgres { database_url })
            }
            "rest" | "supabase" => {
                let base_url = required("SUPABASE_URL").and_then(|raw| {
                    let parsed = url::Url::parse(raw.trim())
                        .map_err(|e| anyhow::anyhow!("SUPABASE_URL is not a valid URL: {}", e))?;
                    if !matches!(parsed.scheme(), "http" | "https") {
                        anyhow::bail!("SUPABASE_URL must start with http:// or https://");
                    }
                    Ok(raw.trim().to_string())
                })?;
                let api_key = required("SUPABASE_ANON_KEY")?;
                Ok(StoreBackend::Rest { base_url, api_key })
            }
            "memory" => Ok(StoreBackend::Memory {
                seed_file: required("MEMORY_SEED_FILE")?,
            }),
            other => anyhow::bail!(
                "STORE_BACKEND must be one of postgres, rest, memory (got '{}')",
                other
            ),
        }
    }

    /// Backend name safe to log (no credentials).
    pub fn label(&self) -> &'static str {
        match self {
            StoreBackend::Postgres { .. } => "postgres",
            StoreBackend::Rest { .. } => "rest",
            StoreBackend::Memory { .. } => "memory",
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let store_timeout_ms: u64 = parse_or("STORE_TIMEOUT_MS", 5_000)?;
        if store_timeout_ms == 0 {
            anyhow::bail!("STORE_TIMEOUT_MS must be greater than 0");
        }

        let config = Self {
            backend: StoreBackend::from_env()?,
            port: parse_or("PORT", 3000)
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            store_timeout: Duration::from_millis(store_timeout_ms),
            search_cache_ttl: Duration::from_secs(parse_or("SEARCH_CACHE_TTL_SECS", 30)?),
            rate_limit_per_second: parse_or("RATE_LIMIT_PER_SECOND", 10)?,
            rate_limit_burst: parse_or("RATE_LIMIT_BURST", 20)?,
        };

        if config.rate_limit_per_second == 0 || config.rate_limit_burst == 0 {
            anyhow::bail!("RATE_LIMIT_PER_SECOND and RATE_LIMIT_BURST must be greater than 0");
        }

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!("Store backend: {}", config.backend.label());
        if let StoreBackend::Rest { ref base_url, .. } = config.backend {
            tracing::debug!("Supabase URL: {}", base_url);
        }
        tracing::debug!("Store timeout: {:?}", config.store_timeout);
        tracing::debug!("Search cache TTL: {:?}", config.search_cache_ttl);
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }
}
