use anyhow::{bail, Context};

use crate::service::negotiation::CommissionRate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub port: u16,
    pub store_backend: StoreBackend,
    pub commission_rate: CommissionRate,
    pub job_expiry_days: i64,
    pub expiry_sweep_secs: u64,
    pub require_verified_professionals: bool,
    pub allowed_origins: Vec<String>,
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{} is invalid: {}", name, e)),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn init() -> anyhow::Result<Config> {
        let jwt_secret = std::env::var("JWT_SECRET_KEY").context("JWT_SECRET_KEY must be set")?;

        let store_backend = match std::env::var("STORE_BACKEND")
            .unwrap_or_else(|_| "postgres".to_string())
            .to_lowercase()
            .as_str()
        {
            "postgres" => StoreBackend::Postgres,
            "memory" => StoreBackend::Memory,
            other => bail!("STORE_BACKEND must be postgres or memory, got {}", other),
        };

        let database_url = std::env::var("DATABASE_URL").ok();
        if store_backend == StoreBackend::Postgres && database_url.is_none() {
            bail!("DATABASE_URL must be set when STORE_BACKEND=postgres");
        }

        let rate: f64 = parse_var("COMMISSION_RATE", CommissionRate::DEFAULT.as_fraction())?;
        let commission_rate = CommissionRate::from_fraction(rate).map_err(anyhow::Error::msg)?;

        let job_expiry_days: i64 = parse_var("JOB_EXPIRY_DAYS", 30)?;
        if job_expiry_days <= 0 {
            bail!("JOB_EXPIRY_DAYS must be positive");
        }
        let expiry_sweep_secs: u64 = parse_var("EXPIRY_SWEEP_SECS", 3600)?;
        if expiry_sweep_secs == 0 {
            bail!("EXPIRY_SWEEP_SECS must be positive");
        }

        let allowed_origins = std::env::var("ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        Ok(Config {
            database_url,
            jwt_secret,
            port: parse_var("PORT", 8000)?,
            store_backend,
            commission_rate,
            job_expiry_days,
            expiry_sweep_secs,
            require_verified_professionals: parse_var("REQUIRE_VERIFIED_PROFESSIONALS", false)?,
            allowed_origins,
        })
    }
}

#[cfg(test)]
impl Config {
    pub fn for_tests() -> Config {
        Config {
            database_url: None,
            jwt_secret: "test-secret".to_string(),
            port: 0,
            store_backend: StoreBackend::Memory,
            commission_rate: CommissionRate::DEFAULT,
            job_expiry_days: 30,
            expiry_sweep_secs: 3600,
            require_verified_professionals: false,
            allowed_origins: vec![],
        }
    }
}
