use crate::error::{Error, Result};
use crate::services::generator::GeneratorSettings;
use dotenvy::dotenv;
use std::env;
use std::sync::OnceLock;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub database_url: Option<String>,
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub openai_model: String,
    pub max_items_per_job: u32,
    pub progress_retention: Duration,
    pub sweep_interval: Duration,
    pub usage_retention_days: i64,
    pub generator: GeneratorSettings,
}

pub static CONFIG: OnceLock<Config> = OnceLock::new();

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let generator = GeneratorSettings {
            parallelism: get_env_or("GENERATOR_PARALLELISM", 3)?,
            max_attempts: get_env_or("GENERATOR_MAX_ATTEMPTS", 30)?,
            ..GeneratorSettings::default()
        };
        if generator.parallelism == 0 {
            return Err(Error::Config(
                "GENERATOR_PARALLELISM must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            server_address: get_env("SERVER_ADDRESS")?,
            database_url: env::var("DATABASE_URL").ok().filter(|s| !s.trim().is_empty()),
            openai_api_key: get_env("OPENAI_API_KEY")?,
            openai_base_url: env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            openai_model: env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            max_items_per_job: get_env_or("MAX_ITEMS_PER_JOB", 50)?,
            progress_retention: Duration::from_secs(get_env_or("PROGRESS_RETENTION_SECS", 3600)?),
            sweep_interval: Duration::from_secs(get_env_or("SWEEP_INTERVAL_SECS", 300)?),
            usage_retention_days: get_env_or("USAGE_RETENTION_DAYS", 30)?,
            generator,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_address: "127.0.0.1:0".to_string(),
            database_url: None,
            openai_api_key: String::new(),
            openai_base_url: "https://api.openai.com/v1".to_string(),
            openai_model: "gpt-4o-mini".to_string(),
            max_items_per_job: 50,
            progress_retention: Duration::from_secs(3600),
            sweep_interval: Duration::from_secs(300),
            usage_retention_days: 30,
            generator: GeneratorSettings::default(),
        }
    }
}

fn get_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("Missing environment variable: {}", name)))
}

fn get_env_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e))),
        Err(_) => Ok(default),
    }
}

pub fn init_config() -> Result<()> {
    let config = Config::from_env()?;
    CONFIG
        .set(config)
        .map_err(|_| Error::Config("Configuration has already been initialized".to_string()))?;
    Ok(())
}

pub fn get_config() -> Result<&'static Config> {
    CONFIG
        .get()
        .ok_or_else(|| Error::Config("Configuration has not been initialized".to_string()))
}
