use anyhow::Result;
use clap::Parser;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::model::{CustomElements, DEFAULT_FOOTER_TEXT, DEFAULT_HEADER_TEXT};

#[derive(Parser, Debug)]
#[command(name = "zeronav")]
#[command(about = "Runs the zeronav bookmark service", long_about = None)]
pub struct Cli {
    #[arg(short = 'c', long = "config")]
    pub config_path: Option<String>,
}

pub fn default_config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".zeronav")
}

pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.yaml")
}

#[derive(Debug, Deserialize, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Libsql,
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct App {
    port: u16,
    #[serde(default)]
    admin_token: String,
    #[serde(default = "default_record_key")]
    record_key: String,
    #[serde(default = "default_backup_ttl_days")]
    backup_ttl_days: u64,
    #[serde(default)]
    pub backend: Backend,
    #[serde(default = "default_database")]
    database: String,
    #[serde(default)]
    turso_url: Option<String>,
    #[serde(default)]
    turso_auth_token: Option<String>,
    #[serde(default = "default_sync_interval")]
    pub sync_interval_seconds: u64,
    #[serde(default = "default_purge_interval")]
    pub purge_interval_seconds: u64,
}

fn default_record_key() -> String {
    crate::store::DEFAULT_RECORD_KEY.to_string()
}

fn default_backup_ttl_days() -> u64 {
    30
}

fn default_database() -> String {
    "zeronav.db".to_string()
}

fn default_sync_interval() -> u64 {
    60
}

fn default_purge_interval() -> u64 {
    3600
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

impl App {
    pub fn get_port(&self) -> u16 {
        self.port
    }

    pub fn get_db(&self) -> &str {
        &self.database
    }

    pub fn get_admin_token(&self) -> &str {
        &self.admin_token
    }

    pub fn get_record_key(&self) -> &str {
        &self.record_key
    }

    /// Saturates for day counts too large to express in seconds.
    pub fn backup_ttl(&self) -> Duration {
        Duration::from_secs(self.backup_ttl_days.saturating_mul(24 * 60 * 60))
    }

    /// Embedded replica credentials, present only when both are set.
    pub fn replica(&self) -> Option<(&str, &str)> {
        Some((non_empty(&self.turso_url)?, non_empty(&self.turso_auth_token)?))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Site {
    #[serde(default = "default_header_text")]
    pub header_text: String,
    #[serde(default = "default_footer_text")]
    pub footer_text: String,
}

fn default_header_text() -> String {
    DEFAULT_HEADER_TEXT.to_string()
}

fn default_footer_text() -> String {
    DEFAULT_FOOTER_TEXT.to_string()
}

impl Default for Site {
    fn default() -> Self {
        Site {
            header_text: default_header_text(),
            footer_text: default_footer_text(),
        }
    }
}

impl Site {
    pub fn custom_elements(&self) -> CustomElements {
        CustomElements {
            header_text: self.header_text.clone(),
            footer_text: self.footer_text.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Config {
    pub app: App,
    #[serde(default)]
    pub site: Site,
}

impl Config {
    pub fn new(path: &str) -> Result<Self> {
        let cfg = Config::load_config(path)?;
        Ok(cfg)
    }

    fn load_config(path: &str) -> Result<Config> {
        let yaml_str = fs::read_to_string(path)?;
        Config::from_yaml(&yaml_str, |name| env::var(name).ok())
    }

    pub fn from_yaml<F>(yaml_str: &str, lookup: F) -> Result<Config>
    where
        F: Fn(&str) -> Option<String>,
    {
        let yaml_with_env = Config::substitute_vars(yaml_str, lookup)?;
        let config: Config = serde_yaml::from_str(&yaml_with_env)?;
        if config.app.admin_token.is_empty() {
            tracing::warn!("admin_token is empty, every admin request will be rejected");
        }
        Ok(config)
    }

    fn substitute_vars<F>(yaml_str: &str, lookup: F) -> Result<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut result = yaml_str.to_string();
        let mut offset = 0;

        while let Some(start) = result[offset..].find("${") {
            let actual_start = offset + start;
            if let Some(end) = result[actual_start..].find("}") {
                let var_name = &result[actual_start + 2..actual_start + end];

                // Handle default values like ${VAR:-default}
                let value = if let Some(default_start) = var_name.find(":-") {
                    let actual_var = &var_name[..default_start];
                    let default_val = &var_name[default_start + 2..];
                    lookup(actual_var).unwrap_or_else(|| default_val.to_string())
                } else {
                    lookup(var_name).unwrap_or_else(|| {
                        tracing::warn!(var = var_name, "environment variable not found");
                        String::new()
                    })
                };

                result.replace_range(actual_start..actual_start + end + 1, &value);
                offset = actual_start + value.len();
            } else {
                break;
            }
        }

        Ok(result)
    }
}
