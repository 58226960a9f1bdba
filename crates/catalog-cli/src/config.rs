// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use catalog_app::{DEFAULT_ROWS_PER_PAGE, PRODUCTS_COLLECTION, ROWS_PER_PAGE_OPTIONS};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::Level;

const CONFIG_VERSION: i64 = 1;
const DEFAULT_TOAST_MS: u64 = 3_000;
const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub storage: Storage,
    #[serde(default)]
    pub ui: Ui,
    #[serde(default)]
    pub log: Log,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            storage: Storage::default(),
            ui: Ui::default(),
            log: Log::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Storage {
    pub db_path: Option<String>,
    pub collection: Option<String>,
}

impl Default for Storage {
    fn default() -> Self {
        Self {
            db_path: None,
            collection: Some(PRODUCTS_COLLECTION.to_owned()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Ui {
    pub rows_per_page: Option<usize>,
    pub toast_ms: Option<i64>,
}

impl Default for Ui {
    fn default() -> Self {
        Self {
            rows_per_page: Some(DEFAULT_ROWS_PER_PAGE),
            toast_ms: Some(DEFAULT_TOAST_MS as i64),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Log {
    pub level: Option<String>,
    pub file: Option<String>,
}

impl Default for Log {
    fn default() -> Self {
        Self {
            level: Some(DEFAULT_LOG_LEVEL.to_owned()),
            file: None,
        }
    }
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = env::var_os("CATALOG_CONFIG_PATH") {
            return Ok(PathBuf::from(path));
        }

        let config_root = dirs::config_dir().ok_or_else(|| {
            anyhow!("cannot resolve config directory; set CATALOG_CONFIG_PATH to the config file")
        })?;

        let app_dir = config_root.join(catalog_db::APP_NAME);
        fs::create_dir_all(&app_dir)
            .with_context(|| format!("create config directory {}", app_dir.display()))?;
        Ok(app_dir.join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let value: toml::Value = toml::from_str(&raw)
            .with_context(|| format!("parse TOML config {}", path.display()))?;

        let version = value
            .get("version")
            .and_then(toml::Value::as_integer)
            .ok_or_else(|| {
                anyhow!(
                    "config file {} is not versioned. Add `version = 1` and place values under [storage], [ui], and [log]",
                    path.display()
                )
            })?;

        if version != CONFIG_VERSION {
            bail!(
                "unsupported config version {} in {}; expected version = 1",
                version,
                path.display()
            );
        }

        let config: Config = value
            .try_into()
            .with_context(|| format!("decode config {}", path.display()))?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if let Some(db_path) = &self.storage.db_path {
            catalog_db::validate_db_path(db_path)
                .with_context(|| format!("storage.db_path in {}", path.display()))?;
        }

        if let Some(collection) = &self.storage.collection {
            catalog_db::validate_collection_name(collection)
                .with_context(|| format!("storage.collection in {}", path.display()))?;
        }

        if let Some(rows) = self.ui.rows_per_page
            && !ROWS_PER_PAGE_OPTIONS.contains(&rows)
        {
            bail!(
                "ui.rows_per_page in {} must be one of {:?}, got {}",
                path.display(),
                ROWS_PER_PAGE_OPTIONS,
                rows
            );
        }

        if let Some(toast_ms) = self.ui.toast_ms
            && toast_ms <= 0
        {
            bail!(
                "ui.toast_ms in {} must be positive, got {}",
                path.display(),
                toast_ms
            );
        }

        if let Some(level) = &self.log.level {
            parse_level(level).with_context(|| format!("log.level in {}", path.display()))?;
        }

        if let Some(file) = &self.log.file
            && file.trim().is_empty()
        {
            bail!(
                "log.file in {} must not be empty; remove it to use the default location",
                path.display()
            );
        }

        Ok(())
    }

    pub fn db_path(&self) -> Result<PathBuf> {
        match &self.storage.db_path {
            Some(path) => Ok(PathBuf::from(path)),
            None => catalog_db::default_db_path(),
        }
    }

    pub fn collection(&self) -> &str {
        self.storage
            .collection
            .as_deref()
            .unwrap_or(PRODUCTS_COLLECTION)
    }

    pub fn rows_per_page(&self) -> usize {
        self.ui.rows_per_page.unwrap_or(DEFAULT_ROWS_PER_PAGE)
    }

    pub fn toast_life(&self) -> Duration {
        let millis = self
            .ui
            .toast_ms
            .and_then(|ms| u64::try_from(ms).ok())
            .unwrap_or(DEFAULT_TOAST_MS);
        Duration::from_millis(millis)
    }

    pub fn log_level(&self) -> Result<Level> {
        parse_level(self.log.level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL))
    }

    pub fn log_path(&self) -> Result<PathBuf> {
        if let Some(file) = &self.log.file {
            return Ok(PathBuf::from(file));
        }
        let data_root = dirs::data_local_dir().ok_or_else(|| {
            anyhow!("cannot resolve data directory; set log.file to a writable path")
        })?;
        let app_dir = data_root.join(catalog_db::APP_NAME);
        fs::create_dir_all(&app_dir)
            .with_context(|| format!("create data directory {}", app_dir.display()))?;
        Ok(app_dir.join("catalog.log"))
    }

    pub fn example_config(path: &Path) -> String {
        format!(
            "# catalog config\n# Place this file at: {}\n\nversion = 1\n\n[storage]\n# Optional. Default is platform data dir (for example ~/.local/share/catalog/catalog.db)\n# db_path = \"/absolute/path/to/catalog.db\"\ncollection = \"{}\"\n\n[ui]\n# One of 5, 10, 20\nrows_per_page = {}\ntoast_ms = {}\n\n[log]\n# trace, debug, info, warn or error\nlevel = \"{}\"\n# file = \"/absolute/path/to/catalog.log\"\n",
            path.display(),
            PRODUCTS_COLLECTION,
            DEFAULT_ROWS_PER_PAGE,
            DEFAULT_TOAST_MS,
            DEFAULT_LOG_LEVEL,
        )
    }
}

fn parse_level(raw: &str) -> Result<Level> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" | "warning" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => bail!("invalid log level {raw:?}; use one of: trace, debug, info, warn, error"),
    }
}
