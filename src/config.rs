use std::{env, fmt, path::Path, str::FromStr};

use config::{Config as config_config, File as config_file};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const CONFIG_PATH: &str = "app.json";

const DEFAULT_ALPHA_VANTAGE_URL: &str = "https://www.alphavantage.co/query";
/// 每小時整點執行（秒 分 時 日 月 週）
const DEFAULT_CRON: &str = "0 0 * * * *";
const DEFAULT_RETRIES: usize = 2;
const DEFAULT_RETRY_DELAY_SECS: u64 = 300;

#[derive(Serialize, Deserialize, Default, Debug, Clone)]
pub struct App {
    #[serde(default)]
    pub alpha_vantage: AlphaVantage,
    #[serde(default)]
    pub postgresql: PostgreSQL,
    #[serde(default)]
    pub schedule: Schedule,
}

const ALPHAVANTAGE_API_KEY: &str = "ALPHAVANTAGE_API_KEY";
const ALPHAVANTAGE_URL: &str = "ALPHAVANTAGE_URL";
const STOCK_SYMBOL: &str = "STOCK_SYMBOL";

#[derive(Serialize, Deserialize, Clone)]
pub struct AlphaVantage {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(default = "default_alpha_vantage_url")]
    pub url: String,
}

impl Default for AlphaVantage {
    fn default() -> Self {
        AlphaVantage {
            api_key: String::new(),
            symbol: String::new(),
            url: default_alpha_vantage_url(),
        }
    }
}

impl fmt::Debug for AlphaVantage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlphaVantage")
            .field("api_key", &redact(&self.api_key))
            .field("symbol", &self.symbol)
            .field("url", &self.url)
            .finish()
    }
}

fn default_alpha_vantage_url() -> String {
    DEFAULT_ALPHA_VANTAGE_URL.to_string()
}

const POSTGRESQL_HOST: &str = "POSTGRESQL_HOST";
const POSTGRESQL_PORT: &str = "POSTGRESQL_PORT";
const POSTGRESQL_USER: &str = "POSTGRESQL_USER";
const POSTGRESQL_PASSWORD: &str = "POSTGRESQL_PASSWORD";
const POSTGRESQL_DB: &str = "POSTGRESQL_DB";

#[derive(Serialize, Deserialize, Clone)]
pub struct PostgreSQL {
    #[serde(default)]
    pub host: String,
    #[serde(default = "default_postgresql_port")]
    pub port: u16,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub db: String,
}

impl Default for PostgreSQL {
    fn default() -> Self {
        PostgreSQL {
            host: String::new(),
            port: default_postgresql_port(),
            user: String::new(),
            password: String::new(),
            db: String::new(),
        }
    }
}

impl fmt::Debug for PostgreSQL {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgreSQL")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &redact(&self.password))
            .field("db", &self.db)
            .finish()
    }
}

fn default_postgresql_port() -> u16 {
    5432
}

const SCHEDULE_CRON: &str = "SCHEDULE_CRON";
const SCHEDULE_RETRIES: &str = "SCHEDULE_RETRIES";
const SCHEDULE_RETRY_DELAY_SECS: &str = "SCHEDULE_RETRY_DELAY_SECS";
const SCHEDULE_RUN_ON_START: &str = "SCHEDULE_RUN_ON_START";

/// 排程設定
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Schedule {
    /// cron 表示式，UTC 時間
    #[serde(default = "default_cron")]
    pub cron: String,
    /// 失敗後最多再重試幾次
    #[serde(default = "default_retries")]
    pub retries: usize,
    /// 每次重試之間等待的秒數
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
    /// 啟動後是否立即執行一次
    #[serde(default)]
    pub run_on_start: bool,
}

impl Default for Schedule {
    fn default() -> Self {
        Schedule {
            cron: default_cron(),
            retries: default_retries(),
            retry_delay_secs: default_retry_delay_secs(),
            run_on_start: false,
        }
    }
}

fn default_cron() -> String {
    DEFAULT_CRON.to_string()
}

fn default_retries() -> usize {
    DEFAULT_RETRIES
}

fn default_retry_delay_secs() -> u64 {
    DEFAULT_RETRY_DELAY_SECS
}

impl App {
    /// 讀取 `app.json`(若存在)，再以環境變數覆蓋，最後檢查必填欄位。
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(CONFIG_PATH, |key| env::var(key).ok())
    }

    /// 同 [`App::load`]，但可指定設定檔路徑與環境變數的來源。
    pub fn load_from<F>(path: impl AsRef<Path>, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = path.as_ref();
        let app = if path.exists() {
            config_config::builder()
                .add_source(config_file::from(path))
                .build()?
                .try_deserialize::<App>()?
        } else {
            App::default()
        };

        let app = app.override_with(lookup)?;
        app.validate()?;

        Ok(app)
    }

    /// 將來自於 env 的設定值覆蓋掉 json 上的設定值
    fn override_with<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(api_key) = lookup(ALPHAVANTAGE_API_KEY) {
            self.alpha_vantage.api_key = api_key;
        }

        if let Some(symbol) = lookup(STOCK_SYMBOL) {
            self.alpha_vantage.symbol = symbol;
        }

        if let Some(url) = lookup(ALPHAVANTAGE_URL) {
            self.alpha_vantage.url = url;
        }

        if let Some(host) = lookup(POSTGRESQL_HOST) {
            self.postgresql.host = host;
        }

        if let Some(port) = lookup(POSTGRESQL_PORT) {
            self.postgresql.port = parse_value(POSTGRESQL_PORT, port)?;
        }

        if let Some(user) = lookup(POSTGRESQL_USER) {
            self.postgresql.user = user;
        }

        if let Some(password) = lookup(POSTGRESQL_PASSWORD) {
            self.postgresql.password = password;
        }

        if let Some(db) = lookup(POSTGRESQL_DB) {
            self.postgresql.db = db;
        }

        if let Some(cron) = lookup(SCHEDULE_CRON) {
            self.schedule.cron = cron;
        }

        if let Some(retries) = lookup(SCHEDULE_RETRIES) {
            self.schedule.retries = parse_value(SCHEDULE_RETRIES, retries)?;
        }

        if let Some(delay) = lookup(SCHEDULE_RETRY_DELAY_SECS) {
            self.schedule.retry_delay_secs = parse_value(SCHEDULE_RETRY_DELAY_SECS, delay)?;
        }

        if let Some(run_on_start) = lookup(SCHEDULE_RUN_ON_START) {
            self.schedule.run_on_start = parse_value(SCHEDULE_RUN_ON_START, run_on_start)?;
        }

        Ok(self)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            (ALPHAVANTAGE_API_KEY, &self.alpha_vantage.api_key),
            (STOCK_SYMBOL, &self.alpha_vantage.symbol),
            (ALPHAVANTAGE_URL, &self.alpha_vantage.url),
            (POSTGRESQL_HOST, &self.postgresql.host),
            (POSTGRESQL_USER, &self.postgresql.user),
            (POSTGRESQL_PASSWORD, &self.postgresql.password),
            (POSTGRESQL_DB, &self.postgresql.db),
            (SCHEDULE_CRON, &self.schedule.cron),
        ];

        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::Missing(key));
            }
        }

        if self.postgresql.port == 0 {
            return Err(ConfigError::Invalid {
                key: POSTGRESQL_PORT,
                value: self.postgresql.port.to_string(),
            });
        }

        Ok(())
    }
}

fn parse_value<T: FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| ConfigError::Invalid { key, value })
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        ""
    } else {
        "***"
    }
}
