//! # Alpha Vantage 行情模組
//!
//! 透過 `query` 端點取得美股盤中時間序列。
//!
//! - 來源域名：`www.alphavantage.co`
//! - 回應格式：JSON，時間序列以 `YYYY-MM-DD HH:MM:SS` 為鍵。

use crate::config;

/// 盤中時間序列 (`TIME_SERIES_INTRADAY`)
pub mod intraday;

/// Alpha Vantage 採集器
pub struct AlphaVantage {
    /// 查詢端點，例如 `https://www.alphavantage.co/query`
    url: String,
    api_key: String,
}

impl AlphaVantage {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        AlphaVantage {
            url: url.into(),
            api_key: api_key.into(),
        }
    }

    pub fn from_settings(settings: &config::AlphaVantage) -> Self {
        Self::new(&settings.url, &settings.api_key)
    }
}
