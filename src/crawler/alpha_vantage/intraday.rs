use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use concat_string::concat_string;
use serde::{de, Deserialize, Deserializer};
use serde_json::Value;

use crate::{
    crawler::{alpha_vantage::AlphaVantage, IntradaySource},
    database::table::stock_data::StockData,
    error::IngestError,
    util::{self, text},
};

const FUNCTION: &str = "TIME_SERIES_INTRADAY";
/// 取樣間隔固定為 60 分鐘
const INTERVAL: &str = "60min";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const OPEN: &str = "1. open";
const HIGH: &str = "2. high";
const LOW: &str = "3. low";
const CLOSE: &str = "4. close";
const VOLUME: &str = "5. volume";

/// `TIME_SERIES_INTRADAY` 的回應內容。
///
/// 時間序列以 `BTreeMap` 保存，鍵為固定補零的 `YYYY-MM-DD HH:MM:SS`，
/// 字典序即為時間順序，最後一個鍵就是最新的一筆。
/// 各筆資料只在被選中時才轉換，其他筆的欄位格式不影響本次擷取。
#[derive(Deserialize, Debug, Default)]
pub struct IntradaySeries {
    #[serde(
        rename = "Time Series (60min)",
        default,
        deserialize_with = "series_or_nothing"
    )]
    time_series: Option<BTreeMap<String, Value>>,
    /// 超過呼叫頻率時的提示
    #[serde(rename = "Note", default)]
    note: Option<String>,
    #[serde(rename = "Information", default)]
    information: Option<String>,
    /// 參數錯誤（例如 symbol 不存在、API key 無效）
    #[serde(rename = "Error Message", default)]
    error_message: Option<String>,
}

impl IntradaySeries {
    /// 解碼 API 回應的 JSON 內容。
    pub fn parse(body: &str) -> Result<Self, IngestError> {
        let value = serde_json::from_str::<Value>(body)
            .map_err(|why| IngestError::Parse(format!("invalid JSON body because {}", why)))?;

        if !value.is_object() {
            return Err(IngestError::Parse(format!(
                "expected a JSON object but got {}",
                value
            )));
        }

        IntradaySeries::deserialize(value)
            .map_err(|why| IngestError::Parse(format!("unexpected JSON body because {}", why)))
    }

    pub fn len(&self) -> usize {
        self.time_series.as_ref().map_or(0, BTreeMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 字典序最大（即最新）的時間點與其原始欄位
    pub fn latest(&self) -> Option<(&str, &Value)> {
        self.time_series
            .as_ref()?
            .iter()
            .next_back()
            .map(|(timestamp, point)| (timestamp.as_str(), point))
    }

    /// API 以 200 回應但附帶的錯誤或限流說明
    pub fn notice(&self) -> Option<&str> {
        self.error_message
            .as_deref()
            .or(self.note.as_deref())
            .or(self.information.as_deref())
    }

    /// 將最新一筆轉成 [`StockData`]；沒有資料時回傳 `None`。
    pub fn latest_stock_data(&self) -> Option<Result<StockData, IngestError>> {
        self.latest()
            .map(|(timestamp, point)| to_stock_data(timestamp, point))
    }
}

/// 時間序列為 `null`、`[]`、`""`、`0` 或 `false` 時視為沒有資料，
/// 非空的其他型別則是格式錯誤。
fn series_or_nothing<'de, D>(deserializer: D) -> Result<Option<BTreeMap<String, Value>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Object(map) => Ok(Some(map.into_iter().collect())),
        Value::Null | Value::Bool(false) => Ok(None),
        Value::Array(a) if a.is_empty() => Ok(None),
        Value::String(s) if s.is_empty() => Ok(None),
        Value::Number(n) if n.as_f64() == Some(0.0) => Ok(None),
        other => Err(de::Error::custom(format!(
            "expected a time series object but got {}",
            other
        ))),
    }
}

#[async_trait]
impl IntradaySource for AlphaVantage {
    async fn fetch_intraday(&self, stock_symbol: &str) -> Result<IntradaySeries, IngestError> {
        let url = concat_string!(
            &self.url,
            "?function=",
            FUNCTION,
            "&symbol=",
            urlencoding::encode(stock_symbol),
            "&interval=",
            INTERVAL,
            "&apikey=",
            urlencoding::encode(&self.api_key)
        );
        let body = util::http::get(&url, None)
            .await
            .map_err(|why| IngestError::Upstream(format!("{:#}", why)))?;

        IntradaySeries::parse(&body)
    }
}

/// 將單一時間點的原始欄位轉為資料列。
///
/// 價格接受字串或數字，成交量必須是非負整數。
fn to_stock_data(timestamp: &str, point: &Value) -> Result<StockData, IngestError> {
    let at = NaiveDateTime::parse_from_str(timestamp.trim(), TIMESTAMP_FORMAT).map_err(|why| {
        IngestError::Parse(format!("invalid timestamp '{}' because {}", timestamp, why))
    })?;

    Ok(StockData::new(
        at,
        price(point, timestamp, OPEN)?,
        price(point, timestamp, HIGH)?,
        price(point, timestamp, LOW)?,
        price(point, timestamp, CLOSE)?,
        volume(point, timestamp)?,
    ))
}

fn field<'a>(point: &'a Value, timestamp: &str, key: &str) -> Result<&'a Value, IngestError> {
    point
        .get(key)
        .ok_or_else(|| IngestError::Parse(format!("'{}' is missing at {}", key, timestamp)))
}

fn price(point: &Value, timestamp: &str, key: &str) -> Result<f64, IngestError> {
    let value = match field(point, timestamp, key)? {
        Value::String(s) => text::parse_f64(s).ok(),
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        _ => None,
    };

    value.ok_or_else(|| {
        IngestError::Parse(format!(
            "'{}' at {} is not a price: {}",
            key,
            timestamp,
            point[key]
        ))
    })
}

fn volume(point: &Value, timestamp: &str) -> Result<i64, IngestError> {
    let value = match field(point, timestamp, VOLUME)? {
        Value::String(s) => text::parse_i64(s).ok(),
        Value::Number(n) => n.as_i64(),
        _ => None,
    };

    value.filter(|v| *v >= 0).ok_or_else(|| {
        IngestError::Parse(format!(
            "'{}' at {} is not a share count: {}",
            VOLUME, timestamp, point[VOLUME]
        ))
    })
}
