//! 單元測試共用的假資料來源與記憶體資料表

use std::{
    collections::{BTreeMap, VecDeque},
    sync::Mutex,
};

use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::{
    crawler::{alpha_vantage::intraday::IntradaySeries, IntradaySource},
    database::table::stock_data::StockData,
    error::IngestError,
    event::intraday_quote::SampleStore,
};

/// 依序回傳預先排好的回應；用完後回傳 Upstream 錯誤。
pub struct FakeSource {
    responses: Mutex<VecDeque<Result<IntradaySeries, IngestError>>>,
    requested: Mutex<Vec<String>>,
}

impl FakeSource {
    pub fn new(responses: Vec<Result<IntradaySeries, IngestError>>) -> Self {
        FakeSource {
            responses: Mutex::new(responses.into()),
            requested: Mutex::new(Vec::new()),
        }
    }

    /// 以 JSON 內容建立，每個內容對應一次呼叫
    pub fn bodies(bodies: &[&str]) -> Self {
        Self::new(bodies.iter().map(|b| IntradaySeries::parse(b)).collect())
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl IntradaySource for FakeSource {
    async fn fetch_intraday(&self, stock_symbol: &str) -> Result<IntradaySeries, IngestError> {
        self.requested.lock().unwrap().push(stock_symbol.to_string());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(IngestError::Upstream("no more responses".to_string())))
    }
}

/// 以 `BTreeMap` 模擬 `stock_data`，鍵為 timestamp。
#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<BTreeMap<NaiveDateTime, StockData>>,
    persist_calls: Mutex<usize>,
    fail: bool,
}

impl MemoryStore {
    /// 每次寫入都回傳 Store 錯誤
    pub fn failing() -> Self {
        MemoryStore {
            fail: true,
            ..Default::default()
        }
    }

    pub fn rows(&self) -> Vec<StockData> {
        self.rows.lock().unwrap().values().cloned().collect()
    }

    pub fn persist_calls(&self) -> usize {
        *self.persist_calls.lock().unwrap()
    }
}

#[async_trait]
impl SampleStore for MemoryStore {
    async fn persist(&self, data: &StockData) -> Result<bool, IngestError> {
        *self.persist_calls.lock().unwrap() += 1;

        if self.fail {
            return Err(IngestError::Store(sqlx::Error::PoolTimedOut));
        }

        let mut rows = self.rows.lock().unwrap();
        if rows.contains_key(&data.timestamp) {
            return Ok(false);
        }

        rows.insert(data.timestamp, data.clone());
        Ok(true)
    }
}
