use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use scopeguard::defer;

use crate::{
    crawler::IntradaySource,
    database::table::stock_data::StockData,
    error::{ErrorKind, IngestError},
    logging,
};

/// 報價的持久化目標
#[async_trait]
pub trait SampleStore: Send + Sync {
    /// 建立資料表（若不存在）並寫入一筆報價，同一時間點已存在時不做任何事。
    ///
    /// 回傳 `true` 表示新增了一筆資料。
    async fn persist(&self, data: &StockData) -> Result<bool, IngestError>;
}

/// 單次擷取的結果
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RunOutcome {
    /// 寫入了新的時間點
    Inserted(NaiveDateTime),
    /// 該時間點已存在，未變更資料表
    Duplicate(NaiveDateTime),
    /// API 回應中沒有時間序列
    NoData,
    Failed(ErrorKind),
}

impl RunOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, RunOutcome::Failed(_))
    }
}

/// 擷取指定股票最新一筆 60 分鐘報價並寫入資料庫。
pub struct Ingestor {
    stock_symbol: String,
    source: Arc<dyn IntradaySource>,
    store: Arc<dyn SampleStore>,
}

impl Ingestor {
    pub fn new(
        stock_symbol: impl Into<String>,
        source: Arc<dyn IntradaySource>,
        store: Arc<dyn SampleStore>,
    ) -> Self {
        Ingestor {
            stock_symbol: stock_symbol.into(),
            source,
            store,
        }
    }

    pub fn stock_symbol(&self) -> &str {
        &self.stock_symbol
    }

    /// 執行一次擷取。
    ///
    /// 任何步驟的錯誤都只寫入 log，不會往外傳遞；
    /// 回傳值讓排程得知這次是否需要重試。
    pub async fn run(&self) -> RunOutcome {
        logging::info_file_async(format!("擷取 {} 盤中報價開始", self.stock_symbol));
        defer! {
            logging::info_file_async(format!("擷取 {} 盤中報價結束", self.stock_symbol));
        }

        match self.ingest().await {
            Ok(outcome) => outcome,
            Err(why) => {
                logging::error_file_async(format!(
                    "Failed to ingest the intraday quote of {} because {}",
                    self.stock_symbol, why
                ));
                RunOutcome::Failed(why.kind())
            }
        }
    }

    async fn ingest(&self) -> Result<RunOutcome, IngestError> {
        let series = self.source.fetch_intraday(&self.stock_symbol).await?;

        let data = match series.latest_stock_data() {
            Some(data) => data?,
            None => {
                let notice = series
                    .notice()
                    .map(|n| format!(": {}", n))
                    .unwrap_or_default();
                logging::warn_file_async(format!(
                    "No time series data found for {}{}",
                    self.stock_symbol, notice
                ));
                return Ok(RunOutcome::NoData);
            }
        };

        if self.store.persist(&data).await? {
            logging::info_file_async(format!(
                "Inserted data for {} at {}",
                self.stock_symbol, data.timestamp
            ));
            Ok(RunOutcome::Inserted(data.timestamp))
        } else {
            logging::info_file_async(format!(
                "Data for {} at {} already exists",
                self.stock_symbol, data.timestamp
            ));
            Ok(RunOutcome::Duplicate(data.timestamp))
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::{
        logging::{self, Level},
        testing::{FakeSource, MemoryStore},
    };

    const TWO_POINTS: &str = r#"{"Time Series (60min)": {
        "2023-06-01 14:00:00": {"1. open":"10.0","2. high":"11.0","3. low":"9.5","4. close":"10.5","5. volume":"1000"},
        "2023-06-01 13:00:00": {"1. open":"9.0","2. high":"10.0","3. low":"8.5","4. close":"9.5","5. volume":"900"}
    }}"#;

    fn at(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 6, 1)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn ingestor(source: &Arc<FakeSource>, store: &Arc<MemoryStore>) -> Ingestor {
        Ingestor::new("IBM", source.clone(), store.clone())
    }

    #[tokio::test]
    async fn test_stores_only_latest_point() {
        let source = Arc::new(FakeSource::bodies(&[TWO_POINTS]));
        let store = Arc::new(MemoryStore::default());

        let outcome = ingestor(&source, &store).run().await;

        assert_eq!(outcome, RunOutcome::Inserted(at(14)));
        assert_eq!(
            store.rows(),
            vec![StockData::new(at(14), 10.0, 11.0, 9.5, 10.5, 1000)]
        );
        assert_eq!(source.requested(), vec!["IBM".to_string()]);
    }

    #[tokio::test]
    async fn test_second_run_is_duplicate() {
        let source = Arc::new(FakeSource::bodies(&[TWO_POINTS, TWO_POINTS]));
        let store = Arc::new(MemoryStore::default());
        let ingestor = ingestor(&source, &store);

        assert_eq!(ingestor.run().await, RunOutcome::Inserted(at(14)));
        assert_eq!(ingestor.run().await, RunOutcome::Duplicate(at(14)));
        assert_eq!(store.rows().len(), 1);
        assert_eq!(store.persist_calls(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_keeps_first_values() {
        let newer_values = r#"{"Time Series (60min)": {
            "2023-06-01 14:00:00": {"1. open":"99","2. high":"99","3. low":"99","4. close":"99","5. volume":"99"}
        }}"#;
        let source = Arc::new(FakeSource::bodies(&[TWO_POINTS, newer_values]));
        let store = Arc::new(MemoryStore::default());
        let ingestor = ingestor(&source, &store);

        ingestor.run().await;
        ingestor.run().await;

        assert_eq!(
            store.rows(),
            vec![StockData::new(at(14), 10.0, 11.0, 9.5, 10.5, 1000)]
        );
    }

    #[tokio::test]
    async fn test_empty_series_touches_nothing() {
        for body in [
            r#"{}"#,
            r#"{"Time Series (60min)": {}}"#,
            r#"{"Time Series (60min)": []}"#,
            r#"{"Note": "API call frequency exceeded"}"#,
        ] {
            let source = Arc::new(FakeSource::bodies(&[body]));
            let store = Arc::new(MemoryStore::default());

            assert_eq!(ingestor(&source, &store).run().await, RunOutcome::NoData);
            assert_eq!(store.persist_calls(), 0, "{}", body);
        }
    }

    /// 回傳 `symbol` 相關、等級為 `level` 的訊息
    fn logged(symbol: &str, level: Level) -> Vec<String> {
        logging::captured(symbol)
            .into_iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, msg)| msg)
            .collect()
    }

    #[tokio::test]
    async fn test_log_levels() {
        let source = Arc::new(FakeSource::bodies(&[r#"{"Note": "slow down"}"#]));
        let store = Arc::new(MemoryStore::default());
        Ingestor::new("LOG.NODATA", source, store).run().await;

        assert_eq!(
            logged("LOG.NODATA", Level::Warn),
            vec!["No time series data found for LOG.NODATA: slow down".to_string()]
        );
        assert!(logged("LOG.NODATA", Level::Error).is_empty());

        let source = Arc::new(FakeSource::new(vec![Err(IngestError::Upstream(
            "HTTP 500".to_string(),
        ))]));
        let store = Arc::new(MemoryStore::default());
        Ingestor::new("LOG.FAIL", source, store).run().await;

        let errors = logged("LOG.FAIL", Level::Error);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("Failed to ingest the intraday quote of LOG.FAIL"));
        assert!(errors[0].contains("HTTP 500"));
        assert!(logged("LOG.FAIL", Level::Warn).is_empty());

        let source = Arc::new(FakeSource::bodies(&[TWO_POINTS, TWO_POINTS]));
        let store = Arc::new(MemoryStore::default());
        let ingestor = Ingestor::new("LOG.OK", source, store);
        ingestor.run().await;
        ingestor.run().await;

        let infos = logged("LOG.OK", Level::Info);
        assert!(infos.contains(&"Inserted data for LOG.OK at 2023-06-01 14:00:00".to_string()));
        assert!(infos.contains(&"Data for LOG.OK at 2023-06-01 14:00:00 already exists".to_string()));
        assert!(logged("LOG.OK", Level::Error).is_empty());
    }

    #[tokio::test]
    async fn test_upstream_failure_touches_nothing() {
        let source = Arc::new(FakeSource::new(vec![Err(IngestError::Upstream(
            "HTTP 500".to_string(),
        ))]));
        let store = Arc::new(MemoryStore::default());

        let outcome = ingestor(&source, &store).run().await;

        assert_eq!(outcome, RunOutcome::Failed(ErrorKind::Upstream));
        assert_eq!(store.persist_calls(), 0);
    }

    #[tokio::test]
    async fn test_malformed_value_touches_nothing() {
        let body = r#"{"Time Series (60min)": {
            "2023-06-01 14:00:00": {"1. open":"ten","2. high":"11.0","3. low":"9.5","4. close":"10.5","5. volume":"1000"}
        }}"#;
        let source = Arc::new(FakeSource::bodies(&[body]));
        let store = Arc::new(MemoryStore::default());

        let outcome = ingestor(&source, &store).run().await;

        assert_eq!(outcome, RunOutcome::Failed(ErrorKind::Parse));
        assert_eq!(store.persist_calls(), 0);
    }

    #[tokio::test]
    async fn test_store_failure_is_reported() {
        let source = Arc::new(FakeSource::bodies(&[TWO_POINTS]));
        let store = Arc::new(MemoryStore::failing());

        let outcome = ingestor(&source, &store).run().await;

        assert_eq!(outcome, RunOutcome::Failed(ErrorKind::Store));
        assert!(store.rows().is_empty());
    }
}
