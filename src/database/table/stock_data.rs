use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::{PgExecutor, Postgres, Transaction};

use crate::{
    database::PostgresSQL, error::IngestError, event::intraday_quote::SampleStore,
};

/// 盤中報價資料列（`stock_data`），以 `timestamp` 為唯一鍵。
#[derive(sqlx::FromRow, Debug, Clone, PartialEq)]
pub struct StockData {
    /// 報價時間（交易所當地時間，不含時區）。
    pub timestamp: NaiveDateTime,
    /// 開盤價。
    pub open: f64,
    /// 最高價。
    pub high: f64,
    /// 最低價。
    pub low: f64,
    /// 收盤價。
    pub close: f64,
    /// 成交量（股）。
    pub volume: i64,
}

impl StockData {
    pub fn new(
        timestamp: NaiveDateTime,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: i64,
    ) -> Self {
        StockData {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// 建立資料表（已存在時不做任何事）。
    pub async fn create_table(tx: &mut Transaction<'_, Postgres>) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
CREATE TABLE IF NOT EXISTS stock_data (
    "timestamp" TIMESTAMP PRIMARY KEY,
    "open" DOUBLE PRECISION,
    "high" DOUBLE PRECISION,
    "low" DOUBLE PRECISION,
    "close" DOUBLE PRECISION,
    "volume" BIGINT
);
"#,
        )
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// 寫入一筆報價（`timestamp` 衝突時忽略）。
    ///
    /// 回傳 `true` 表示新增了一筆資料，`false` 表示該時間點已存在。
    pub async fn insert(&self, tx: &mut Transaction<'_, Postgres>) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
INSERT INTO
    stock_data (
        "timestamp",
        "open",
        "high",
        "low",
        "close",
        "volume"
    )
VALUES
    (
        $1,
        $2,
        $3,
        $4,
        $5,
        $6
    )
ON CONFLICT
    ("timestamp")
DO NOTHING;
"#,
        )
        .bind(self.timestamp)
        .bind(self.open)
        .bind(self.high)
        .bind(self.low)
        .bind(self.close)
        .bind(self.volume)
        .execute(&mut **tx)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// 依時間點取得報價
    pub async fn fetch_by_timestamp<'e>(
        executor: impl PgExecutor<'e>,
        timestamp: NaiveDateTime,
    ) -> Result<Option<StockData>, sqlx::Error> {
        sqlx::query_as::<_, StockData>(
            r#"
SELECT "timestamp", "open", "high", "low", "close", "volume"
FROM stock_data
WHERE "timestamp" = $1
"#,
        )
        .bind(timestamp)
        .fetch_optional(executor)
        .await
    }
}

#[async_trait]
impl SampleStore for PostgresSQL {
    async fn persist(&self, data: &StockData) -> Result<bool, IngestError> {
        let mut tx = self.tx().await?;
        StockData::create_table(&mut tx).await?;
        let inserted = data.insert(&mut tx).await?;
        tx.commit().await?;

        Ok(inserted)
    }
}
