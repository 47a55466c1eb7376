use std::time::Duration;

use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions},
    PgPool, Postgres, Transaction,
};

use crate::config;

pub mod table;

/// PostgreSQL 連線池封裝。
///
/// 連線池採 lazy 連線且不保留最小連線數，每小時一次的擷取只在寫入時借用連線，
/// 閒置超過 10 分鐘即關閉，不會在兩次排程之間長期佔用資料庫連線。
pub struct PostgresSQL {
    pool: PgPool,
}

impl PostgresSQL {
    /// 依設定建立連線池，此時尚未真正連線。
    pub fn new(settings: &config::PostgreSQL) -> Self {
        let options = PgConnectOptions::new()
            .host(&settings.host)
            .port(settings.port)
            .username(&settings.user)
            .password(&settings.password)
            .database(&settings.db)
            .application_name(env!("CARGO_PKG_NAME"));

        let pool = PgPoolOptions::new()
            .max_lifetime(Some(Duration::from_secs(1800))) // 30 分鐘
            .max_connections(2)
            .min_connections(0)
            .acquire_timeout(Duration::from_secs(5))
            .idle_timeout(Some(Duration::from_secs(600))) // 10 分鐘
            .connect_lazy_with(options);

        Self { pool }
    }

    /// 取得連線池參考。
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// 從連線池借用一條連線並開始 transaction。
    ///
    /// 回傳的 transaction 在未 commit 的情況下被 drop 時會自動 rollback，
    /// 連線也會歸還連線池，因此任何提早返回的路徑都不會遺留連線。
    ///
    /// # Errors
    /// 取得連線或 `BEGIN` 失敗時回傳錯誤。
    pub async fn tx(&self) -> Result<Transaction<'_, Postgres>, sqlx::Error> {
        self.pool.begin().await
    }
}
