use async_trait::async_trait;

use crate::{crawler::alpha_vantage::intraday::IntradaySeries, error::IngestError};

/// Alpha Vantage 行情 API
pub mod alpha_vantage;

/// 盤中時間序列的資料來源
#[async_trait]
pub trait IntradaySource: Send + Sync {
    /// 取得指定股票最新一頁的 60 分鐘時間序列。
    ///
    /// 網路或 HTTP 狀態錯誤回傳 [`IngestError::Upstream`]，
    /// 回應內容無法解碼回傳 [`IngestError::Parse`]。
    async fn fetch_intraday(&self, stock_symbol: &str) -> Result<IntradaySeries, IngestError>;
}
