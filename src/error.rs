use strum::Display;
use thiserror::Error;

/// 單次擷取流程中可能發生的錯誤。
///
/// 每一種錯誤都對應流程中的一個步驟，方便在 log 中直接判斷是哪個環節出了問題。
#[derive(Debug, Error)]
pub enum IngestError {
    /// 呼叫行情 API 失敗（網路錯誤或非 2xx 狀態碼）。
    #[error("upstream request failed: {0}")]
    Upstream(String),
    /// 回應內容無法解析，或欄位值格式錯誤。
    #[error("failed to parse intraday response: {0}")]
    Parse(String),
    /// 資料庫連線、建表、寫入或 commit 失敗。
    #[error("failed to persist intraday quote: {0}")]
    Store(#[from] sqlx::Error),
}

/// [`IngestError`] 的種類，不帶細節，供排程與測試判斷結果用。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ErrorKind {
    Upstream,
    Parse,
    Store,
}

impl IngestError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            IngestError::Upstream(_) => ErrorKind::Upstream,
            IngestError::Parse(_) => ErrorKind::Parse,
            IngestError::Store(_) => ErrorKind::Store,
        }
    }
}

/// 啟動時讀取設定檔失敗的原因。
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),
    #[error("invalid value {value:?} for setting {key}")]
    Invalid { key: &'static str, value: String },
    #[error("failed to load config file: {0}")]
    Load(#[from] config::ConfigError),
}
