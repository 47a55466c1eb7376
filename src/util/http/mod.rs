use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use once_cell::sync::{Lazy, OnceCell};
use reqwest::{header, Client, Method, Response, Url};

use crate::logging::Logger;

/// 錯誤訊息中保留的回應內容長度上限
const BODY_EXCERPT_LEN: usize = 256;

/// A singleton instance of the reqwest client.
static CLIENT: OnceCell<Client> = OnceCell::new();

static LOGGER: Lazy<Logger> = Lazy::new(|| Logger::new("http"));

/// Returns the reqwest client singleton instance or creates one if it doesn't exist.
fn get_client() -> Result<&'static Client> {
    CLIENT.get_or_try_init(|| {
        // reqwest 使用 rustls-no-provider，需要先安裝 ring；已安裝過時回傳 Err，忽略即可
        let _ = rustls::crypto::ring::default_provider().install_default();

        Client::builder()
            .gzip(true)
            // ===== 超時設置 =====
            .connect_timeout(Duration::from_secs(8))
            .timeout(Duration::from_secs(15))
            // ===== TCP 優化 =====
            .tcp_nodelay(true)
            .tcp_keepalive(Duration::from_secs(60))
            // ===== 連接池 =====
            .pool_max_idle_per_host(2)
            .pool_idle_timeout(Duration::from_secs(90))
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .build()
            .map_err(|e| anyhow!("Failed to create reqwest client: {:?}", e))
    })
}

/// Performs an HTTP GET request and returns the response as text.
///
/// # Errors
///
/// Returns an error when the request cannot be sent, when the server answers
/// with a non-2xx status (the status and an excerpt of the body are included),
/// or when the body cannot be read.
pub async fn get(url: &str, headers: Option<header::HeaderMap>) -> Result<String> {
    let response = send(Method::GET, url, headers).await?;
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| {
            anyhow!(
                "Error reading response body from {}: {:?}",
                redact(url),
                e.without_url()
            )
        })?;

    if !status.is_success() {
        return Err(anyhow!(
            "{} answered with HTTP {}: {}",
            redact(url),
            status,
            excerpt(&text)
        ));
    }

    Ok(text)
}

/// Sends an HTTP request once; retries are left to the caller's schedule.
async fn send(
    method: Method,
    url: &str,
    headers: Option<header::HeaderMap>,
) -> Result<Response> {
    let visit_log = format!("{}:{}", method, redact(url));
    let client = get_client()?;
    let mut rb = client.request(method, url);

    if let Some(h) = headers {
        rb = rb.headers(h);
    }

    let start = Instant::now();
    let res = rb.send().await;
    let elapsed = start.elapsed().as_millis();

    match res {
        Ok(response) => {
            LOGGER.info(format!(
                "{} {} {} ms",
                visit_log,
                response.status().as_u16(),
                elapsed
            ));
            Ok(response)
        }
        Err(why) => {
            let why = why.without_url();
            LOGGER.error(format!(
                "{} failed because {:?}. {} ms",
                visit_log, why, elapsed
            ));
            Err(anyhow!("Failed to send request to {} because {}", redact(url), why))
        }
    }
}

/// 移除 query string，避免 API key 之類的參數寫進 log
fn redact(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut u) => {
            u.set_query(None);
            u.to_string()
        }
        Err(_) => url.split('?').next().unwrap_or_default().to_string(),
    }
}

fn excerpt(text: &str) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(BODY_EXCERPT_LEN) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}
