use std::{fmt::Write as _, thread};

use chrono::{DateTime, Local};
use once_cell::sync::Lazy;
use strum::Display;
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};

use crate::logging::rotate::Rotate;

pub mod rotate;

/// 批次寫入的緩衝大小
const BATCH_SIZE: usize = 4096;

static LOGGER: Lazy<Logger> = Lazy::new(|| Logger::new("default"));

/// 測試時保留每一筆送出的訊息，供斷言 log 等級
#[cfg(test)]
static CAPTURED: Lazy<std::sync::Mutex<Vec<(Level, String)>>> = Lazy::new(Default::default);

/// 取得內容包含 `needle` 的已送出訊息
#[cfg(test)]
pub(crate) fn captured(needle: &str) -> Vec<(Level, String)> {
    CAPTURED
        .lock()
        .map(|captured| {
            captured
                .iter()
                .filter(|(_, msg)| msg.contains(needle))
                .cloned()
                .collect()
        })
        .unwrap_or_default()
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Display)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

pub struct LogMessage {
    pub level: Level,
    pub msg: String,
    pub created_at: DateTime<Local>,
}

impl LogMessage {
    pub fn new(level: Level, msg: String) -> Self {
        LogMessage {
            level,
            msg,
            created_at: Local::now(),
        }
    }

    fn write_line(&self, line: &mut String) -> std::fmt::Result {
        writeln!(
            line,
            "{} {} {}",
            self.created_at.format("%F %X%.6f"),
            self.level,
            self.msg
        )
    }
}

/// 非同步檔案 logger。
///
/// 呼叫端只負責把訊息丟進 channel，實際寫檔交給專屬線程，
/// 由 [`Rotate`] 處理依日期、大小分檔與過期清理。
pub struct Logger {
    writer: UnboundedSender<LogMessage>,
}

impl Logger {
    pub fn new(log_name: &str) -> Self {
        let (tx, mut rx) = unbounded_channel::<LogMessage>();
        let pattern = format!("log/%Y-%m-%d-{}.log", log_name);

        // 寫入檔案的操作使用另一個線程處理
        thread::spawn(move || {
            let mut rotate = Rotate::new(pattern);
            let mut line = String::with_capacity(BATCH_SIZE);

            while let Some(received) = rx.blocking_recv() {
                if received.write_line(&mut line).is_err() {
                    continue;
                }

                if rx.is_empty() || line.len() >= BATCH_SIZE {
                    if let Err(why) = rotate.write_msg(received.created_at, line.as_bytes()) {
                        error_console(format!(
                            "Failed to write to log file because {:?}\r\n{}",
                            why, line
                        ));
                    }

                    rotate.flush();
                    line.clear();
                }
            }
        });

        Logger { writer: tx }
    }

    pub fn debug(&self, log: impl Into<String>) {
        self.send(Level::Debug, log.into());
    }

    pub fn info(&self, log: impl Into<String>) {
        self.send(Level::Info, log.into());
    }

    pub fn warn(&self, log: impl Into<String>) {
        self.send(Level::Warn, log.into());
    }

    pub fn error(&self, log: impl Into<String>) {
        self.send(Level::Error, log.into());
    }

    fn send(&self, level: Level, msg: String) {
        #[cfg(test)]
        if let Ok(mut captured) = CAPTURED.lock() {
            captured.push((level, msg.clone()));
        }

        if let Err(why) = self.writer.send(LogMessage::new(level, msg)) {
            error_console(why.to_string());
        }
    }
}

pub fn debug_file_async(log: impl Into<String>) {
    LOGGER.debug(log);
}

pub fn info_file_async(log: impl Into<String>) {
    LOGGER.info(log);
}

pub fn warn_file_async(log: impl Into<String>) {
    LOGGER.warn(log);
}

pub fn error_file_async(log: impl Into<String>) {
    LOGGER.error(log);
}

pub fn info_console(log: String) {
    println!(
        "{} Info {}",
        Local::now().format("%Y-%m-%d %H:%M:%S.%3f"),
        log
    );
}

pub fn error_console(log: String) {
    eprintln!(
        "{} Error {}",
        Local::now().format("%Y-%m-%d %H:%M:%S.%3f"),
        log
    );
}
