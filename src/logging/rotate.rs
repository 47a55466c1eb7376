use std::{
    fs::{self, File, OpenOptions},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
    time::UNIX_EPOCH,
};

use anyhow::{anyhow, Result};
use chrono::{DateTime, Local, TimeDelta};
use rayon::prelude::*;

use crate::logging;

/// 預設單檔最大大小：10 MB
const DEFAULT_MAX_SIZE: u64 = 10 * 1024 * 1024;
/// 預設保留天數：7 天
const DEFAULT_MAX_AGE_DAYS: i64 = 7;

/// 依日期與檔案大小切分的 log 檔寫入器。
///
/// 檔名由 `fn_pattern` 經 chrono 格式化而來，日期改變時開新檔；
/// 同一天內超過 `max_size` 則遞增世代編號，例如
/// `log/2025-02-03-app.log`、`log/2025-02-03-app.1.log`。
pub struct Rotate {
    fn_pattern: String,
    /// 目前日期對應的基礎檔名（不含世代編號）
    cur_base_fn: String,
    out: Option<BufWriter<File>>,
    /// 只增不減，不會覆寫同一天較早的檔案
    generation: u32,
    max_size: u64,
    current_size: u64,
    max_age: TimeDelta,
}

impl Rotate {
    pub fn new(fn_pattern: String) -> Self {
        Self::with_options(fn_pattern, DEFAULT_MAX_SIZE, DEFAULT_MAX_AGE_DAYS)
    }

    pub fn with_options(fn_pattern: String, max_size: u64, max_age_days: i64) -> Self {
        Rotate {
            fn_pattern,
            cur_base_fn: String::new(),
            out: None,
            generation: 0,
            max_size,
            current_size: 0,
            max_age: TimeDelta::try_days(max_age_days).unwrap_or(TimeDelta::days(7)),
        }
    }

    /// 寫入一段訊息，必要時先切換到新的日期檔或新的世代檔。
    pub fn write_msg(&mut self, now: DateTime<Local>, msg: &[u8]) -> Result<()> {
        let base_fn = now.format(&self.fn_pattern).to_string();

        if base_fn != self.cur_base_fn || self.out.is_none() {
            self.generation = 0;
            self.cur_base_fn = base_fn;
            self.open_file()?;
            self.cleanup_old_files(now);
        }

        if self.current_size > 0 && self.current_size + msg.len() as u64 > self.max_size {
            self.generation += 1;
            self.open_file()?;
        }

        let out = self
            .out
            .as_mut()
            .ok_or_else(|| anyhow!("log file {} is not open", self.cur_base_fn))?;
        out.write_all(msg)?;
        self.current_size += msg.len() as u64;

        Ok(())
    }

    pub fn flush(&mut self) {
        if let Some(out) = self.out.as_mut() {
            if let Err(why) = out.flush() {
                logging::error_console(format!("Failed to flush log file because {:?}", why));
            }
        }
    }

    fn current_fn(&self) -> String {
        generation_fn(&self.cur_base_fn, self.generation)
    }

    fn open_file(&mut self) -> Result<()> {
        self.flush();

        let filename = self.current_fn();
        if let Some(parent) = Path::new(&filename).parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&filename)?;

        self.current_size = file.metadata().map(|m| m.len()).unwrap_or(0);
        self.out = Some(BufWriter::with_capacity(4096, file));

        Ok(())
    }

    /// 刪除同目錄下修改時間早於保留期限的檔案
    fn cleanup_old_files(&self, now: DateTime<Local>) {
        let files = match files_in_directory(&self.current_fn()) {
            Ok(files) => files,
            Err(why) => {
                logging::error_console(format!(
                    "Failed to list files in log directory because {:?}",
                    why
                ));
                return;
            }
        };

        let cut_off = (now - self.max_age).timestamp().max(0) as u64;
        let expired: Vec<PathBuf> = files
            .into_iter()
            .filter(|file| {
                fs::metadata(file)
                    .and_then(|metadata| metadata.modified())
                    .ok()
                    .and_then(|modified| modified.duration_since(UNIX_EPOCH).ok())
                    .is_some_and(|modified| modified.as_secs() <= cut_off)
            })
            .collect();

        expired
            .par_iter()
            .with_min_len(num_cpus::get())
            .for_each(|file| {
                if let Err(why) = fs::remove_file(file) {
                    logging::error_console(format!(
                        "couldn't remove the file({}). because {:?}",
                        file.display(),
                        why
                    ));
                }
            });
    }
}

impl Drop for Rotate {
    fn drop(&mut self) {
        self.flush();
    }
}

/// generation = 0: "log/2025-02-03-app.log"
/// generation = 2: "log/2025-02-03-app.2.log"
fn generation_fn(base_fn: &str, generation: u32) -> String {
    if generation == 0 {
        return base_fn.to_string();
    }

    let path = Path::new(base_fn);
    let parent = path.parent().unwrap_or(Path::new(""));
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("log");
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("log");

    parent
        .join(format!("{}.{}.{}", stem, generation, ext))
        .to_string_lossy()
        .to_string()
}

fn files_in_directory(file_path: &str) -> Result<Vec<PathBuf>, io::Error> {
    let parent_dir = Path::new(file_path)
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "Parent directory not found"))?;

    let mut files = Vec::new();
    for entry in fs::read_dir(parent_dir)? {
        let path = entry?.path();
        if path.is_file() {
            files.push(path);
        }
    }

    Ok(files)
}
