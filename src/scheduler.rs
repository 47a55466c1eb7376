use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use anyhow::Result;
use tokio::{sync::Mutex, task};
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_retry::{strategy::FixedInterval, Retry};

use crate::{
    config,
    event::intraday_quote::{Ingestor, RunOutcome},
    logging,
};

/// 擷取失敗時的重試策略：固定間隔、有限次數
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct RetryPolicy {
    pub retries: usize,
    pub delay: Duration,
}

impl From<&config::Schedule> for RetryPolicy {
    fn from(schedule: &config::Schedule) -> Self {
        RetryPolicy {
            retries: schedule.retries,
            delay: Duration::from_secs(schedule.retry_delay_secs),
        }
    }
}

/// 啟動排程
pub async fn start(
    sched: &JobScheduler,
    ingestor: Arc<Ingestor>,
    schedule: &config::Schedule,
) -> Result<()> {
    let policy = RetryPolicy::from(schedule);
    // 同一時間只允許一個擷取流程（含重試）在執行
    let running = Arc::new(Mutex::new(()));

    let job = create_job(&schedule.cron, ingestor.clone(), policy, running.clone())?;
    sched.add(job).await?;

    if schedule.run_on_start {
        task::spawn(async move {
            run_exclusive(&running, &ingestor, policy).await;
        });
    }

    sched.start().await?;

    Ok(())
}

fn create_job(
    cron_expr: &str,
    ingestor: Arc<Ingestor>,
    policy: RetryPolicy,
    running: Arc<Mutex<()>>,
) -> Result<Job> {
    Ok(Job::new_async(cron_expr, move |_uuid, _l| {
        let ingestor = ingestor.clone();
        let running = running.clone();

        Box::pin(async move {
            run_exclusive(&running, &ingestor, policy).await;
        })
    })?)
}

/// 同一時間只允許一個擷取流程（含重試）。
///
/// 前一次仍在執行時寫入警告並略過，回傳 `None`。
pub async fn run_exclusive(
    running: &Mutex<()>,
    ingestor: &Ingestor,
    policy: RetryPolicy,
) -> Option<RunOutcome> {
    let Ok(_guard) = running.try_lock() else {
        logging::warn_file_async(format!(
            "Skip task because the previous run of {} is still in progress",
            ingestor.stock_symbol()
        ));
        return None;
    };

    Some(run_with_retry(ingestor, policy).await)
}

/// 執行擷取，結果為 [`RunOutcome::Failed`] 時依策略重試。
///
/// 沒有資料或寫入成功（含重複）都不重試。回傳最後一次的結果。
pub async fn run_with_retry(ingestor: &Ingestor, policy: RetryPolicy) -> RunOutcome {
    let counter = AtomicUsize::new(0);
    let attempt = &counter;
    let strategy = FixedInterval::new(policy.delay).take(policy.retries);

    let result = Retry::spawn(strategy, move || async move {
        let n = attempt.fetch_add(1, Ordering::Relaxed);
        if n > 0 {
            logging::warn_file_async(format!(
                "Retry {}/{} of {}",
                n,
                policy.retries,
                ingestor.stock_symbol()
            ));
        }

        let outcome = ingestor.run().await;
        if outcome.is_failure() {
            Err(outcome)
        } else {
            Ok(outcome)
        }
    })
    .await;

    match result {
        Ok(outcome) => outcome,
        Err(outcome) => {
            logging::error_file_async(format!(
                "Giving up on {} after {} attempts: {:?}",
                ingestor.stock_symbol(),
                counter.load(Ordering::Relaxed),
                outcome
            ));
            outcome
        }
    }
}
