use std::future::Future;
use std::time::Duration;

use chrono::{NaiveTime, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use integrations::{SmsLogSender, WebPushSender};

use crate::{BroadcastEngine, Dispatcher, RecurringMaterializer, ReportArchiver};

/// Cadences for the periodic jobs.
#[derive(Debug, Clone)]
pub struct JobIntervals {
    pub drain_outbox: Duration,
    pub process_broadcasts: Duration,
    pub materialize_recurring: Duration,
    /// Wall-clock UTC time for the daily archive run.
    pub archive_at: NaiveTime,
}

impl Default for JobIntervals {
    fn default() -> Self {
        Self {
            drain_outbox: Duration::from_secs(60),
            process_broadcasts: Duration::from_secs(30),
            materialize_recurring: Duration::from_secs(3600),
            archive_at: NaiveTime::from_hms_opt(2, 0, 0).unwrap(),
        }
    }
}

/// Spawn all periodic jobs. Each loop owns its component, runs ticks strictly
/// one at a time, and stops at the next tick boundary once `cancel` fires.
/// The caller awaits the returned handles to drain in-flight ticks.
pub fn spawn_jobs(
    dispatcher: Dispatcher<SmsLogSender, WebPushSender>,
    broadcasts: BroadcastEngine,
    materializer: RecurringMaterializer,
    archiver: ReportArchiver,
    intervals: JobIntervals,
    cancel: CancellationToken,
) -> Vec<JoinHandle<()>> {
    vec![
        tokio::spawn(drain_loop(dispatcher, intervals.drain_outbox, cancel.clone())),
        tokio::spawn(broadcast_loop(
            broadcasts,
            intervals.process_broadcasts,
            cancel.clone(),
        )),
        tokio::spawn(materialize_loop(
            materializer,
            intervals.materialize_recurring,
            cancel.clone(),
        )),
        tokio::spawn(archive_loop(archiver, intervals.archive_at, cancel)),
    ]
}

/// Run one tick on its own task so a panic inside the job is contained and
/// the loop stays scheduled.
async fn run_isolated<F>(name: &'static str, tick: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Err(e) = tokio::spawn(tick).await {
        if e.is_panic() {
            error!(job = name, "job tick panicked; job remains scheduled");
        }
    }
}

async fn drain_loop(
    dispatcher: Dispatcher<SmsLogSender, WebPushSender>,
    period: Duration,
    cancel: CancellationToken,
) {
    info!("outbox dispatcher job started");
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("outbox dispatcher job shutting down");
                return;
            }
            _ = tokio::time::sleep(period) => {}
        }

        let dispatcher = dispatcher.clone();
        run_isolated("drain-outbox", async move {
            dispatcher.drain().await;
        })
        .await;
    }
}

async fn broadcast_loop(engine: BroadcastEngine, period: Duration, cancel: CancellationToken) {
    info!("broadcast job started");
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("broadcast job shutting down");
                return;
            }
            _ = tokio::time::sleep(period) => {}
        }

        let engine = engine.clone();
        run_isolated("process-broadcasts", async move {
            if let Err(e) = engine.process_pending().await {
                error!(error = %e, "broadcast processing failed");
            }
        })
        .await;
    }
}

async fn materialize_loop(
    materializer: RecurringMaterializer,
    period: Duration,
    cancel: CancellationToken,
) {
    info!("recurring materializer job started");
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("recurring materializer job shutting down");
                return;
            }
            _ = tokio::time::sleep(period) => {}
        }

        let materializer = materializer.clone();
        run_isolated("materialize-recurring", async move {
            if let Err(e) = materializer.materialize(Utc::now()).await {
                error!(error = %e, "recurring materialization failed");
            }
        })
        .await;
    }
}

async fn archive_loop(archiver: ReportArchiver, at: NaiveTime, cancel: CancellationToken) {
    info!("report archiver job started");
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("report archiver job shutting down");
                return;
            }
            _ = tokio::time::sleep(until_next_utc(at)) => {}
        }

        let archiver = archiver.clone();
        run_isolated("archive-reports", async move {
            if let Err(e) = archiver.archive(Utc::now()).await {
                error!(error = %e, "report archival failed");
            }
        })
        .await;
    }
}

/// Duration until the next wall-clock occurrence of `time` in UTC.
fn until_next_utc(time: NaiveTime) -> Duration {
    let now = Utc::now();
    let today = now.date_naive().and_time(time).and_utc();
    let next = if today > now {
        today
    } else {
        today + chrono::Duration::days(1)
    };
    (next - now).to_std().unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use db::test_support;

    #[tokio::test]
    async fn test_run_isolated_contains_panics() {
        run_isolated("explodes", async {
            panic!("boom");
        })
        .await;
        // Reaching here is the assertion: the panic did not propagate
    }

    #[tokio::test]
    async fn test_jobs_shut_down_within_grace_period() {
        let pool = test_support::pool().await;
        let dir = tempfile::tempdir().unwrap();
        let sms = SmsLogSender::new(dir.path().join("outbox.log"));

        let dispatcher = Dispatcher::new(pool.clone(), sms, None::<WebPushSender>, 10, 3);
        let broadcasts = BroadcastEngine::new(pool.clone());
        let materializer = RecurringMaterializer::new(pool.clone(), 14);
        let archiver = ReportArchiver::new(pool.clone(), 365);

        let cancel = CancellationToken::new();
        let handles = spawn_jobs(
            dispatcher,
            broadcasts,
            materializer,
            archiver,
            JobIntervals::default(),
            cancel.clone(),
        );

        cancel.cancel();
        let all = async {
            for handle in handles {
                let _ = handle.await;
            }
        };
        tokio::time::timeout(Duration::from_secs(10), all)
            .await
            .expect("jobs drained within the grace period");
    }

    #[test]
    fn test_until_next_utc_is_within_a_day() {
        let d = until_next_utc(NaiveTime::from_hms_opt(2, 0, 0).unwrap());
        assert!(d <= Duration::from_secs(24 * 3600));
    }
}
