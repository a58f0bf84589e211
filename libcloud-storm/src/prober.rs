use crate::{
    http::Transport,
    progress::ProgressReporter,
    ratelimit::RateGovernor,
    types::{BatchSummary, ProbeResult, Redirects, Scheme},
    validate::valid_candidates,
};
use std::{
    ops::ControlFlow,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
};
use tokio::{
    sync::{mpsc, Mutex},
    task::JoinSet,
};
use tracing::{debug, warn};

/// Concurrent HTTP prober: feeder, fixed worker pool, classifier loop.
pub struct HttpProber<T> {
    transport: Arc<T>,
    governor: Arc<RateGovernor>,
    show_progress: bool,
}

#[derive(Default)]
struct Counters {
    done: Arc<AtomicUsize>,
    dispatched: AtomicUsize,
    failed: AtomicUsize,
}

impl<T: Transport> HttpProber<T> {
    pub fn new(transport: Arc<T>, governor: Arc<RateGovernor>) -> Self {
        Self {
            transport,
            governor,
            show_progress: false,
        }
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// GET every valid target and hand each response to `classify`.
    ///
    /// Targets carry no scheme; `scheme` is prepended. Transport failures are
    /// logged and never reach the classifier. Once `classify` breaks, no new
    /// request is dispatched, queued targets are drained and requests already
    /// in flight still complete and are delivered.
    pub async fn probe_batch<F>(
        &self,
        targets: &[String],
        scheme: Scheme,
        workers: usize,
        redirects: Redirects,
        mut classify: F,
    ) -> BatchSummary
    where
        F: FnMut(&ProbeResult) -> ControlFlow<()>,
    {
        let valid = valid_candidates(targets);
        let total = valid.len();
        if total == 0 {
            return BatchSummary::default();
        }

        let workers = workers.max(1);
        let (jobs_tx, jobs_rx) = mpsc::channel::<String>(workers * 2);
        let (results_tx, mut results_rx) = mpsc::channel::<ProbeResult>(workers * 2);
        let jobs_rx = Arc::new(Mutex::new(jobs_rx));
        let aborted = Arc::new(AtomicBool::new(false));
        let counters = Arc::new(Counters::default());

        let mut pool = JoinSet::new();
        for _ in 0..workers {
            let jobs_rx = Arc::clone(&jobs_rx);
            let results_tx = results_tx.clone();
            let aborted = Arc::clone(&aborted);
            let counters = Arc::clone(&counters);
            let transport = Arc::clone(&self.transport);
            let governor = Arc::clone(&self.governor);

            pool.spawn(async move {
                loop {
                    let next = jobs_rx.lock().await.recv().await;
                    let Some(target) = next else { break };

                    if aborted.load(Ordering::Acquire) {
                        counters.done.fetch_add(1, Ordering::Relaxed);
                        continue;
                    }

                    // A breakout may land while a pause is in progress; only
                    // requests that are actually sent count against the governor.
                    governor.wait_while_paused().await;
                    if aborted.load(Ordering::Acquire) {
                        counters.done.fetch_add(1, Ordering::Relaxed);
                        continue;
                    }
                    governor.admit().await;

                    let url = format!("{}{}", scheme.prefix(), target);
                    counters.dispatched.fetch_add(1, Ordering::Relaxed);
                    match transport.fetch(&url, redirects).await {
                        Ok(result) => {
                            if results_tx.send(result).await.is_err() {
                                counters.done.fetch_add(1, Ordering::Relaxed);
                                break;
                            }
                        }
                        Err(e) => {
                            counters.failed.fetch_add(1, Ordering::Relaxed);
                            warn!("Connection error on {}: {}", target, e);
                        }
                    }
                    counters.done.fetch_add(1, Ordering::Relaxed);
                }
            });
        }
        drop(results_tx);

        let feeder = {
            let aborted = Arc::clone(&aborted);
            tokio::spawn(async move {
                for target in valid {
                    if aborted.load(Ordering::Acquire) {
                        break;
                    }
                    if jobs_tx.send(target).await.is_err() {
                        break;
                    }
                }
            })
        };

        let closer = tokio::spawn(async move {
            while let Some(joined) = pool.join_next().await {
                if let Err(e) = joined {
                    warn!("HTTP worker exited abnormally: {}", e);
                }
            }
        });

        let progress = ProgressReporter::spawn(
            self.show_progress,
            Arc::clone(&counters.done),
            total,
        );

        let mut delivered = 0;
        while let Some(result) = results_rx.recv().await {
            delivered += 1;
            if classify(&result).is_break() && !aborted.swap(true, Ordering::AcqRel) {
                debug!("classifier broke out after {} results", delivered);
            }
        }

        if let Err(e) = feeder.await {
            warn!("HTTP feeder exited abnormally: {}", e);
        }
        if let Err(e) = closer.await {
            warn!("HTTP pool closer exited abnormally: {}", e);
        }
        progress.finish();

        BatchSummary {
            total,
            dispatched: counters.dispatched.load(Ordering::Relaxed),
            delivered,
            failed: counters.failed.load(Ordering::Relaxed),
            aborted: aborted.load(Ordering::Acquire),
        }
    }
}
