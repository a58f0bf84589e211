use console::Term;
use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::task::JoinHandle;

const TICK: Duration = Duration::from_millis(500);

/// Best-effort `done/total` status line for a running batch.
///
/// The ticker only reads the shared counter; it never holds up the batch.
/// Dropping the reporter stops the ticker.
pub struct ProgressReporter {
    ticker: Option<JoinHandle<()>>,
    term: Term,
}

impl ProgressReporter {
    pub fn spawn(enabled: bool, done: Arc<AtomicUsize>, total: usize) -> Self {
        let term = Term::stderr();
        let ticker = enabled.then(|| {
            let term = term.clone();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(TICK);
                interval.tick().await;
                loop {
                    interval.tick().await;
                    let done = done.load(Ordering::Relaxed);
                    let _ = term.write_str(&format!("\r    {}/{} complete...", done, total));
                }
            })
        });
        Self { ticker, term }
    }

    pub fn finish(mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
            let _ = self.term.clear_line();
        }
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }
}

/// `HH:MM:SS`, hours not wrapped.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}
