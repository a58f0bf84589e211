pub mod aws;
pub mod azure;
pub mod gcp;

use crate::progress::format_elapsed;
use std::time::Instant;
use tracing::info;

pub(crate) struct Stopwatch(Instant);

impl Stopwatch {
    pub(crate) fn start() -> Self {
        Self(Instant::now())
    }

    pub(crate) fn stop(self) {
        info!("Elapsed time: {}", format_elapsed(self.0.elapsed()));
    }
}

pub(crate) fn with_suffix(names: &[String], suffix: &str) -> Vec<String> {
    names.iter().map(|n| format!("{n}.{suffix}")).collect()
}
