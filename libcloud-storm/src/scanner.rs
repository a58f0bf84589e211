use crate::{
    config::ScanConfig,
    dns::{DnsBatchResolver, DnsError, HickoryLookup, Lookup},
    http::{ReqwestTransport, Transport, TransportError},
    listing::list_bucket,
    prober::HttpProber,
    ratelimit::RateGovernor,
    report::FindingSink,
    types::{BatchSummary, ProbeResult, Redirects, Scheme},
};
use std::{collections::HashSet, ops::ControlFlow, sync::Arc};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error(transparent)]
    Dns(#[from] DnsError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Everything a provider check needs for one run: both batch engines, the
/// shared rate governor and the run's configuration.
pub struct Scanner<T = ReqwestTransport, L = HickoryLookup> {
    http: HttpProber<T>,
    dns: DnsBatchResolver<L>,
    governor: Arc<RateGovernor>,
    config: Arc<ScanConfig>,
}

impl Scanner {
    pub fn new(config: ScanConfig) -> Result<Self, ScanError> {
        let transport = ReqwestTransport::new(config.threads)?;
        let lookup = HickoryLookup::from_selection(&config.nameservers)?;
        Ok(Self::with_parts(config, transport, lookup))
    }
}

impl<T: Transport, L: Lookup> Scanner<T, L> {
    pub fn with_parts(config: ScanConfig, transport: T, lookup: L) -> Self {
        let governor = match config.rate_limit {
            Some(limit) => RateGovernor::new(limit.requests, limit.pause),
            None => RateGovernor::disabled(),
        }
        .with_rate_cap(config.requests_per_second);
        let governor = Arc::new(governor);

        let http = HttpProber::new(Arc::new(transport), Arc::clone(&governor))
            .with_progress(config.show_progress);
        let dns = DnsBatchResolver::new(Arc::new(lookup)).with_progress(config.show_progress);

        Self {
            http,
            dns,
            governor,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn governor(&self) -> &RateGovernor {
        &self.governor
    }

    pub fn transport(&self) -> &T {
        self.http.transport()
    }

    /// HTTP batch sized to the run's thread count.
    pub async fn probe<F>(
        &self,
        targets: &[String],
        scheme: Scheme,
        redirects: Redirects,
        classify: F,
    ) -> BatchSummary
    where
        F: FnMut(&ProbeResult) -> ControlFlow<()>,
    {
        let summary = self
            .http
            .probe_batch(targets, scheme, self.config.threads, redirects, classify)
            .await;
        debug!(?summary, "HTTP batch finished");
        summary
    }

    /// DNS batch sized to the run's thread count.
    pub async fn resolve<F>(&self, names: &[String], on_found: F) -> Result<HashSet<String>, DnsError>
    where
        F: FnMut(&str),
    {
        self.dns
            .resolve_batch(names, self.config.threads, on_found)
            .await
    }

    /// Resolve and return the names sorted, for stable follow-up batches.
    pub async fn resolve_sorted(&self, names: &[String]) -> Result<Vec<String>, DnsError> {
        let mut found: Vec<String> = self.resolve(names, |_| {}).await?.into_iter().collect();
        found.sort();
        Ok(found)
    }

    /// List each open bucket and hand the objects to the sink.
    pub async fn list_buckets(&self, buckets: &[String], sink: &dyn FindingSink) {
        for bucket in buckets {
            match list_bucket(self.transport(), bucket).await {
                Ok(files) => sink.listing(bucket, &files),
                Err(e) => debug!("Could not list {}: {}", bucket, e),
            }
        }
    }
}
