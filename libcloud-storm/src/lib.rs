//! Concurrent DNS and HTTP probing for exposed cloud assets.
//!
//! Candidates are narrowed with [`DnsBatchResolver`], turned into URLs and
//! handed to [`HttpProber`] together with a classifier. Both engines share
//! one [`RateGovernor`] per run through a [`Scanner`].

mod config;
mod dns;
mod http;
mod listing;
pub mod names;
mod prober;
mod progress;
pub mod providers;
mod ratelimit;
pub mod regions;
mod report;
mod scanner;
mod types;
mod validate;

pub use config::{
    parse_nameservers, read_nameservers, ConfigError, NameserverSelection, RateLimit, ScanConfig,
};
pub use dns::{
    dns_workers, resolve_one, DnsBatchResolver, DnsError, HickoryLookup, Lookup, LookupError,
    Resolution,
};
pub use http::{create_http_pool, ReqwestTransport, Transport, TransportError};
pub use listing::{extract_bucket_files, list_bucket};
pub use prober::HttpProber;
pub use progress::{format_elapsed, ProgressReporter};
pub use ratelimit::RateGovernor;
pub use report::{settle, DedupSink, FindingSink, MemorySink, Verdict};
pub use scanner::{ScanError, Scanner};
pub use types::{
    Access, BatchSummary, Finding, ProbeResult, Provider, Redirects, Scheme, BODY_LIMIT,
};
pub use validate::{is_valid_candidate, is_valid_ip};

/// Run every enabled provider's checks against `names`.
///
/// Stops at the first fatal resolver failure.
pub async fn run_checks<T: Transport, L: Lookup>(
    scanner: &Scanner<T, L>,
    names: &[String],
    enabled: &[Provider],
    sink: &dyn FindingSink,
) -> Result<(), ScanError> {
    for provider in enabled {
        match provider {
            Provider::Aws => providers::aws::run_all(scanner, names, sink).await?,
            Provider::Azure => providers::azure::run_all(scanner, names, sink).await?,
            Provider::Gcp => providers::gcp::run_all(scanner, names, sink).await,
        }
    }
    Ok(())
}
