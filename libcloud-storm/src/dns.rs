use crate::{
    config::NameserverSelection, progress::ProgressReporter, validate::valid_candidates,
};
use hickory_resolver::{
    config::{NameServerConfig, ResolverConfig, ResolverOpts},
    name_server::TokioConnectionProvider,
    proto::{op::ResponseCode, xfer::Protocol, ProtoErrorKind},
    system_conf::read_system_conf,
    ResolveError, ResolveErrorKind, Resolver, TokioResolver,
};
use std::{
    collections::HashSet,
    future::Future,
    net::{IpAddr, SocketAddr},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};
use thiserror::Error;
use tokio::{
    sync::{mpsc, Mutex},
    task::JoinSet,
};
use tracing::{debug, error, info, warn};

pub const SYSTEM_TIMEOUT: Duration = Duration::from_secs(5);
pub const CUSTOM_TIMEOUT: Duration = Duration::from_secs(3);
const MAX_WORKERS: usize = 500;
const WORKERS_PER_THREAD: usize = 10;
const ATTEMPTS: usize = 2;

#[derive(Debug, Error)]
pub enum DnsError {
    #[error("Failed to read system resolver configuration: {0}")]
    SystemConfig(String),
    #[error("No nameservers configured")]
    NoNameservers,
    #[error("Error querying nameservers while resolving {name}: {reason}")]
    NameserverFailure { name: String, reason: String },
}

/// Why a single lookup did not produce an answer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("name not found")]
    NotFound,
    #[error("lookup timed out")]
    Timeout,
    #[error("{0}")]
    Fatal(String),
}

/// The network seam of the DNS batch resolver.
pub trait Lookup: Send + Sync + 'static {
    fn lookup(&self, name: &str) -> impl Future<Output = Result<(), LookupError>> + Send;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found(String),
    NotFound,
    Fatal { name: String, reason: String },
}

/// hickory-backed lookups, either through the system configuration or
/// round-robin over explicit nameservers.
pub struct HickoryLookup {
    resolvers: Vec<TokioResolver>,
    next: AtomicUsize,
    timeout: Duration,
}

impl HickoryLookup {
    pub fn from_selection(selection: &NameserverSelection) -> Result<Self, DnsError> {
        match selection {
            NameserverSelection::System => Self::system(),
            NameserverSelection::Custom(servers) => Self::with_nameservers(servers),
        }
    }

    /// Ambient resolver settings: usually cached and proxy-aware.
    pub fn system() -> Result<Self, DnsError> {
        let (config, mut opts) =
            read_system_conf().map_err(|e| DnsError::SystemConfig(e.to_string()))?;
        opts.timeout = SYSTEM_TIMEOUT;
        opts.attempts = 1;

        let resolver = Resolver::builder_with_config(config, TokioConnectionProvider::default())
            .with_options(opts)
            .build();

        Ok(Self {
            resolvers: vec![resolver],
            next: AtomicUsize::new(0),
            timeout: SYSTEM_TIMEOUT,
        })
    }

    /// One UDP resolver per server; each query attempt goes to the next one.
    pub fn with_nameservers(servers: &[IpAddr]) -> Result<Self, DnsError> {
        let addrs: Vec<SocketAddr> = servers.iter().map(|ip| SocketAddr::new(*ip, 53)).collect();
        Self::with_nameserver_addrs(&addrs)
    }

    /// Like [`HickoryLookup::with_nameservers`] for servers on any port.
    pub fn with_nameserver_addrs(servers: &[SocketAddr]) -> Result<Self, DnsError> {
        if servers.is_empty() {
            return Err(DnsError::NoNameservers);
        }

        let resolvers = servers
            .iter()
            .map(|addr| {
                let mut config = ResolverConfig::new();
                config.add_name_server(NameServerConfig::new(*addr, Protocol::Udp));
                let mut opts = ResolverOpts::default();
                opts.timeout = CUSTOM_TIMEOUT;
                opts.attempts = 1;
                opts.cache_size = 0;

                Resolver::builder_with_config(config, TokioConnectionProvider::default())
                    .with_options(opts)
                    .build()
            })
            .collect();

        Ok(Self {
            resolvers,
            next: AtomicUsize::new(0),
            timeout: CUSTOM_TIMEOUT,
        })
    }

    fn pick(&self) -> &TokioResolver {
        let i = self.next.fetch_add(1, Ordering::Relaxed);
        &self.resolvers[i % self.resolvers.len()]
    }
}

impl Lookup for HickoryLookup {
    async fn lookup(&self, name: &str) -> Result<(), LookupError> {
        let resolver = self.pick();
        match tokio::time::timeout(self.timeout, resolver.lookup_ip(name)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(classify_error(&e)),
            Err(_) => Err(LookupError::Timeout),
        }
    }
}

/// hickory reports every negative answer as `NoRecordsFound`; only NXDOMAIN
/// and an empty NOERROR mean the name is absent. SERVFAIL, REFUSED and the
/// rest say the nameserver cannot be trusted.
fn classify_error(err: &ResolveError) -> LookupError {
    if let ResolveErrorKind::Proto(proto) = err.kind() {
        match proto.kind() {
            ProtoErrorKind::NoRecordsFound { response_code, .. } => {
                return match *response_code {
                    ResponseCode::NXDomain | ResponseCode::NoError => LookupError::NotFound,
                    code => LookupError::Fatal(format!("nameserver answered {}", code)),
                };
            }
            ProtoErrorKind::Timeout => return LookupError::Timeout,
            _ => {}
        }
    }
    LookupError::Fatal(err.to_string())
}

/// Found, not found (including a second timeout) or fatal.
pub async fn resolve_one<L: Lookup>(lookup: &L, name: &str) -> Resolution {
    for attempt in 1..=ATTEMPTS {
        match lookup.lookup(name).await {
            Ok(()) => return Resolution::Found(name.to_string()),
            Err(LookupError::NotFound) => return Resolution::NotFound,
            Err(LookupError::Timeout) => {
                debug!("DNS timeout on {} (attempt {})", name, attempt);
            }
            Err(LookupError::Fatal(reason)) => {
                return Resolution::Fatal {
                    name: name.to_string(),
                    reason,
                }
            }
        }
    }
    Resolution::NotFound
}

/// DNS is cheap, so the pool is ten times the HTTP one, capped.
pub fn dns_workers(threads: usize, names: usize) -> usize {
    (threads * WORKERS_PER_THREAD)
        .max(1)
        .min(MAX_WORKERS)
        .min(names)
}

pub struct DnsBatchResolver<L> {
    lookup: Arc<L>,
    show_progress: bool,
}

impl<L: Lookup> DnsBatchResolver<L> {
    pub fn new(lookup: Arc<L>) -> Self {
        Self {
            lookup,
            show_progress: false,
        }
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Resolve every valid name and return the ones that exist.
    ///
    /// `on_found` runs for each resolved name before it joins the set, in
    /// completion order. The first fatal outcome stops the batch: a broken
    /// nameserver would turn every later answer into a false negative.
    pub async fn resolve_batch<F>(
        &self,
        names: &[String],
        threads: usize,
        mut on_found: F,
    ) -> Result<HashSet<String>, DnsError>
    where
        F: FnMut(&str),
    {
        if names.is_empty() {
            return Ok(HashSet::new());
        }
        info!("Brute-forcing a list of {} possible DNS names", names.len());

        let valid = valid_candidates(names);
        let total = valid.len();
        if total == 0 {
            return Ok(HashSet::new());
        }

        let workers = dns_workers(threads, total);
        let (jobs_tx, jobs_rx) = mpsc::channel::<String>(workers * 2);
        let (results_tx, mut results_rx) = mpsc::channel::<Resolution>(workers * 2);
        let jobs_rx = Arc::new(Mutex::new(jobs_rx));
        let done = Arc::new(AtomicUsize::new(0));

        let mut pool = JoinSet::new();
        for _ in 0..workers {
            let jobs_rx = Arc::clone(&jobs_rx);
            let results_tx = results_tx.clone();
            let lookup = Arc::clone(&self.lookup);
            let done = Arc::clone(&done);

            pool.spawn(async move {
                loop {
                    let next = jobs_rx.lock().await.recv().await;
                    let Some(name) = next else { break };
                    let resolution = resolve_one(lookup.as_ref(), &name).await;
                    done.fetch_add(1, Ordering::Relaxed);
                    if results_tx.send(resolution).await.is_err() {
                        break;
                    }
                }
            });
        }
        drop(results_tx);

        let feeder = tokio::spawn(async move {
            for name in valid {
                if jobs_tx.send(name).await.is_err() {
                    break;
                }
            }
        });

        let closer = tokio::spawn(async move {
            while let Some(joined) = pool.join_next().await {
                if let Err(e) = joined {
                    if e.is_panic() {
                        warn!("DNS worker panicked: {}", e);
                    }
                }
            }
        });

        let progress = ProgressReporter::spawn(self.show_progress, Arc::clone(&done), total);

        let mut found = HashSet::new();
        while let Some(resolution) = results_rx.recv().await {
            match resolution {
                Resolution::Found(name) => {
                    on_found(&name);
                    found.insert(name);
                }
                Resolution::NotFound => {}
                Resolution::Fatal { name, reason } => {
                    feeder.abort();
                    closer.abort();
                    progress.finish();
                    error!("Error querying nameservers! This could be a problem.");
                    error!("If you're using a VPN, try setting --ns to your VPN's nameserver.");
                    return Err(DnsError::NameserverFailure { name, reason });
                }
            }
        }

        let _ = feeder.await;
        if let Err(e) = closer.await {
            warn!("DNS pool closer exited abnormally: {}", e);
        }
        progress.finish();

        Ok(found)
    }
}
