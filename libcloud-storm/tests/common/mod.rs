#![allow(dead_code)]

use libcloud_storm::{Lookup, LookupError, ProbeResult, Redirects, Transport, TransportError};
use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};

#[derive(Debug, Clone)]
struct Canned {
    status: u16,
    reason: String,
    body: String,
    final_url: Option<String>,
}

/// Canned HTTP responses keyed by full URL; anything else is a 404.
#[derive(Default)]
pub struct MockTransport {
    responses: HashMap<String, Canned>,
    texts: HashMap<String, String>,
    failing: HashSet<String>,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: Mutex<Vec<String>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn respond(mut self, url: &str, status: u16, reason: &str, body: &str) -> Self {
        self.responses.insert(
            url.to_string(),
            Canned {
                status,
                reason: reason.to_string(),
                body: body.to_string(),
                final_url: None,
            },
        );
        self
    }

    /// Like `respond`, but the response claims to come from `final_url`.
    pub fn respond_from(
        mut self,
        url: &str,
        final_url: &str,
        status: u16,
        reason: &str,
        body: &str,
    ) -> Self {
        self.responses.insert(
            url.to_string(),
            Canned {
                status,
                reason: reason.to_string(),
                body: body.to_string(),
                final_url: Some(final_url.to_string()),
            },
        );
        self
    }

    pub fn text(mut self, url: &str, body: &str) -> Self {
        self.texts.insert(url.to_string(), body.to_string());
        self
    }

    pub fn fail(mut self, url: &str) -> Self {
        self.failing.insert(url.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl Transport for MockTransport {
    async fn fetch(&self, url: &str, _redirects: Redirects) -> Result<ProbeResult, TransportError> {
        self.calls.lock().unwrap().push(url.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(url) {
            return Err(TransportError::HeaderTimeout(Duration::from_secs(10)));
        }

        let canned = self.responses.get(url).cloned().unwrap_or(Canned {
            status: 404,
            reason: "Not Found".to_string(),
            body: String::new(),
            final_url: None,
        });
        Ok(ProbeResult {
            url: canned.final_url.unwrap_or_else(|| url.to_string()),
            original_url: url.to_string(),
            status: canned.status,
            reason: canned.reason,
            body: canned.body,
        })
    }

    async fn fetch_text(&self, url: &str) -> Result<String, TransportError> {
        Ok(self.texts.get(url).cloned().unwrap_or_default())
    }
}

/// Deterministic resolver: names in `existing` resolve, the rest are
/// NXDOMAIN, optionally after some timeouts or always fatally.
#[derive(Default)]
pub struct MockLookup {
    existing: HashSet<String>,
    timeouts: HashMap<String, usize>,
    fatal: bool,
    attempts: Mutex<HashMap<String, usize>>,
    calls: AtomicUsize,
}

impl MockLookup {
    pub fn new<I, S>(existing: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            existing: existing.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn always_fatal() -> Self {
        Self {
            fatal: true,
            ..Self::default()
        }
    }

    pub fn timing_out(mut self, name: &str, times: usize) -> Self {
        self.timeouts.insert(name.to_string(), times);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn attempts(&self, name: &str) -> usize {
        self.attempts
            .lock()
            .unwrap()
            .get(name)
            .copied()
            .unwrap_or(0)
    }
}

impl Lookup for MockLookup {
    async fn lookup(&self, name: &str) -> Result<(), LookupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            let n = attempts.entry(name.to_string()).or_insert(0);
            *n += 1;
            *n
        };

        if self.fatal {
            return Err(LookupError::Fatal("SERVFAIL".to_string()));
        }
        if attempt <= self.timeouts.get(name).copied().unwrap_or(0) {
            return Err(LookupError::Timeout);
        }
        if self.existing.contains(name) {
            Ok(())
        } else {
            Err(LookupError::NotFound)
        }
    }
}

pub fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
