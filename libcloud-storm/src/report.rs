use crate::types::{Finding, ProbeResult};
use dashmap::DashSet;
use std::{ops::ControlFlow, sync::Mutex};
use tracing::warn;

/// What a provider classifier made of one response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// A recognised non-finding.
    Miss,
    Hit(Finding),
    /// A response the classifier has no rule for.
    Unrecognized,
    /// Stop probing this batch.
    Breakout(&'static str),
}

/// Where findings go. Called from the classifier loop of every batch.
pub trait FindingSink: Send + Sync {
    fn report(&self, finding: &Finding);

    /// Objects found in an open bucket or container.
    fn listing(&self, _bucket: &str, _files: &[String]) {}
}

/// Report a verdict and turn it into the batch's control signal.
pub fn settle(verdict: Verdict, result: &ProbeResult, sink: &dyn FindingSink) -> ControlFlow<()> {
    match verdict {
        Verdict::Miss => ControlFlow::Continue(()),
        Verdict::Hit(finding) => {
            sink.report(&finding);
            ControlFlow::Continue(())
        }
        Verdict::Unrecognized => {
            warn!(
                "Unknown status codes being received from {}: {} {}",
                result.url, result.status, result.reason
            );
            ControlFlow::Continue(())
        }
        Verdict::Breakout(reason) => {
            warn!("Breaking out early, {}", reason);
            ControlFlow::Break(())
        }
    }
}

/// Keeps findings in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    findings: Mutex<Vec<Finding>>,
    listings: Mutex<Vec<(String, Vec<String>)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn findings(&self) -> Vec<Finding> {
        self.findings
            .lock()
            .map(|f| f.clone())
            .unwrap_or_default()
    }

    pub fn listings(&self) -> Vec<(String, Vec<String>)> {
        self.listings
            .lock()
            .map(|l| l.clone())
            .unwrap_or_default()
    }
}

impl FindingSink for MemorySink {
    fn report(&self, finding: &Finding) {
        if let Ok(mut findings) = self.findings.lock() {
            findings.push(finding.clone());
        }
    }

    fn listing(&self, bucket: &str, files: &[String]) {
        if let Ok(mut listings) = self.listings.lock() {
            listings.push((bucket.to_string(), files.to_vec()));
        }
    }
}

/// Forwards each distinct finding once, however many batches produce it.
pub struct DedupSink<S> {
    inner: S,
    seen: DashSet<Finding>,
}

impl<S: FindingSink> DedupSink<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            seen: DashSet::new(),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn distinct(&self) -> usize {
        self.seen.len()
    }
}

impl<S: FindingSink> FindingSink for DedupSink<S> {
    fn report(&self, finding: &Finding) {
        if self.seen.insert(finding.clone()) {
            self.inner.report(finding);
        }
    }

    fn listing(&self, bucket: &str, files: &[String]) {
        self.inner.listing(bucket, files);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Access, Provider};

    fn result() -> ProbeResult {
        ProbeResult {
            url: "http://x/".into(),
            original_url: "http://x".into(),
            status: 418,
            reason: "I'm a teapot".into(),
            body: String::new(),
        }
    }

    #[test]
    fn settles_verdicts() {
        let sink = MemorySink::new();
        let finding = Finding::new(Provider::Aws, "OPEN S3 BUCKET", "http://x/", Access::Public);

        assert!(settle(Verdict::Miss, &result(), &sink).is_continue());
        assert!(settle(Verdict::Unrecognized, &result(), &sink).is_continue());
        assert!(settle(Verdict::Hit(finding.clone()), &result(), &sink).is_continue());
        assert!(settle(Verdict::Breakout("auth required"), &result(), &sink).is_break());
        assert_eq!(sink.findings(), vec![finding]);
    }

    #[test]
    fn dedup_forwards_each_finding_once() {
        let sink = DedupSink::new(MemorySink::new());
        let a = Finding::new(Provider::Gcp, "Open", "http://a/", Access::Public);
        let b = Finding::new(Provider::Gcp, "Open", "http://b/", Access::Public);
        sink.report(&a);
        sink.report(&b);
        sink.report(&a);
        assert_eq!(sink.distinct(), 2);
        assert_eq!(sink.inner().findings(), vec![a, b]);
    }
}
