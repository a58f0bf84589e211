use serde::{Deserialize, Serialize};

/// Response bytes kept per probe. Enough for XML error payloads and the
/// first page of a bucket listing.
pub const BODY_LIMIT: usize = 8 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Aws,
    Azure,
    Gcp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    Public,
    Protected,
    Disabled,
    Unknown,
}

impl Access {
    pub fn is_public(&self) -> bool {
        matches!(self, Access::Public)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Finding {
    #[serde(rename = "platform")]
    pub provider: Provider,
    pub msg: String,
    pub target: String,
    pub access: Access,
}

impl Finding {
    pub fn new(
        provider: Provider,
        msg: impl Into<String>,
        target: impl Into<String>,
        access: Access,
    ) -> Self {
        Self {
            provider,
            msg: msg.into(),
            target: target.into(),
            access,
        }
    }
}

/// One HTTP response as handed to a classifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    /// URL of the response that was read, after any followed redirect.
    pub url: String,
    /// URL that was requested.
    pub original_url: String,
    pub status: u16,
    pub reason: String,
    /// At most [`BODY_LIMIT`] bytes of the body, lossily decoded.
    pub body: String,
}

impl ProbeResult {
    /// True when either the reason phrase or the body contains `needle`.
    pub fn mentions(&self, needle: &str) -> bool {
        self.reason.contains(needle) || self.body.contains(needle)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn prefix(&self) -> &'static str {
        match self {
            Scheme::Http => "http://",
            Scheme::Https => "https://",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Redirects {
    Follow,
    Stop,
}

/// Counters describing how an HTTP batch went.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Targets that passed validation.
    pub total: usize,
    /// Requests handed to the transport.
    pub dispatched: usize,
    /// Results passed to the classifier.
    pub delivered: usize,
    /// Transport failures.
    pub failed: usize,
    /// Whether the classifier asked to break out.
    pub aborted: bool,
}
