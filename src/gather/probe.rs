//! Resource availability probing
//!
//! A resource is reachable only when a HEAD request answers exactly 200.
//! Anything else, including transport failures, drops the resource quietly.
//! The audit report uses GET, since some servers answer HEAD differently.

use crate::config::ProbeConfig;
use crate::types::{NormalizedResource, Package};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Errors raised by a probe transport
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// Existence check for a resource URL
pub trait ResourceProbe: Send + Sync {
    /// Status code answered for `url`
    fn status(&self, url: &str) -> Result<u16, ProbeError>;
}

/// HTTP method used by [`HttpProbe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProbeMethod {
    #[default]
    Head,
    Get,
}

/// Probe issuing blocking HEAD (or GET) requests
#[derive(Debug)]
pub struct HttpProbe {
    client: reqwest::blocking::Client,
    method: ProbeMethod,
}

impl HttpProbe {
    pub fn new(config: &ProbeConfig) -> Result<Self, ProbeError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .user_agent(&config.user_agent)
            .build()?;

        Ok(Self {
            client,
            method: ProbeMethod::Head,
        })
    }

    pub fn with_method(mut self, method: ProbeMethod) -> Self {
        self.method = method;
        self
    }
}

impl ResourceProbe for HttpProbe {
    fn status(&self, url: &str) -> Result<u16, ProbeError> {
        let parsed = url::Url::parse(url).map_err(|e| ProbeError::InvalidUrl(format!("{}: {}", url, e)))?;
        // The GET body is never read; only the status matters
        let response = match self.method {
            ProbeMethod::Head => self.client.head(parsed).send()?,
            ProbeMethod::Get => self.client.get(parsed).send()?,
        };
        Ok(response.status().as_u16())
    }
}

/// Probe answering from a fixed status table.
///
/// Used for offline runs (everything reachable) and in tests.
#[derive(Debug, Clone, Default)]
pub struct StaticProbe {
    statuses: HashMap<String, u16>,
    default_status: u16,
}

impl StaticProbe {
    /// Every URL answers 200
    pub fn all_reachable() -> Self {
        Self {
            statuses: HashMap::new(),
            default_status: 200,
        }
    }

    /// Unlisted URLs answer `default_status`
    pub fn with_default(default_status: u16) -> Self {
        Self {
            statuses: HashMap::new(),
            default_status,
        }
    }

    /// Set the status answered for one URL
    pub fn with_status(mut self, url: impl Into<String>, status: u16) -> Self {
        self.statuses.insert(url.into(), status);
        self
    }
}

impl ResourceProbe for StaticProbe {
    fn status(&self, url: &str) -> Result<u16, ProbeError> {
        Ok(self.statuses.get(url).copied().unwrap_or(self.default_status))
    }
}

/// Outcome of probing one URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Reachable,
    /// Non-200 status, or `None` when the request itself failed
    Unreachable(Option<u16>),
}

/// Resources of a package that passed the probe
#[derive(Debug, Clone, Default)]
pub struct FilterReport {
    pub resources: Vec<NormalizedResource>,
    pub probed: usize,
    pub unreachable: usize,
}

/// Keeps only the resources whose probe answers 200
#[derive(Clone)]
pub struct ResourceFilter {
    probe: Arc<dyn ResourceProbe>,
}

impl ResourceFilter {
    pub fn new(probe: Arc<dyn ResourceProbe>) -> Self {
        Self { probe }
    }

    /// Probe a single URL; never fails
    pub fn check(&self, url: &str) -> ProbeOutcome {
        match self.probe.status(url) {
            Ok(200) => ProbeOutcome::Reachable,
            Ok(status) => {
                debug!("{}: {}", status, url);
                ProbeOutcome::Unreachable(Some(status))
            }
            Err(e) => {
                debug!("probe failed for {}: {}", url, e);
                ProbeOutcome::Unreachable(None)
            }
        }
    }

    /// Reachable resources of every record, in document order
    pub fn filter(&self, package: &Package) -> FilterReport {
        let mut report = FilterReport::default();

        for resource in package.records().iter().filter_map(|r| r.resource.as_ref()) {
            report.probed += 1;
            match self.check(&resource.url) {
                ProbeOutcome::Reachable => report.resources.push(NormalizedResource::from(resource)),
                ProbeOutcome::Unreachable(_) => report.unreachable += 1,
            }
        }

        report
    }
}

/// A resource that failed the availability check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingResource {
    pub dataset_id: String,
    pub url: String,
    pub status: Option<u16>,
}

impl fmt::Display for MissingResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{}: {}", status, self.url),
            None => write!(f, "error: {}", self.url),
        }
    }
}

/// Probe every resource of every package and list those not answering 200
pub fn audit_resources(packages: &[Package], filter: &ResourceFilter) -> Vec<MissingResource> {
    let mut missing = Vec::new();

    for record in packages.iter().flat_map(|p| p.records()) {
        let Some(resource) = record.resource.as_ref() else {
            continue;
        };
        if let ProbeOutcome::Unreachable(status) = filter.check(&resource.url) {
            missing.push(MissingResource {
                dataset_id: record.dataset_id.clone(),
                url: resource.url.clone(),
                status,
            });
        }
    }

    missing
}
