//! Settings resolution for the CLI.
//!
//! Every setting is taken from its flag first, then its environment
//! variable, then the built-in default.

use anyhow::{Context, Result};
use edufs_core::{DEFAULT_ENDPOINT, HttpNodeConfig};
use std::time::Duration;

pub const NODE_ENV: &str = "EDUFS_NODE";
pub const GATEWAY_ENV: &str = "EDUFS_GATEWAY";
pub const TIMEOUT_ENV: &str = "EDUFS_TIMEOUT";

pub const DEFAULT_GATEWAY: &str = "https://ipfs.io";

/// Resolved settings shared by every command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub node: HttpNodeConfig,
    pub gateway: String,
}

impl Settings {
    /// Resolve settings from flags and the process environment.
    pub fn resolve(
        node: Option<String>,
        gateway: Option<String>,
        timeout_secs: Option<u64>,
    ) -> Result<Self> {
        Self::resolve_with(node, gateway, timeout_secs, |key| std::env::var(key).ok())
    }

    /// Resolve settings, reading variables through `env`.
    pub fn resolve_with(
        node: Option<String>,
        gateway: Option<String>,
        timeout_secs: Option<u64>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let endpoint = pick(node, env(NODE_ENV), DEFAULT_ENDPOINT);
        let gateway = pick(gateway, env(GATEWAY_ENV), DEFAULT_GATEWAY);

        let timeout = match timeout_secs {
            Some(secs) => Some(secs),
            None => env(TIMEOUT_ENV)
                .map(|raw| {
                    raw.trim()
                        .parse::<u64>()
                        .with_context(|| format!("Invalid {}: {}", TIMEOUT_ENV, raw))
                })
                .transpose()?,
        };

        let node = HttpNodeConfig::from_endpoint(&endpoint)
            .with_context(|| format!("Invalid node endpoint: {}", endpoint))?
            .with_timeout(timeout.filter(|&s| s > 0).map(Duration::from_secs));

        Ok(Self {
            node,
            gateway: gateway.trim_end_matches('/').to_string(),
        })
    }

    /// Gateway link for an immutable identifier.
    pub fn ipfs_url(&self, cid: &str) -> String {
        format!("{}/ipfs/{}", self.gateway, cid)
    }

    /// Gateway link for a mutable name.
    pub fn ipns_url(&self, name: &str) -> String {
        format!("{}/ipns/{}", self.gateway, name)
    }
}

fn pick(flag: Option<String>, env: Option<String>, default: &str) -> String {
    flag.or(env.filter(|v| !v.trim().is_empty()))
        .unwrap_or_else(|| default.to_string())
}
