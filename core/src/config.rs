//! Settings for the shipped `UreqTransport`.
//!
//! The executor itself has nothing to configure; timeouts and the user agent
//! belong to the transport.

use std::time::Duration;

use serde::Deserialize;

pub const TIMEOUT_ENV: &str = "NET_SERVICE_TIMEOUT_SECS";
pub const USER_AGENT_ENV: &str = "NET_SERVICE_USER_AGENT";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Upper bound for the whole exchange. `None` leaves ureq's defaults.
    #[serde(with = "opt_secs")]
    pub timeout: Option<Duration>,
    /// Sent as `user-agent` unless the caller supplies one per request.
    pub user_agent: Option<String>,
    /// Largest response body accepted, in bytes. `None` reads bodies of any
    /// size; a larger body fails the request as a transport error.
    pub max_body_bytes: Option<u64>,
}

impl TransportConfig {
    /// Read settings from `NET_SERVICE_TIMEOUT_SECS` and
    /// `NET_SERVICE_USER_AGENT`. Unset or unparseable values fall back to the
    /// defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let timeout = lookup(TIMEOUT_ENV)
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        let user_agent = lookup(USER_AGENT_ENV).filter(|v| !v.trim().is_empty());
        Self {
            timeout,
            user_agent,
            max_body_bytes: None,
        }
    }
}

mod opt_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_secs))
    }
}
