//! # IPFS gateway probes.
//!
//! Task implementations over the [`Gateway`] service bundle:
//! - [`KnownGoodCheck`]: fetch fixed paths and compare the bodies byte for byte
//! - [`NonExistCheck`]: ask for a freshly generated CID nobody ever published
//! - [`NoopTask`]: sleeps and bumps a gauge; useful to exercise the engine
//!
//! Every probe labels its observations with the gateway point of presence
//! that served the request (`X-IPFS-POP`, or `X-IPFS-LB-POP` when the node
//! itself did not answer).

mod fetch;
mod known_good;
mod non_exist;
mod noop;
mod pop;

use std::time::Duration;

pub use known_good::KnownGoodCheck;
pub use non_exist::NonExistCheck;
pub use noop::NoopTask;
pub use pop::pop_to_location;

use crate::TaskRef;

/// Service handles shared by every probe run.
#[derive(Clone, Debug)]
pub struct Gateway {
    /// Shared HTTP client (connection pool).
    pub http: reqwest::Client,
    /// Gateway base URL without a trailing slash, e.g. `https://ipfs.io`.
    pub url: String,
}

impl Gateway {
    /// Builds a client for `url`.
    ///
    /// The client's own timeout is left unset: run deadlines come from the engine.
    pub fn new(url: impl Into<String>) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("gateway-monitor/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self::with_client(http, url))
    }

    pub fn with_client(http: reqwest::Client, url: impl Into<String>) -> Self {
        let url = url.into().trim_end_matches('/').to_string();
        Self { http, url }
    }
}

/// Fixed path served by every public gateway, with its exact content.
pub const HELLO_WORLD_PATH: &str = "/ipfs/Qmc5gCcjYypU7y28oCALwfSvxCBskLuPKWpK4qpterKC7z";
pub const HELLO_WORLD_BODY: &[u8] = b"Hello World!\r\n";

/// Default probe set of the monitor.
///
/// Each call returns fresh instances with fresh collectors, so the result can
/// be registered into a new [`Registry`](crate::Registry).
pub fn all() -> Vec<TaskRef<Gateway>> {
    vec![
        KnownGoodCheck::new(
            "* * * * *",
            vec![(HELLO_WORLD_PATH.to_string(), HELLO_WORLD_BODY.to_vec())],
        ),
        NonExistCheck::new("0 * * * *"),
    ]
}
