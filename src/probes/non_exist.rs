//! # Non-existent content check.
//!
//! Requests a CID generated on the spot from random bytes. No one can have
//! published it, so a healthy gateway answers 404 (or 504 after giving up on
//! the DHT). Anything else means the gateway is serving content it should not
//! have, or is broken.
//!
//! ## Collectors (`gatewaymonitor_task_non_exist_*`)
//! - `latency_seconds{pop}`, `fetch_seconds{pop}`
//! - `fail_count{pop, code, location}`: unexpected status
//! - `error_count{pop}`: request could not complete (`pop` = gateway URL here)

use std::sync::Arc;

use async_trait::async_trait;
use rand::Rng;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use super::fetch::fetch;
use super::{Gateway, pop_to_location};
use crate::metrics::{Counter, Histogram, Opts, linear_buckets};
use crate::{Registration, Task, TaskContext, TaskError};

fn opts(name: &str) -> Opts {
    Opts::new(name)
        .namespace("gatewaymonitor_task")
        .subsystem("non_exist")
}

/// Expects "not found" for content that cannot exist.
pub struct NonExistCheck {
    schedule: String,
    latency: Arc<Histogram>,
    fetch_time: Arc<Histogram>,
    fails: Arc<Counter>,
    errors: Arc<Counter>,
}

impl NonExistCheck {
    pub fn new(schedule: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            schedule: schedule.into(),
            latency: Histogram::with_labels(
                opts("latency_seconds").help("Time to first byte"),
                linear_buckets(0.0, 30.0, 20), // 0-10 minutes
                &["pop"],
            ),
            fetch_time: Histogram::with_labels(
                opts("fetch_seconds").help("Total fetch time"),
                linear_buckets(0.0, 0.2, 10),
                &["pop"],
            ),
            fails: Counter::with_labels(
                opts("fail_count").help("Responses other than 404/504"),
                &["pop", "code", "location"],
            ),
            errors: Counter::with_labels(
                opts("error_count").help("Requests that did not complete"),
                &["pop"],
            ),
        })
    }

    pub fn errors(&self, pop: &str) -> u64 {
        self.errors.get_with(&[pop])
    }
}

#[async_trait]
impl Task<Gateway> for NonExistCheck {
    fn name(&self) -> &str {
        "non_exist"
    }

    async fn run(&self, ctx: &TaskContext, gw: &Gateway) -> Result<(), TaskError> {
        let cid = random_cid();
        info!(task = "non_exist", %cid, "generated random CID");

        let got = match fetch(ctx, gw, "non_exist", &format!("/ipfs/{cid}")).await {
            Ok(got) => got,
            Err(e) => {
                if !matches!(e, TaskError::Canceled) {
                    self.errors.inc_with(&[gw.url.as_str()]);
                }
                return Err(e);
            }
        };

        if !matches!(got.status, 404 | 504) {
            let code = got.status.to_string();
            self.fails
                .inc_with(&[got.pop.as_str(), code.as_str(), pop_to_location(&got.pop)]);
            warn!(task = "non_exist", pop = %got.pop, status = got.status, "unexpected status");
            return Err(TaskError::fail(format!(
                "expected 404 or 504 from gateway, got {} (pop: {})",
                got.status, got.pop
            )));
        }

        self.latency
            .observe_with(&[got.pop.as_str()], got.first_byte.as_secs_f64());
        self.fetch_time.observe_with(&[got.pop.as_str()], got.total.as_secs_f64());
        info!(
            task = "non_exist",
            pop = %got.pop,
            seconds = got.total.as_secs_f64(),
            "finished download"
        );
        Ok(())
    }

    fn registration(&self) -> Registration {
        Registration::new(self.schedule.clone())
            .with_collector(self.latency.clone())
            .with_collector(self.fetch_time.clone())
            .with_collector(self.fails.clone())
            .with_collector(self.errors.clone())
    }

    fn latency_hist(&self) -> Option<Arc<Histogram>> {
        Some(self.latency.clone())
    }

    fn fetch_hist(&self) -> Option<Arc<Histogram>> {
        Some(self.fetch_time.clone())
    }
}

/// CIDv1, raw codec, sha2-256 multihash of 128 random bytes, multibase base32.
fn random_cid() -> String {
    let mut buf = [0u8; 128];
    rand::rng().fill(&mut buf[..]);
    cid_v1_raw(&buf)
}

fn cid_v1_raw(data: &[u8]) -> String {
    const CID_V1: u8 = 0x01;
    const RAW: u8 = 0x55;
    const SHA2_256: u8 = 0x12;

    let digest = Sha256::digest(data);
    let mut bytes = Vec::with_capacity(4 + digest.len());
    bytes.extend_from_slice(&[CID_V1, RAW, SHA2_256, digest.len() as u8]);
    bytes.extend_from_slice(&digest);

    let mut out = String::from("b");
    base32_lower(&bytes, &mut out);
    out
}

/// RFC 4648 base32, lowercase, no padding.
fn base32_lower(data: &[u8], out: &mut String) {
    const ALPHABET: &[u8; 32] = b"abcdefghijklmnopqrstuvwxyz234567";

    let mut acc: u32 = 0;
    let mut bits = 0;
    for &b in data {
        acc = (acc << 8) | u32::from(b);
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(ALPHABET[((acc >> bits) & 31) as usize] as char);
        }
    }
    if bits > 0 {
        out.push(ALPHABET[((acc << (5 - bits)) & 31) as usize] as char);
    }
}
