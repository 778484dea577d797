//! One instrumented GET against the gateway.

use std::time::Duration;

use tokio::time::Instant;
use tracing::info;

use super::Gateway;
use super::pop::pop_from_headers;
use crate::{TaskContext, TaskError};

/// What a probe needs to know about one response.
pub(crate) struct Fetched {
    pub status: u16,
    pub pop: String,
    pub body: Vec<u8>,
    /// Until the response head arrived.
    pub first_byte: Duration,
    /// Until the whole body arrived.
    pub total: Duration,
}

/// Fetches `path` from the gateway, giving up as soon as `ctx` is cancelled.
///
/// Transport failures are returned as [`TaskError::Fail`]; any status code is
/// a successful fetch, judging it is the caller's job.
pub(crate) async fn fetch(
    ctx: &TaskContext,
    gw: &Gateway,
    task: &str,
    path: &str,
) -> Result<Fetched, TaskError> {
    let url = format!("{}{}", gw.url, path);
    info!(task, %url, "fetching from gateway");

    tokio::select! {
        _ = ctx.cancelled() => Err(TaskError::Canceled),
        res = get(gw, &url) => res,
    }
}

async fn get(gw: &Gateway, url: &str) -> Result<Fetched, TaskError> {
    let start = Instant::now();
    let resp = gw
        .http
        .get(url)
        .send()
        .await
        .map_err(|e| TaskError::fail(format!("failed to fetch from gateway: {e}")))?;
    let first_byte = start.elapsed();

    let status = resp.status().as_u16();
    let pop = pop_from_headers(resp.headers());
    let body = resp
        .bytes()
        .await
        .map_err(|e| TaskError::fail(format!("failed to download content: {e}")))?;

    Ok(Fetched {
        status,
        pop,
        body: body.to_vec(),
        first_byte,
        total: start.elapsed(),
    })
}
