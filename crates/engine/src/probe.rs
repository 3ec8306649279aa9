//! Readiness probing and the shared polling abstraction.
//!
//! Candidate endpoints race concurrently; the first one that answers at all
//! wins. Any HTTP response – even an error status – proves the server is
//! alive and listening, so only connection failures count as "not ready".

use crate::error::{EngineError, EngineResult};
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior};

/// Fixed interval between readiness attempts per candidate.
pub const READY_POLL_INTERVAL: Duration = Duration::from_millis(500);
/// Per-attempt HTTP timeout, short so one hanging endpoint cannot mask a
/// faster one.
pub const READY_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(2);
/// Interval of the supervisor's liveness safety-net poll.
pub const LIVENESS_INTERVAL: Duration = Duration::from_millis(250);

/// Fixed-interval polling with an optional overall deadline.
///
/// Used for both readiness probing (500ms tick) and the supervisor liveness
/// check (250ms tick). Intentionally a simple timer, not adaptive backoff.
#[derive(Debug, Clone, Copy)]
pub struct Poller {
    pub interval: Duration,
    pub deadline: Option<Duration>,
}

impl Poller {
    pub fn new(interval: Duration, deadline: Option<Duration>) -> Self {
        Self { interval, deadline }
    }

    /// Run `attempt` on each tick until it yields `Some`, or until the
    /// deadline elapses. The first attempt fires immediately.
    pub async fn run<T, F, Fut>(&self, mut attempt: F) -> Option<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Option<T>>,
    {
        let start = Instant::now();
        let mut tick = tokio::time::interval(self.interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tick.tick().await;
            if let Some(v) = attempt().await {
                return Some(v);
            }
            if let Some(deadline) = self.deadline {
                if start.elapsed() >= deadline {
                    return None;
                }
            }
        }
    }
}

/// Poll each candidate URL until one responds, and return the winner.
///
/// Losers' in-flight probes are abandoned when the `JoinSet` drops; their
/// results are ignored. Fails with [`EngineError::ReadinessTimeout`] if no
/// candidate responds within `timeout`.
pub async fn wait_for_ready(urls: &[String], timeout: Duration) -> EngineResult<String> {
    // reqwest is built without a default TLS provider; install ring once.
    // Losing the race to an earlier install is fine.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let client = reqwest::Client::builder()
        .timeout(READY_ATTEMPT_TIMEOUT)
        .build()
        .map_err(|e| EngineError::Network(format!("failed to build HTTP client: {e}")))?;

    let mut set = JoinSet::new();
    for url in urls {
        let client = client.clone();
        let url = url.clone();
        set.spawn(async move {
            let poller = Poller::new(READY_POLL_INTERVAL, None);
            poller
                .run(|| {
                    let client = client.clone();
                    let url = url.clone();
                    async move {
                        match client.get(&url).send().await {
                            Ok(resp) => {
                                tracing::debug!(%url, status = resp.status().as_u16(), "endpoint answered");
                                Some(url)
                            }
                            Err(_) => None,
                        }
                    }
                })
                .await
        });
    }

    match tokio::time::timeout(timeout, set.join_next()).await {
        Ok(Some(Ok(Some(url)))) => {
            tracing::info!(%url, "dev server ready");
            Ok(url)
        }
        // Candidate tasks only return via Some(url); anything else means the
        // set drained or a task panicked, and the deadline policy applies.
        Ok(_) | Err(_) => Err(EngineError::ReadinessTimeout {
            waited_secs: timeout.as_secs(),
        }),
    }
}
