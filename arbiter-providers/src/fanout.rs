//! Bounded-concurrency provider fan-out
//!
//! Turns a provider list plus query parameters into a vector of
//! `ProviderOutcome` envelopes. Results join in completion order; the
//! reconciliation stages downstream are order-independent, so no attempt is
//! made to preserve the registry order.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use arbiter_core::{ProviderOutcome, ProviderResponse};

use crate::fetch::Fetcher;
use crate::registry::{ProviderSpec, QueryParams};

/// Concurrency cap for the outcome pipeline.
pub const OUTCOME_CONCURRENCY: usize = 3;

/// Concurrency cap for the statistic pipeline.
pub const STATISTIC_CONCURRENCY: usize = 4;

/// One fan-out request.
#[derive(Debug, Clone)]
pub struct FanOutPlan<'a> {
    pub specs: &'a [ProviderSpec],
    pub params: QueryParams,
    pub concurrency: usize,
    /// Per-request deadline. A task preempted while still queued does not
    /// count against any breaker; one cancelled mid-flight does.
    pub deadline: Option<Duration>,
}

/// Fan out to every provider in the plan and join the envelopes.
#[instrument(skip(fetcher, plan), fields(providers = plan.specs.len()))]
pub async fn fan_out(fetcher: &Fetcher, plan: FanOutPlan<'_>) -> Vec<ProviderOutcome> {
    let semaphore = Arc::new(Semaphore::new(plan.concurrency.max(1)));
    let deadline = plan.deadline.map(|d| Instant::now() + d);

    let tasks = plan.specs.iter().map(|spec| {
        let semaphore = Arc::clone(&semaphore);
        let params = plan.params.clone();
        async move { call_provider(fetcher, spec, &params, semaphore, deadline).await }
    });

    let outcomes = futures::future::join_all(tasks).await;

    let ok = outcomes
        .iter()
        .filter(|o| matches!(o, ProviderOutcome::Success(_)))
        .count();
    info!("fan-out complete: {}/{} providers answered", ok, outcomes.len());
    outcomes
}

async fn call_provider(
    fetcher: &Fetcher,
    spec: &ProviderSpec,
    params: &QueryParams,
    semaphore: Arc<Semaphore>,
    deadline: Option<Instant>,
) -> ProviderOutcome {
    let provider = spec.key.to_string();

    let Some(base_url) = spec.base_url() else {
        debug!("provider {} skipped: {} not set", spec.key, spec.base_url_env);
        return ProviderOutcome::Skipped {
            provider,
            reason: format!("{} not set", spec.base_url_env),
        };
    };

    // Queued tasks preempted by the deadline never began; no breaker
    // accounting for them.
    let permit = match acquire_until(&semaphore, deadline).await {
        Some(permit) => permit,
        None => {
            return ProviderOutcome::Failed {
                provider,
                error: "deadline exceeded before request started".to_string(),
            }
        }
    };
    let _permit = permit;

    let url = spec.compose_url(&base_url, params);
    let api_key = spec.api_key();
    let headers = spec.build_headers(api_key.as_deref());
    let retry = spec.retry_policy();

    let fetch = fetcher.fetch_json(&url, &headers, &retry);
    let result = match deadline {
        Some(deadline) => {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match tokio::time::timeout(remaining, fetch).await {
                Ok(result) => result,
                Err(_) => {
                    // The request was in flight when the deadline hit.
                    if let Some(breaker) = fetcher.breaker_for(&url) {
                        breaker.record_failure();
                    }
                    warn!("provider {} cancelled by deadline", spec.key);
                    return ProviderOutcome::Failed {
                        provider,
                        error: "deadline exceeded".to_string(),
                    };
                }
            }
        }
        None => fetch.await,
    };

    match result {
        Ok(payload) => ProviderOutcome::Success(ProviderResponse {
            provider,
            tier: spec.tier,
            weight: spec.weight(),
            collected_at: Utc::now(),
            payload,
            meta: [
                ("name".to_string(), spec.name.to_string()),
                (
                    "endpoint".to_string(),
                    format!("{}{}", base_url.trim_end_matches('/'), spec.path),
                ),
            ]
            .into(),
        }),
        Err(e) => ProviderOutcome::Failed {
            provider,
            error: e.to_string(),
        },
    }
}

async fn acquire_until(
    semaphore: &Arc<Semaphore>,
    deadline: Option<Instant>,
) -> Option<tokio::sync::SemaphorePermit<'_>> {
    match deadline {
        Some(deadline) => {
            let remaining = deadline.saturating_duration_since(Instant::now());
            tokio::time::timeout(remaining, semaphore.acquire())
                .await
                .ok()
                .and_then(|r| r.ok())
        }
        None => semaphore.acquire().await.ok(),
    }
}
