//! Rate limiting middleware
//!
//! Fixed-window limiter over Redis. Each API surface carries its own policy:
//! authoring is a low-volume back-office surface, runtime evaluation takes
//! event traffic and gets a far higher ceiling. Keys embed the window start,
//! so a window expires by construction even if the EXPIRE is lost.

use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;

use crate::{constants::rate_limits, error::AppError, state::AppState, utils::time::now_utc};

/// One per-surface limit.
struct RateLimitPolicy {
    prefix: &'static str,
    bucket: &'static str,
    max_requests: i64,
    window_secs: i64,
}

/// Consulted in order; first matching prefix wins.
const POLICIES: &[RateLimitPolicy] = &[
    RateLimitPolicy {
        prefix: "/api/authoring",
        bucket: "authoring",
        max_requests: rate_limits::AUTHORING_MAX_REQUESTS,
        window_secs: rate_limits::AUTHORING_WINDOW_SECS,
    },
    RateLimitPolicy {
        prefix: "/api/runtime",
        bucket: "runtime",
        max_requests: rate_limits::RUNTIME_MAX_REQUESTS,
        window_secs: rate_limits::RUNTIME_WINDOW_SECS,
    },
];

const FALLBACK_POLICY: RateLimitPolicy = RateLimitPolicy {
    prefix: "",
    bucket: "general",
    max_requests: rate_limits::GENERAL_MAX_REQUESTS,
    window_secs: rate_limits::GENERAL_WINDOW_SECS,
};

fn policy_for(path: &str) -> &'static RateLimitPolicy {
    POLICIES
        .iter()
        .find(|p| path.starts_with(p.prefix))
        .unwrap_or(&FALLBACK_POLICY)
}

/// Key for the window the instant `now` falls into.
fn window_key(policy: &RateLimitPolicy, caller: &str, now_secs: i64) -> String {
    let window_start = now_secs - now_secs.rem_euclid(policy.window_secs);
    format!("rate:{}:{}:{}", policy.bucket, caller, window_start)
}

/// Rate limit middleware
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let policy = policy_for(request.uri().path());
    let caller = addr.ip().to_string();
    let key = window_key(policy, &caller, now_utc().timestamp());

    let mut conn = state.redis();
    let counted: Result<(i64,), redis::RedisError> = redis::pipe()
        .atomic()
        .incr(&key, 1)
        .expire(&key, policy.window_secs)
        .ignore()
        .query_async(&mut conn)
        .await;

    match counted {
        Ok((count,)) if count > policy.max_requests => {
            tracing::warn!(
                bucket = policy.bucket,
                caller = %caller,
                count,
                "Rate limit exceeded"
            );
            AppError::TooManyRequests.into_response()
        }
        Ok(_) => next.run(request).await,
        // A cache outage must not take the API down with it.
        Err(e) => {
            tracing::warn!("Rate limiter unavailable, failing open: {}", e);
            next.run(request).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_selection() {
        assert_eq!(policy_for("/api/authoring/promotions/draft").bucket, "authoring");
        assert_eq!(policy_for("/api/runtime/evaluate").bucket, "runtime");
        assert_eq!(policy_for("/api/health").bucket, "general");
        assert_eq!(policy_for("/").bucket, "general");
    }

    #[test]
    fn test_runtime_ceiling_exceeds_authoring() {
        let authoring = policy_for("/api/authoring/promotions/draft");
        let runtime = policy_for("/api/runtime/evaluate");
        assert!(runtime.max_requests > authoring.max_requests);
    }

    #[test]
    fn test_window_key_is_stable_within_a_window() {
        let policy = policy_for("/api/runtime/evaluate");
        let base = 1_700_000_040; // inside some 60s window
        let a = window_key(policy, "10.0.0.1", base);
        let b = window_key(policy, "10.0.0.1", base + policy.window_secs - 1 - base.rem_euclid(policy.window_secs));
        assert_eq!(a, b);

        let next = window_key(policy, "10.0.0.1", base + policy.window_secs);
        assert_ne!(a, next);
    }

    #[test]
    fn test_window_key_separates_callers_and_buckets() {
        let runtime = policy_for("/api/runtime/evaluate");
        let authoring = policy_for("/api/authoring/promotions/draft");
        let now = 1_700_000_000;

        assert_ne!(
            window_key(runtime, "10.0.0.1", now),
            window_key(runtime, "10.0.0.2", now)
        );
        assert_ne!(
            window_key(runtime, "10.0.0.1", now),
            window_key(authoring, "10.0.0.1", now)
        );
    }
}
