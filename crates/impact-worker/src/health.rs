use std::net::TcpListener;
use std::sync::Arc;
use std::thread::JoinHandle;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use prometheus::{Encoder, TextEncoder};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

use crate::config::WorkerConfig;
use crate::metrics::WorkerMetrics;
use crate::state::{LivenessState, WorkerStatus};

/// Why a liveness evaluation came back unhealthy, in reporting priority
/// order: a non-running status always wins over staleness.
#[derive(Debug, Clone, PartialEq)]
pub enum UnhealthyReason {
    NotRunning(WorkerStatus),
    HeartbeatStale { age_secs: f64, limit_secs: f64 },
    TaskOvertime { elapsed_secs: f64, limit_secs: f64 },
}

impl std::fmt::Display for UnhealthyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnhealthyReason::NotRunning(status) => {
                write!(f, "worker status is {}", status.as_str())
            }
            UnhealthyReason::HeartbeatStale { age_secs, limit_secs } => {
                if age_secs.is_finite() {
                    write!(
                        f,
                        "heartbeat is {age_secs:.1}s old, exceeding the {limit_secs:.0}s timeout"
                    )
                } else {
                    write!(f, "no heartbeat recorded yet ({limit_secs:.0}s timeout)")
                }
            }
            UnhealthyReason::TaskOvertime { elapsed_secs, limit_secs } => {
                write!(
                    f,
                    "task running for {elapsed_secs:.1}s, past its {limit_secs:.1}s window"
                )
            }
        }
    }
}

/// Outcome of a liveness evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum Liveness {
    Healthy { heartbeat_age_secs: Option<f64> },
    Unhealthy(UnhealthyReason),
}

/// Evaluate liveness from the shared state at `now`.
///
/// Pure read: no locks, no calls into the processing loop. While a long
/// task is tracked, the timeout scales with its estimate; otherwise the
/// fixed heartbeat timeout applies.
pub fn evaluate(state: &LivenessState, config: &WorkerConfig, now: DateTime<Utc>) -> Liveness {
    let status = state.status();

    let heartbeat_age_secs = state
        .last_heartbeat()
        .map(|heartbeat| (now - heartbeat).num_milliseconds().max(0) as f64 / 1000.0);

    let overtime = match state.task_window() {
        Some((start, expected)) => {
            let limit_secs = expected.as_secs_f64() * config.task_timeout_buffer;
            let elapsed_secs = (now - start).num_milliseconds().max(0) as f64 / 1000.0;
            (elapsed_secs > limit_secs).then_some(UnhealthyReason::TaskOvertime {
                elapsed_secs,
                limit_secs,
            })
        }
        None => {
            let limit_secs = config.heartbeat_timeout_secs as f64;
            match heartbeat_age_secs {
                Some(age_secs) if age_secs <= limit_secs => None,
                Some(age_secs) => Some(UnhealthyReason::HeartbeatStale {
                    age_secs,
                    limit_secs,
                }),
                None => Some(UnhealthyReason::HeartbeatStale {
                    age_secs: f64::INFINITY,
                    limit_secs,
                }),
            }
        }
    };

    if status != WorkerStatus::Running {
        return Liveness::Unhealthy(UnhealthyReason::NotRunning(status));
    }
    if let Some(reason) = overtime {
        return Liveness::Unhealthy(reason);
    }
    Liveness::Healthy { heartbeat_age_secs }
}

#[derive(Clone)]
struct HealthContext {
    state: Arc<LivenessState>,
    config: Arc<WorkerConfig>,
    metrics: Arc<WorkerMetrics>,
}

/// Build the health router: `/health` for liveness, `/ready` for
/// readiness, `/metrics` for prometheus exposition.
pub fn router(
    state: Arc<LivenessState>,
    config: Arc<WorkerConfig>,
    metrics: Arc<WorkerMetrics>,
) -> Router {
    let ctx = HealthContext {
        state,
        config,
        metrics,
    };
    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

async fn health(State(ctx): State<HealthContext>) -> Response {
    match evaluate(&ctx.state, &ctx.config, Utc::now()) {
        Liveness::Healthy { heartbeat_age_secs } => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "service": ctx.config.service_name,
                "heartbeat_age": heartbeat_age_secs,
            })),
        )
            .into_response(),
        Liveness::Unhealthy(reason) => {
            debug!(%reason, "liveness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unavailable",
                    "service": ctx.config.service_name,
                    "reason": reason.to_string(),
                })),
            )
                .into_response()
        }
    }
}

async fn ready(State(ctx): State<HealthContext>) -> Response {
    if ctx.state.is_ready() {
        (StatusCode::OK, Json(json!({"status": "ready"}))).into_response()
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"status": "not_ready"})),
        )
            .into_response()
    }
}

async fn metrics_handler(State(ctx): State<HealthContext>) -> String {
    let encoder = TextEncoder::new();
    let metric_families = ctx.metrics.registry.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

/// Serve the health router until `shutdown` fires.
///
/// Runs on its own OS thread with a single-thread runtime, so a
/// saturated processing runtime cannot delay liveness responses. The
/// listener is bound by the caller; a taken port fails startup instead
/// of the health thread.
pub fn spawn_server(
    listener: TcpListener,
    router: Router,
    shutdown: CancellationToken,
) -> std::io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("health-server".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(err) => {
                    error!(error = %err, "failed to build health server runtime");
                    return;
                }
            };

            if let Err(err) = runtime.block_on(serve(listener, router, shutdown)) {
                error!(error = %err, "health server terminated abnormally");
            }
        })
}

async fn serve(
    listener: TcpListener,
    router: Router,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    listener.set_nonblocking(true)?;
    let listener = tokio::net::TcpListener::from_std(listener)?;

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}
