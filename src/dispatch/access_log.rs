use super::Stage;
use crate::error::ErrorKind;
use crate::http::{Method, StatusCode};
use chrono::{DateTime, Utc};
use std::time::Duration;

/// One finished request.
#[derive(Debug, Clone)]
pub struct AccessEvent {
    pub method: Method,
    pub path: String,
    pub status: StatusCode,
    pub duration: Duration,
    /// Stage the request ended in.
    pub stage: Stage,
    /// Stage the pipeline failed to reach, for failed requests.
    pub failed_at: Option<Stage>,
    pub error: Option<ErrorKind>,
    pub timestamp: DateTime<Utc>,
}

impl AccessEvent {
    pub fn duration_ms(&self) -> f64 {
        self.duration.as_secs_f64() * 1000.0
    }
}

/// Sink receiving exactly one event per request.
pub trait AccessLog: Send + Sync + 'static {
    fn log(&self, event: &AccessEvent);
}

impl<F> AccessLog for F
where
    F: Fn(&AccessEvent) + Send + Sync + 'static,
{
    fn log(&self, event: &AccessEvent) {
        (self)(event)
    }
}

/// Default sink: a structured `tracing` event on the `fennec::access`
/// target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAccessLog;

impl AccessLog for TracingAccessLog {
    fn log(&self, event: &AccessEvent) {
        let error = event.error.map(|kind| kind.to_string());
        let failed_at = event.failed_at.map(|stage| stage.to_string());
        if event.status.is_server_error() {
            tracing::warn!(
                target: "fennec::access",
                method = %event.method,
                path = %event.path,
                status = event.status.as_u16(),
                duration_ms = event.duration_ms(),
                stage = %event.stage,
                failed_at = failed_at.as_deref(),
                error = error.as_deref(),
                "{} {} {}", event.method, event.path, event.status.as_u16()
            );
        } else {
            tracing::info!(
                target: "fennec::access",
                method = %event.method,
                path = %event.path,
                status = event.status.as_u16(),
                duration_ms = event.duration_ms(),
                stage = %event.stage,
                failed_at = failed_at.as_deref(),
                error = error.as_deref(),
                "{} {} {}", event.method, event.path, event.status.as_u16()
            );
        }
    }
}
