use std::time::Duration;
use strum_macros::Display;
use thiserror::Error;

/// Which half of the application lifespan an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Phase {
    Startup,
    Shutdown,
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Returned by a startup hook that could not acquire its resource.
    #[error("Startup failed: {0}")]
    StartupFailed(String),

    #[error("Shutdown failed: {0}")]
    ShutdownFailed(String),

    #[error("{phase} hooks did not finish within {after:?}")]
    Timeout { phase: Phase, after: Duration },

    /// A named hook failed; startup stops at the first one.
    #[error("Hook '{hook}' failed: {message}")]
    HookFailed { hook: String, message: String },
}

impl LifecycleError {
    pub fn startup_failed(message: impl Into<String>) -> Self {
        Self::StartupFailed(message.into())
    }

    pub fn shutdown_failed(message: impl Into<String>) -> Self {
        Self::ShutdownFailed(message.into())
    }

    pub(crate) fn timeout(phase: Phase, after: Duration) -> Self {
        Self::Timeout { phase, after }
    }

    pub(crate) fn hook_failed(hook: impl Into<String>, message: impl Into<String>) -> Self {
        Self::HookFailed {
            hook: hook.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LifecycleError>;
