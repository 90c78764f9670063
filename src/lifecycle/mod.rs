//! Lifespan hooks.
//!
//! ```text
//! Application::startup()    OnStartup hooks, registration order,
//!    ↓                      first failure aborts
//! [serving...]
//!    ↓
//! shutdown_signal()         SIGINT / SIGTERM
//!    ↓
//! Application::shutdown()   OnShutdown hooks, reverse order,
//!                           failures logged
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use fennec::lifecycle::{OnStartup, OnShutdown, LifecycleError};
//! use async_trait::async_trait;
//!
//! struct Database { pool: Pool }
//!
//! #[async_trait]
//! impl OnStartup for Database {
//!     async fn on_startup(&self) -> Result<(), LifecycleError> {
//!         self.pool.ping().await.map_err(|e| LifecycleError::startup_failed(e.to_string()))
//!     }
//! }
//!
//! #[async_trait]
//! impl OnShutdown for Database {
//!     async fn on_shutdown(&self) -> Result<(), LifecycleError> {
//!         self.pool.close().await;
//!         Ok(())
//!     }
//! }
//! ```

mod error;
mod manager;
mod shutdown;
mod traits;

pub use error::{LifecycleError, Phase, Result};
pub use manager::LifecycleManager;
pub use shutdown::shutdown_signal;
pub use traits::{OnShutdown, OnStartup};
