//! Dependency injection.
//!
//! Two layers work together:
//!
//! - [`Container`] holds application-scoped singletons keyed by type
//!   (repositories, clients, settings).
//! - [`DependencyRegistry`] holds named, request-scoped [`Provider`]s. For
//!   each request the dispatcher opens a [`DependencyScope`] that resolves
//!   the route's declared dependencies depth-first, caches them for the
//!   rest of the request and runs their cleanups once the response is
//!   finalized.
//!
//! # Example
//!
//! ```rust,ignore
//! use fennec::di::{provider_fn, scoped};
//!
//! let app = Application::builder()
//!     .service(UserRepository::new())
//!     .dependency("settings", provider_fn(|cx| async move { cx.service::<Settings>() }))
//!     .dependency(
//!         "db",
//!         scoped(
//!             |cx| async move { Session::open(cx.get::<Settings>("settings")?).await },
//!             |session| async move { session.close().await },
//!         )
//!         .depends_on("settings"),
//!     );
//! ```

mod container;
mod provider;
mod registry;
mod scope;

pub use container::Container;
pub use provider::{
    Cleanup, DependencyContext, DependencyValue, FnProvider, Provider, Provision, ScopedProvider,
    provider_fn, scoped,
};
pub use registry::{DependencyRegistry, ProviderEntry};
pub use scope::DependencyScope;
