//! Route registration and matching.
//!
//! Routes are compiled into a segment trie at startup. Matching walks the
//! trie static-first: at every depth a literal segment is tried before a
//! parameter, and a dead end backtracks into the parameter branch. This
//! keeps `/users/me` from being shadowed by `/users/{id}`.

mod error;
mod pattern;
mod route;
mod router;
mod table;

pub use error::RouteError;
pub use pattern::{PathPattern, Segment, join_paths};
pub use route::{Route, RouteInfo};
pub use router::Router;
pub use table::{Lookup, RouteEntry, RouteTable};
