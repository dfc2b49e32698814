//! Routes and the tables that hold them.
//!
//! A [`Route`] binds a path to a synchronous handler using one of three
//! strategies:
//!
//! | Strategy     | Example                         | Handler signature                          |
//! |--------------|---------------------------------|--------------------------------------------|
//! | static       | `/blog/`                        | `Fn(&mut Context)`                         |
//! | pattern      | `^/users/(?P<name>[a-z]+)/$`    | `Fn(&mut Context)`, reads `ctx.param(..)`  |
//! | positional   | `^/(\d{4})/([a-z-]+)/$`         | `Fn(&mut Context, &str, &str)`             |
//!
//! Routes are grouped per HTTP method in a [`RouteTable`], scanned in
//! registration order. [`Router`] and [`PositionalRouter`] register one path
//! under several verbs.

use std::sync::Arc;

use thiserror::Error;

use crate::context::Context;

pub mod builder;
pub mod positional;
pub mod route;
pub mod table;

pub use builder::{PositionalRouter, Router};
pub use positional::{Arg, IntoPositionalHandler, PositionalHandler};
pub use route::Route;
pub use table::RouteTable;

/// Type-erased route handler.
///
/// Handlers write their response through the context; they return nothing.
pub type Handler = Arc<dyn Fn(&mut Context) + Send + Sync + 'static>;

/// Errors raised while building routes.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("invalid route pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error(
        "pattern `{pattern}` has {groups} capture group(s) but its handler takes {arity} argument(s)"
    )]
    ArityMismatch {
        pattern: String,
        groups: usize,
        arity: usize,
    },
}
