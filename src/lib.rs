//! # pathmux
//!
//! A small HTTP/1.1 request multiplexer. Requests are matched by method and
//! path against static routes, regex routes with named captures, or regex
//! routes whose captures become positional handler arguments.
//!
//! Paths are canonicalized before lookup (`/a/./b` becomes `/a/b/`); a
//! request for a non-canonical path that matches a route is redirected to
//! the canonical one with `301 Moved Permanently`. Handler panics are caught
//! at the dispatcher and answered with `500 Internal Server Error`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pathmux::context::Context;
//! use pathmux::http::Method;
//! use pathmux::{Dispatcher, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut dispatcher = Dispatcher::new();
//!     dispatcher.static_route("/", |ctx: &mut Context| ctx.write("Hello, World!"), &[Method::Get]);
//!     dispatcher.pattern_route(
//!         r"^/hello/(?P<name>[a-z]+)/$",
//!         |ctx: &mut Context| {
//!             let greeting = format!("Hello, {}!", ctx.param("name").unwrap_or_default());
//!             ctx.write(greeting);
//!         },
//!         &[Method::Get],
//!     )?;
//!     dispatcher.positional_route(
//!         r"^/add/(\d+)/(\d+)/$",
//!         |ctx: &mut Context, a: &str, b: &str| {
//!             let sum: u64 = a.parse::<u64>().unwrap_or(0) + b.parse::<u64>().unwrap_or(0);
//!             ctx.write(sum.to_string());
//!         },
//!         &[Method::Get],
//!     )?;
//!
//!     Server::bind("127.0.0.1:8080").await?.serve(dispatcher).await?;
//!     Ok(())
//! }
//! ```

pub mod context;
pub mod dispatch;
pub mod http;
pub mod rest;
pub mod router;
pub mod server;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use context::{Context, ErrorHook, Params};
pub use dispatch::{Dispatcher, canonicalize};
pub use http::{Headers, Method, Request, Response, ResponseWriter, StatusCode};
pub use router::{PositionalRouter, Route, RouteError, RouteTable, Router};
pub use server::{Listener, Server, ServerError};

/// Crate version, as published.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
