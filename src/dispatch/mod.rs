//! Request dispatch: method tables, canonical redirects, and panic recovery.
//!
//! A [`Dispatcher`] keeps one [`RouteTable`] per routable HTTP method. For
//! every request it:
//!
//! 1. canonicalizes the path (see [`canonicalize`]),
//! 2. picks the table for the request method,
//! 3. finds the first matching route,
//! 4. redirects to the canonical path (`301`) when the request path was not
//!    canonical, or executes the route otherwise.
//!
//! No table, or no match, yields a `404` through [`Context::emit_error`]. A
//! handler panic is caught, logged, and turned into a `500`.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::context::{Context, ErrorHook};
use crate::http::{Method, Request, Response, StatusCode};
use crate::router::{
    IntoPositionalHandler, PositionalRouter, Route, RouteError, RouteTable, Router,
};

pub mod canonical;
pub mod recover;

pub use canonical::canonicalize;

/// Routes requests to handlers by method and path.
///
/// Register routes through `&mut self` during startup, then share the
/// dispatcher read-only (for example inside an `Arc`) while serving.
///
/// # Examples
///
/// ```
/// use pathmux::context::Context;
/// use pathmux::http::{Method, Request, StatusCode};
/// use pathmux::Dispatcher;
///
/// let mut dispatcher = Dispatcher::new();
/// dispatcher
///     .pattern_route(
///         r"^/users/(?P<name>[a-z]+)/$",
///         |ctx: &mut Context| {
///             let name = ctx.param("name").unwrap_or_default().to_owned();
///             ctx.write(name);
///         },
///         &[Method::Get],
///     )
///     .unwrap();
///
/// let response = dispatcher.dispatch(Request::new(Method::Get, "/users/alice/"));
/// assert_eq!(response.status(), StatusCode::OK);
/// assert_eq!(response.text(), "alice");
///
/// let response = dispatcher.dispatch(Request::new(Method::Get, "/users/alice"));
/// assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
/// assert_eq!(response.headers().get("location"), Some("/users/alice/"));
/// ```
pub struct Dispatcher {
    tables: HashMap<Method, RouteTable>,
    error_hook: Option<ErrorHook>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    /// Creates a dispatcher with an empty table for each method in
    /// [`Method::ROUTABLE`] and no error hook.
    ///
    /// The first dispatcher in a process installs the panic hook that records
    /// handler panic locations; see [`recover`].
    pub fn new() -> Self {
        recover::install_hook();
        let tables = Method::ROUTABLE
            .into_iter()
            .map(|method| (method, RouteTable::new()))
            .collect();
        Self {
            tables,
            error_hook: None,
        }
    }

    /// Installs the hook offered every error response before the default
    /// status-and-reason body is written.
    ///
    /// The hook returns `true` when it wrote the response itself.
    pub fn error_hook<H>(&mut self, hook: H) -> &mut Self
    where
        H: Fn(&mut Context, u16) -> bool + Send + Sync + 'static,
    {
        self.error_hook = Some(Arc::new(hook));
        self
    }

    /// Registers `route` for each of `methods`, in order after the routes
    /// already registered for that method.
    ///
    /// Methods outside [`Method::ROUTABLE`] are logged and skipped; the route
    /// is still registered for the others.
    pub fn route(&mut self, route: impl Into<Arc<Route>>, methods: &[Method]) -> &mut Self {
        let route = route.into();
        for method in methods {
            match self.tables.get_mut(method) {
                Some(table) => table.push(Arc::clone(&route)),
                None => warn!(
                    %method,
                    path = route.path(),
                    "cannot route unsupported HTTP method"
                ),
            }
        }
        self
    }

    /// Registers a static route for `path`.
    pub fn static_route<H>(
        &mut self,
        path: impl Into<String>,
        handler: H,
        methods: &[Method],
    ) -> &mut Self
    where
        H: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.route(Route::static_path(path, handler), methods)
    }

    /// Registers a pattern route; named groups become [`Context::params`].
    ///
    /// # Errors
    ///
    /// [`RouteError::InvalidPattern`] when `pattern` does not compile.
    pub fn pattern_route<H>(
        &mut self,
        pattern: &str,
        handler: H,
        methods: &[Method],
    ) -> Result<&mut Self, RouteError>
    where
        H: Fn(&mut Context) + Send + Sync + 'static,
    {
        let route = Route::pattern(pattern, handler)?;
        Ok(self.route(route, methods))
    }

    /// Registers a positional route; capture groups become handler arguments.
    ///
    /// # Errors
    ///
    /// [`RouteError::InvalidPattern`] when `pattern` does not compile, and
    /// [`RouteError::ArityMismatch`] when the handler takes a different number
    /// of arguments than `pattern` has groups.
    pub fn positional_route<A, H>(
        &mut self,
        pattern: &str,
        handler: H,
        methods: &[Method],
    ) -> Result<&mut Self, RouteError>
    where
        H: IntoPositionalHandler<A>,
    {
        let route = Route::positional(pattern, handler)?;
        Ok(self.route(route, methods))
    }

    /// Starts registering static routes for `path`, one verb at a time.
    pub fn static_router(&mut self, path: impl Into<String>) -> Router<'_> {
        Router::static_path(self, path)
    }

    /// Starts registering pattern routes for `pattern`, one verb at a time.
    ///
    /// # Errors
    ///
    /// [`RouteError::InvalidPattern`] when `pattern` does not compile.
    pub fn pattern_router(&mut self, pattern: &str) -> Result<Router<'_>, RouteError> {
        Router::pattern(self, pattern)
    }

    /// Starts registering positional routes for `pattern`, one verb at a time.
    ///
    /// # Errors
    ///
    /// [`RouteError::InvalidPattern`] when `pattern` does not compile.
    pub fn positional_router(&mut self, pattern: &str) -> Result<PositionalRouter<'_>, RouteError> {
        PositionalRouter::new(self, pattern)
    }

    /// The table for `method`, if the method is routable.
    pub fn table(&self, method: &Method) -> Option<&RouteTable> {
        self.tables.get(method)
    }

    /// Dispatches `request` and returns the response it produced.
    ///
    /// Always yields exactly one response: a handler panic discards whatever
    /// the handler wrote and produces a `500` instead.
    pub fn dispatch(&self, request: Request) -> Response {
        let mut ctx = Context::new(request).with_error_hook(self.error_hook.clone());

        if let Err(panic) = recover::guard(|| self.serve(&mut ctx)) {
            panic.log();
            internal_error(&mut ctx);
        }

        ctx.into_response()
    }

    fn serve(&self, ctx: &mut Context) {
        let (path, is_canonical) = canonicalize(ctx.request().path());

        let Some(table) = self.tables.get(ctx.request().method()) else {
            debug!(method = %ctx.request().method(), "no route table for method");
            ctx.emit_error(StatusCode::NOT_FOUND);
            return;
        };

        match table.lookup(&path) {
            None => ctx.emit_error(StatusCode::NOT_FOUND),
            Some(route) if route.is_canonical() && !is_canonical => {
                debug!(from = ctx.request().path(), to = %path, "redirecting to canonical path");
                ctx.request_mut().set_path(path);
                let location = ctx.request().target();
                ctx.redirect_permanent(&location);
            }
            Some(route) => route.execute(ctx),
        }
    }
}

// Replaces a panicked handler's output with a 500. The error hook gets the
// first try; if it panics too, a plain 500 is written without it.
fn internal_error(ctx: &mut Context) {
    ctx.response_mut().reset();
    if let Err(panic) = recover::guard(|| ctx.emit_error(StatusCode::INTERNAL_SERVER_ERROR)) {
        panic.log();
        ctx.response_mut().reset();
        ctx.emit_error_with(StatusCode::INTERNAL_SERVER_ERROR, &[]);
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("tables", &self.tables)
            .field("error_hook", &self.error_hook.is_some())
            .finish()
    }
}
