//! Fluent registration of one path under several HTTP verbs.
//!
//! ```
//! use pathmux::context::Context;
//! use pathmux::Dispatcher;
//!
//! let mut dispatcher = Dispatcher::new();
//! dispatcher
//!     .static_router("/posts/")
//!     .get(|ctx: &mut Context| ctx.write("list"))
//!     .post(|ctx: &mut Context| ctx.write("create"));
//! ```

use regex::Regex;

use super::{IntoPositionalHandler, Route, RouteError};
use crate::context::Context;
use crate::dispatch::Dispatcher;
use crate::http::Method;

// How each verb's route is built from the shared path.
enum Strategy {
    Static(String),
    Pattern(Regex),
}

/// Registers static or pattern routes for one path, one verb at a time.
///
/// Each verb method builds a new [`Route`] and registers it for that verb
/// only. The pattern is compiled once, when the router is created.
pub struct Router<'d> {
    dispatcher: &'d mut Dispatcher,
    strategy: Strategy,
}

impl<'d> Router<'d> {
    pub(crate) fn static_path(dispatcher: &'d mut Dispatcher, path: impl Into<String>) -> Self {
        Self {
            dispatcher,
            strategy: Strategy::Static(path.into()),
        }
    }

    pub(crate) fn pattern(dispatcher: &'d mut Dispatcher, pattern: &str) -> Result<Self, RouteError> {
        Ok(Self {
            dispatcher,
            strategy: Strategy::Pattern(Regex::new(pattern)?),
        })
    }

    fn register<H>(self, method: Method, handler: H) -> Self
    where
        H: Fn(&mut Context) + Send + Sync + 'static,
    {
        let route = match &self.strategy {
            Strategy::Static(path) => Route::static_path(path.clone(), handler),
            Strategy::Pattern(pattern) => Route::with_regex(pattern.clone(), handler),
        };
        self.dispatcher.route(route, &[method]);
        self
    }

    pub fn options<H>(self, handler: H) -> Self
    where
        H: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.register(Method::Options, handler)
    }

    pub fn get<H>(self, handler: H) -> Self
    where
        H: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.register(Method::Get, handler)
    }

    pub fn head<H>(self, handler: H) -> Self
    where
        H: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.register(Method::Head, handler)
    }

    pub fn post<H>(self, handler: H) -> Self
    where
        H: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.register(Method::Post, handler)
    }

    pub fn put<H>(self, handler: H) -> Self
    where
        H: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.register(Method::Put, handler)
    }

    pub fn delete<H>(self, handler: H) -> Self
    where
        H: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.register(Method::Delete, handler)
    }

    pub fn trace<H>(self, handler: H) -> Self
    where
        H: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.register(Method::Trace, handler)
    }

    pub fn connect<H>(self, handler: H) -> Self
    where
        H: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.register(Method::Connect, handler)
    }
}

/// Registers positional routes for one pattern, one verb at a time.
///
/// Unlike [`Router`], every verb method can fail: the handler's argument
/// count is checked against the pattern's capture groups.
pub struct PositionalRouter<'d> {
    dispatcher: &'d mut Dispatcher,
    pattern: Regex,
}

impl<'d> PositionalRouter<'d> {
    pub(crate) fn new(dispatcher: &'d mut Dispatcher, pattern: &str) -> Result<Self, RouteError> {
        Ok(Self {
            dispatcher,
            pattern: Regex::new(pattern)?,
        })
    }

    fn register<A, H>(self, method: Method, handler: H) -> Result<Self, RouteError>
    where
        H: IntoPositionalHandler<A>,
    {
        let route = Route::positional_with_regex(self.pattern.clone(), handler)?;
        self.dispatcher.route(route, &[method]);
        Ok(self)
    }

    pub fn options<A, H: IntoPositionalHandler<A>>(self, handler: H) -> Result<Self, RouteError> {
        self.register(Method::Options, handler)
    }

    pub fn get<A, H: IntoPositionalHandler<A>>(self, handler: H) -> Result<Self, RouteError> {
        self.register(Method::Get, handler)
    }

    pub fn head<A, H: IntoPositionalHandler<A>>(self, handler: H) -> Result<Self, RouteError> {
        self.register(Method::Head, handler)
    }

    pub fn post<A, H: IntoPositionalHandler<A>>(self, handler: H) -> Result<Self, RouteError> {
        self.register(Method::Post, handler)
    }

    pub fn put<A, H: IntoPositionalHandler<A>>(self, handler: H) -> Result<Self, RouteError> {
        self.register(Method::Put, handler)
    }

    pub fn delete<A, H: IntoPositionalHandler<A>>(self, handler: H) -> Result<Self, RouteError> {
        self.register(Method::Delete, handler)
    }

    pub fn trace<A, H: IntoPositionalHandler<A>>(self, handler: H) -> Result<Self, RouteError> {
        self.register(Method::Trace, handler)
    }

    pub fn connect<A, H: IntoPositionalHandler<A>>(self, handler: H) -> Result<Self, RouteError> {
        self.register(Method::Connect, handler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{Request, StatusCode};

    fn send(dispatcher: &Dispatcher, method: Method, path: &str) -> (StatusCode, String) {
        let response = dispatcher.dispatch(Request::new(method, path));
        (response.status(), response.text())
    }

    #[test]
    fn static_router_registers_each_verb_separately() {
        let mut dispatcher = Dispatcher::new();
        dispatcher
            .static_router("/posts/")
            .get(|ctx: &mut Context| ctx.write("list"))
            .post(|ctx: &mut Context| ctx.write("create"));

        assert_eq!(send(&dispatcher, Method::Get, "/posts/").1, "list");
        assert_eq!(send(&dispatcher, Method::Post, "/posts/").1, "create");
        assert_eq!(
            send(&dispatcher, Method::Put, "/posts/").0,
            StatusCode::NOT_FOUND
        );
        assert_eq!(dispatcher.table(&Method::Get).map(|t| t.len()), Some(1));
        assert_eq!(dispatcher.table(&Method::Post).map(|t| t.len()), Some(1));
    }

    #[test]
    fn pattern_router_shares_one_pattern() {
        let mut dispatcher = Dispatcher::new();
        dispatcher
            .pattern_router(r"^/users/(?P<name>[a-z]+)/$")
            .unwrap()
            .get(|ctx: &mut Context| {
                let name = ctx.param("name").unwrap_or_default().to_owned();
                ctx.write(name);
            })
            .delete(|ctx: &mut Context| ctx.write("gone"));

        assert_eq!(send(&dispatcher, Method::Get, "/users/alice/").1, "alice");
        assert_eq!(send(&dispatcher, Method::Delete, "/users/bob/").1, "gone");
    }

    #[test]
    fn pattern_router_rejects_bad_regex() {
        let mut dispatcher = Dispatcher::new();
        assert!(matches!(
            dispatcher.pattern_router("(").err(),
            Some(RouteError::InvalidPattern(_))
        ));
    }

    #[test]
    fn positional_router_checks_every_handler() -> Result<(), RouteError> {
        let mut dispatcher = Dispatcher::new();
        let router = dispatcher
            .positional_router(r"^/(\d+)/$")?
            .get(|ctx: &mut Context, id: &str| ctx.write(id))?;

        let err = router
            .put(|_: &mut Context, _: &str, _: &str| {})
            .err();
        assert!(matches!(err, Some(RouteError::ArityMismatch { .. })));

        assert_eq!(send(&dispatcher, Method::Get, "/7/").1, "7");
        assert_eq!(
            send(&dispatcher, Method::Put, "/7/").0,
            StatusCode::NOT_FOUND
        );
        Ok(())
    }
}
