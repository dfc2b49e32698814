//! Per-request context handed to every route handler.
//!
//! A [`Context`] bundles the inbound [`Request`], the outbound
//! [`ResponseWriter`], the [`Params`] a pattern route extracted from the path,
//! and the dispatcher's error hook so handlers can emit errors the same way the
//! dispatcher does.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::http::{Request, Response, ResponseWriter, StatusCode};

/// Callback that may take over error responses.
///
/// Receives the context and the raw status code passed to
/// [`Context::emit_error`]; returning `true` means the hook wrote the response
/// itself and nothing else is written.
pub type ErrorHook = Arc<dyn Fn(&mut Context, u16) -> bool + Send + Sync + 'static>;

/// Highest status [`Context::emit_error`] writes as given; anything above is coerced to 500.
const MAX_ERROR_STATUS: u16 = 505;

/// Path parameters extracted from the matched route
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct Params {
    map: HashMap<String, String>,
}

impl Params {
    /// Create a new empty parameters map
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    /// Insert a value into the parameters map
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.map.insert(key.into(), value.into());
    }

    /// Get a value from the parameters map
    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(String::as_str)
    }

    /// Remove a value from the parameters map
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.map.remove(key)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.map.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K, V> FromIterator<(K, V)> for Params
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            map: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Per-request state: request, response sink, and route data.
///
/// Handlers receive `&mut Context`; the dispatcher keeps ownership so the
/// response survives a handler panic.
///
/// # Examples
///
/// ```
/// use pathmux::context::Context;
/// use pathmux::http::{Method, Request, StatusCode};
///
/// let mut ctx = Context::new(Request::new(Method::Get, "/missing/"));
/// ctx.emit_error(StatusCode::NOT_FOUND);
///
/// let response = ctx.into_response();
/// assert_eq!(response.status(), StatusCode::NOT_FOUND);
/// assert_eq!(response.text(), "Not Found");
/// ```
pub struct Context {
    request: Request,
    response: ResponseWriter,
    params: Params,
    error_hook: Option<ErrorHook>,
}

impl Context {
    /// Create a new context from a request
    pub fn new(request: Request) -> Self {
        Self {
            request,
            response: ResponseWriter::new(),
            params: Params::new(),
            error_hook: None,
        }
    }

    /// Attaches the hook consulted by [`emit_error`](Self::emit_error).
    #[must_use]
    pub fn with_error_hook(mut self, hook: Option<ErrorHook>) -> Self {
        self.error_hook = hook;
        self
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn request_mut(&mut self) -> &mut Request {
        &mut self.request
    }

    pub fn response(&self) -> &ResponseWriter {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut ResponseWriter {
        &mut self.response
    }

    /// Route data extracted by a pattern route; empty for other routes.
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Shorthand for `self.params().get(name)`.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    /// Replaces the route data.
    pub fn set_params(&mut self, params: Params) {
        self.params = params;
    }

    /// Appends to the response body (status defaults to 200).
    pub fn write(&mut self, data: impl AsRef<[u8]>) {
        self.response.write(data);
    }

    /// Deserializes the request body as JSON.
    pub fn json<T>(&self) -> Result<T, serde_json::Error>
    where
        T: serde::de::DeserializeOwned,
    {
        serde_json::from_slice(self.request.body())
    }

    /// Redirects with `302 Found`.
    pub fn redirect(&mut self, location: &str) {
        self.redirect_with(StatusCode::FOUND, location);
    }

    /// Redirects with `301 Moved Permanently`.
    pub fn redirect_permanent(&mut self, location: &str) {
        self.redirect_with(StatusCode::MOVED_PERMANENTLY, location);
    }

    fn redirect_with(&mut self, status: StatusCode, location: &str) {
        self.response.set_header("Location", location);
        self.response.write_header(status);
    }

    /// Writes an error response for `status`.
    ///
    /// The error hook, when present, is offered the response first. Otherwise
    /// (or when the hook declines) the status is written followed by its reason
    /// phrase. Codes outside 100–505 are written as 500.
    ///
    /// Not idempotent: call it at most once per request.
    pub fn emit_error(&mut self, status: impl Into<u16>) {
        let code = status.into();
        if let Some(hook) = self.error_hook.clone() {
            if hook(self, code) {
                return;
            }
        }
        self.write_error(code, &[]);
    }

    /// Writes an error response with an explicit body.
    ///
    /// The error hook is never consulted. With an empty `messages` slice the
    /// reason phrase is written, otherwise every fragment in order with no
    /// separator.
    pub fn emit_error_with(&mut self, status: impl Into<u16>, messages: &[&str]) {
        self.write_error(status.into(), messages);
    }

    fn write_error(&mut self, code: u16, messages: &[&str]) {
        let status = StatusCode::from_u16(code)
            .filter(|status| status.as_u16() <= MAX_ERROR_STATUS)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        self.response.write_header(status);
        if messages.is_empty() {
            self.response.write(status.canonical_reason());
        } else {
            for message in messages {
                self.response.write(message);
            }
        }
    }

    /// Finishes the request, converting the buffered writes into a [`Response`].
    pub fn into_response(self) -> Response {
        self.response.into_response()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("request", &self.request)
            .field("response", &self.response)
            .field("params", &self.params)
            .field("error_hook", &self.error_hook.is_some())
            .finish()
    }
}
