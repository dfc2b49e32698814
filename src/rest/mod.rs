//! JSON conveniences for REST-style handlers.
//!
//! [`wrap`] turns a handler returning `(status, body)` into a route handler
//! that serializes the body as JSON, or as JSONP when the client asks for a
//! `callback`. [`body`], [`json_body`] and [`json_map`] read request payloads
//! with a size cap.
//!
//! ```
//! use pathmux::context::Context;
//! use pathmux::http::{Method, Request, StatusCode};
//! use pathmux::{Dispatcher, rest};
//!
//! #[derive(serde::Serialize)]
//! struct Status {
//!     healthy: bool,
//! }
//!
//! let mut dispatcher = Dispatcher::new();
//! dispatcher.static_route(
//!     "/status/",
//!     rest::wrap(|_: &mut Context| (StatusCode::OK, Some(Status { healthy: true }))),
//!     &[Method::Get],
//! );
//!
//! let response = dispatcher.dispatch(Request::new(Method::Get, "/status/?callback=show"));
//! assert_eq!(response.text(), r#"show({"healthy":true})"#);
//! ```

use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::error;

use crate::context::Context;
use crate::http::{Method, StatusCode};

/// Largest request body [`body`] accepts (1 MiB).
pub const MAX_BODY_SIZE: usize = 1 << 20;

const APPLICATION_JSON: &str = "application/json";
const APPLICATION_JAVASCRIPT: &str = "application/javascript";

/// Errors raised while reading a request payload.
#[derive(Debug, Error)]
pub enum RestError {
    #[error("request body exceeds {max} bytes")]
    BodyTooLarge { max: usize },

    #[error("invalid JSON body: {0}")]
    Json(#[from] serde_json::Error),

    #[error("JSON body is not an object")]
    NotAnObject,
}

/// Adapts a `(status, body)` handler into a route handler.
///
/// The response is JSON when the `Accept` media type is `application/json`.
/// For any other `Accept` value a non-empty `callback` query parameter
/// switches to JSONP: `callback(<json>)` served as `application/javascript`.
///
/// A `None` body writes only the status, except under JSONP where it becomes
/// `callback(null)`. When the body fails to serialize the client gets a 500.
pub fn wrap<F, T>(handler: F) -> impl Fn(&mut Context) + Send + Sync + 'static
where
    F: Fn(&mut Context) -> (StatusCode, Option<T>) + Send + Sync + 'static,
    T: Serialize + 'static,
{
    move |ctx: &mut Context| respond(ctx, &handler)
}

fn respond<F, T>(ctx: &mut Context, handler: &F)
where
    F: Fn(&mut Context) -> (StatusCode, Option<T>),
    T: Serialize,
{
    let accept = media_type(ctx.request().headers().get("accept").unwrap_or(""));
    let callback = if accept == APPLICATION_JSON {
        None
    } else {
        ctx.request()
            .query_param("callback")
            .filter(|callback| !callback.is_empty())
            .map(str::to_owned)
    };

    let content_type = if callback.is_some() {
        APPLICATION_JAVASCRIPT
    } else {
        APPLICATION_JSON
    };
    ctx.response_mut().set_header("Content-Type", content_type);

    let (status, body) = handler(ctx);
    if body.is_none() && callback.is_none() {
        ctx.response_mut().write_header(status);
        return;
    }

    let json = match serde_json::to_vec(&body) {
        Ok(json) => json,
        Err(e) => {
            error!(error = %e, path = ctx.request().path(), "failed to serialize response body");
            ctx.response_mut().headers_mut().remove("content-type");
            ctx.emit_error(StatusCode::INTERNAL_SERVER_ERROR);
            return;
        }
    };

    let response = ctx.response_mut();
    response.write_header(status);
    match callback {
        Some(callback) => {
            response.write(callback);
            response.write("(");
            response.write(json);
            response.write(")");
        }
        None => response.write(json),
    }
}

// `text/html; q=0.9` -> `text/html`
fn media_type(value: &str) -> String {
    value
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// The request body of a `POST` or `PUT`; `None` for every other method.
///
/// # Errors
///
/// [`RestError::BodyTooLarge`] when the body exceeds [`MAX_BODY_SIZE`].
pub fn body(ctx: &Context) -> Result<Option<&Bytes>, RestError> {
    if !matches!(ctx.request().method(), Method::Post | Method::Put) {
        return Ok(None);
    }
    let body = ctx.request().body();
    if body.len() > MAX_BODY_SIZE {
        return Err(RestError::BodyTooLarge { max: MAX_BODY_SIZE });
    }
    Ok(Some(body))
}

/// Decodes the request body as JSON.
///
/// Methods without a body decode an empty document and therefore fail.
///
/// # Errors
///
/// [`RestError::BodyTooLarge`] or [`RestError::Json`].
pub fn json_body<T: DeserializeOwned>(ctx: &Context) -> Result<T, RestError> {
    let bytes = body(ctx)?.map_or(&[][..], |body| &body[..]);
    Ok(serde_json::from_slice(bytes)?)
}

/// Decodes the request body as a JSON object.
///
/// # Errors
///
/// Same as [`json_body`], plus [`RestError::NotAnObject`] for any other JSON
/// value.
pub fn json_map(ctx: &Context) -> Result<Map<String, Value>, RestError> {
    match json_body::<Value>(ctx)? {
        Value::Object(map) => Ok(map),
        _ => Err(RestError::NotAnObject),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde::Deserialize;

    use super::*;
    use crate::http::{Request, Response};

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct User {
        name: String,
        age: u8,
    }

    fn alice() -> User {
        User {
            name: "alice".into(),
            age: 30,
        }
    }

    fn run<F, T>(request: Request, handler: F) -> Response
    where
        F: Fn(&mut Context) -> (StatusCode, Option<T>) + Send + Sync + 'static,
        T: Serialize + 'static,
    {
        let mut ctx = Context::new(request);
        wrap(handler)(&mut ctx);
        ctx.into_response()
    }

    #[test]
    fn json_by_default() {
        let response = run(Request::new(Method::Get, "/"), |_: &mut Context| {
            (StatusCode::CREATED, Some(alice()))
        });
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers().get("content-type"), Some(APPLICATION_JSON));
        assert_eq!(response.text(), r#"{"name":"alice","age":30}"#);
    }

    #[test]
    fn jsonp_with_callback() {
        let response = run(Request::new(Method::Get, "/?callback=cb"), |_: &mut Context| {
            (StatusCode::OK, Some(vec![1, 2]))
        });
        assert_eq!(
            response.headers().get("content-type"),
            Some(APPLICATION_JAVASCRIPT)
        );
        assert_eq!(response.text(), "cb([1,2])");
    }

    #[test]
    fn jsonp_callback_is_decoded() {
        let response = run(Request::new(Method::Get, "/?callback=my%2Efn"), |_: &mut Context| {
            (StatusCode::OK, Some(true))
        });
        assert_eq!(response.text(), "my.fn(true)");
    }

    #[test]
    fn json_accept_ignores_callback() {
        let request = Request::new(Method::Get, "/?callback=cb")
            .with_header("Accept", "Application/JSON; charset=utf-8");
        let response = run(request, |_: &mut Context| (StatusCode::OK, Some(true)));
        assert_eq!(response.text(), "true");
    }

    #[test]
    fn empty_body_writes_status_only() {
        let response = run(Request::new(Method::Delete, "/"), |_: &mut Context| {
            (StatusCode::NO_CONTENT, None::<User>)
        });
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(response.payload().is_empty());
    }

    #[test]
    fn empty_body_with_callback_is_null() {
        let response = run(Request::new(Method::Get, "/?callback=cb"), |_: &mut Context| {
            (StatusCode::OK, None::<User>)
        });
        assert_eq!(response.text(), "cb(null)");
    }

    #[test]
    fn serialization_failure_is_500() {
        let response = run(Request::new(Method::Get, "/"), |_: &mut Context| {
            let mut map = HashMap::new();
            map.insert((1u8, 2u8), "tuple keys are not JSON");
            (StatusCode::OK, Some(map))
        });
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.text(), "Internal Server Error");
    }

    #[test]
    fn body_only_for_post_and_put() {
        let get = Context::new(Request::new(Method::Get, "/").with_body("ignored"));
        assert!(body(&get).unwrap().is_none());

        let put = Context::new(Request::new(Method::Put, "/").with_body("kept"));
        assert_eq!(body(&put).unwrap().map(|b| b.to_vec()), Some(b"kept".to_vec()));
    }

    #[test]
    fn body_size_capped() {
        let big = vec![b'x'; MAX_BODY_SIZE + 1];
        let ctx = Context::new(Request::new(Method::Post, "/").with_body(big));
        assert!(matches!(
            body(&ctx),
            Err(RestError::BodyTooLarge { max: MAX_BODY_SIZE })
        ));
    }

    #[test]
    fn decodes_typed_json() {
        let ctx = Context::new(
            Request::new(Method::Post, "/").with_body(r#"{"name":"alice","age":30}"#),
        );
        assert_eq!(json_body::<User>(&ctx).unwrap(), alice());
    }

    #[test]
    fn json_body_on_get_fails() {
        let ctx = Context::new(Request::new(Method::Get, "/"));
        assert!(matches!(json_body::<User>(&ctx), Err(RestError::Json(_))));
    }

    #[test]
    fn json_map_requires_object() {
        let ctx = Context::new(Request::new(Method::Post, "/").with_body(r#"{"a":1}"#));
        assert_eq!(json_map(&ctx).unwrap().get("a"), Some(&Value::from(1)));

        let ctx = Context::new(Request::new(Method::Post, "/").with_body("[1]"));
        assert!(matches!(json_map(&ctx), Err(RestError::NotAnObject)));
    }
}
