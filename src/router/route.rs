//! A single path-to-handler binding.

use std::fmt;
use std::sync::Arc;

use regex::Regex;

use super::positional::{IntoPositionalHandler, PositionalHandler};
use super::{Handler, RouteError};
use crate::context::{Context, Params};

/// One endpoint: a matching strategy plus the handler it leads to.
///
/// | Variant      | Matches when                        | Handler receives                    |
/// |--------------|-------------------------------------|-------------------------------------|
/// | `Static`     | the path equals `path` exactly      | the context                         |
/// | `Pattern`    | the regex matches anywhere in path  | the context, named groups as params |
/// | `Positional` | the regex matches anywhere in path  | the context plus every group, in order |
///
/// Regexes are not anchored implicitly; use `^` and `$` for whole-path
/// matches.
pub enum Route {
    Static { path: String, handler: Handler },
    Pattern { pattern: Regex, handler: Handler },
    Positional { pattern: Regex, handler: PositionalHandler },
}

impl Route {
    /// Builds a route matching exactly `path`.
    pub fn static_path<H>(path: impl Into<String>, handler: H) -> Self
    where
        H: Fn(&mut Context) + Send + Sync + 'static,
    {
        Self::Static {
            path: path.into(),
            handler: Arc::new(handler),
        }
    }

    /// Compiles `pattern` and builds a route exposing its named groups as
    /// [`Params`].
    ///
    /// # Errors
    ///
    /// [`RouteError::InvalidPattern`] when `pattern` is not a valid regex.
    pub fn pattern<H>(pattern: &str, handler: H) -> Result<Self, RouteError>
    where
        H: Fn(&mut Context) + Send + Sync + 'static,
    {
        Ok(Self::with_regex(Regex::new(pattern)?, handler))
    }

    /// Same as [`pattern`](Self::pattern), for an already compiled regex.
    pub fn with_regex<H>(pattern: Regex, handler: H) -> Self
    where
        H: Fn(&mut Context) + Send + Sync + 'static,
    {
        Self::Pattern {
            pattern,
            handler: Arc::new(handler),
        }
    }

    /// Compiles `pattern` and builds a route passing its capture groups to
    /// `handler` as positional arguments.
    ///
    /// ```
    /// use pathmux::context::Context;
    /// use pathmux::router::Route;
    ///
    /// let route = Route::positional(r"^/(\d{4})/([a-z-]+)/$", |ctx: &mut Context, year: &str, slug: &str| {
    ///     ctx.write(format!("{slug} ({year})"));
    /// })
    /// .unwrap();
    /// assert!(route.matches("/2013/hello-world/"));
    /// ```
    ///
    /// # Errors
    ///
    /// [`RouteError::InvalidPattern`] when `pattern` is not a valid regex, and
    /// [`RouteError::ArityMismatch`] when its group count differs from the
    /// handler's argument count.
    pub fn positional<A, H>(pattern: &str, handler: H) -> Result<Self, RouteError>
    where
        H: IntoPositionalHandler<A>,
    {
        Self::positional_with_regex(Regex::new(pattern)?, handler)
    }

    /// Same as [`positional`](Self::positional), for an already compiled regex.
    ///
    /// # Errors
    ///
    /// [`RouteError::ArityMismatch`] when the group count differs from the
    /// handler's argument count.
    pub fn positional_with_regex<A, H>(pattern: Regex, handler: H) -> Result<Self, RouteError>
    where
        H: IntoPositionalHandler<A>,
    {
        let handler = handler.into_positional();
        // Group 0 is the whole match.
        let groups = pattern.captures_len() - 1;
        if groups != handler.arity() {
            return Err(RouteError::ArityMismatch {
                pattern: pattern.as_str().to_owned(),
                groups,
                arity: handler.arity(),
            });
        }
        Ok(Self::Positional { pattern, handler })
    }

    /// The literal path or the regex source.
    pub fn path(&self) -> &str {
        match self {
            Self::Static { path, .. } => path.as_str(),
            Self::Pattern { pattern, .. } | Self::Positional { pattern, .. } => pattern.as_str(),
        }
    }

    /// Whether a non-canonical request path matching this route is redirected
    /// to its canonical form instead of being executed.
    pub fn is_canonical(&self) -> bool {
        match self {
            Self::Static { .. } | Self::Pattern { .. } | Self::Positional { .. } => true,
        }
    }

    pub fn matches(&self, path: &str) -> bool {
        match self {
            Self::Static { path: own, .. } => own == path,
            Self::Pattern { pattern, .. } | Self::Positional { pattern, .. } => {
                pattern.is_match(path)
            }
        }
    }

    /// Runs the handler against the context's request path.
    pub fn execute(&self, ctx: &mut Context) {
        match self {
            Self::Static { handler, .. } => handler(ctx),
            Self::Pattern { pattern, handler } => {
                let params = named_groups(pattern, ctx.request().path());
                ctx.set_params(params);
                handler(ctx);
            }
            Self::Positional { pattern, handler } => {
                let args = positional_groups(pattern, ctx.request().path());
                let args: Vec<&str> = args.iter().map(String::as_str).collect();
                handler.call(ctx, &args);
            }
        }
    }
}

// Named groups of the first match; groups that did not take part map to "".
fn named_groups(pattern: &Regex, path: &str) -> Params {
    let Some(captures) = pattern.captures(path) else {
        return Params::new();
    };
    pattern
        .capture_names()
        .flatten()
        .map(|name| (name, captures.name(name).map_or("", |m| m.as_str())))
        .collect()
}

// Every group of the first match, left to right, "" for non-participating ones.
fn positional_groups(pattern: &Regex, path: &str) -> Vec<String> {
    match pattern.captures(path) {
        Some(captures) => captures
            .iter()
            .skip(1)
            .map(|group| group.map_or_else(String::new, |m| m.as_str().to_owned()))
            .collect(),
        None => Vec::new(),
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Self::Static { .. } => "Static",
            Self::Pattern { .. } => "Pattern",
            Self::Positional { .. } => "Positional",
        };
        f.debug_struct(kind).field("path", &self.path()).finish()
    }
}
