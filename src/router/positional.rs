//! Handlers that receive regex capture groups as positional arguments.

use std::fmt;
use std::sync::Arc;

use crate::context::Context;

type Fn0 = dyn Fn(&mut Context) + Send + Sync + 'static;
type Fn1 = dyn Fn(&mut Context, &str) + Send + Sync + 'static;
type Fn2 = dyn Fn(&mut Context, &str, &str) + Send + Sync + 'static;
type Fn3 = dyn Fn(&mut Context, &str, &str, &str) + Send + Sync + 'static;
type Fn4 = dyn Fn(&mut Context, &str, &str, &str, &str) + Send + Sync + 'static;

/// A handler taking between zero and four `&str` arguments after the context.
///
/// The arity is fixed when the handler is built, so a positional route can
/// check it against the number of capture groups once, at registration.
#[derive(Clone)]
pub enum PositionalHandler {
    Zero(Arc<Fn0>),
    One(Arc<Fn1>),
    Two(Arc<Fn2>),
    Three(Arc<Fn3>),
    Four(Arc<Fn4>),
}

impl PositionalHandler {
    /// Number of string arguments the handler expects.
    pub fn arity(&self) -> usize {
        match self {
            Self::Zero(_) => 0,
            Self::One(_) => 1,
            Self::Two(_) => 2,
            Self::Three(_) => 3,
            Self::Four(_) => 4,
        }
    }

    /// Invokes the handler. Missing arguments are passed as `""`.
    pub fn call(&self, ctx: &mut Context, args: &[&str]) {
        let arg = |i: usize| args.get(i).copied().unwrap_or("");
        match self {
            Self::Zero(f) => f(ctx),
            Self::One(f) => f(ctx, arg(0)),
            Self::Two(f) => f(ctx, arg(0), arg(1)),
            Self::Three(f) => f(ctx, arg(0), arg(1), arg(2)),
            Self::Four(f) => f(ctx, arg(0), arg(1), arg(2), arg(3)),
        }
    }
}

impl fmt::Debug for PositionalHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PositionalHandler")
            .field("arity", &self.arity())
            .finish()
    }
}

/// Marker for one `&str` argument in [`IntoPositionalHandler`] impls.
#[derive(Debug, Clone, Copy)]
pub struct Arg;

/// Conversion from plain closures into a [`PositionalHandler`].
///
/// `Args` is a marker tuple with one [`Arg`] per string argument; it only
/// exists so each closure arity gets its own impl. Closures need their
/// parameter types spelled out:
///
/// ```
/// use pathmux::context::Context;
/// use pathmux::router::{IntoPositionalHandler, PositionalHandler};
///
/// let handler = (|ctx: &mut Context, year: &str, slug: &str| {
///     ctx.write(format!("{year}/{slug}"));
/// })
/// .into_positional();
/// assert_eq!(handler.arity(), 2);
/// ```
pub trait IntoPositionalHandler<Args> {
    fn into_positional(self) -> PositionalHandler;
}

impl IntoPositionalHandler<PositionalHandler> for PositionalHandler {
    fn into_positional(self) -> PositionalHandler {
        self
    }
}

impl<F> IntoPositionalHandler<()> for F
where
    F: Fn(&mut Context) + Send + Sync + 'static,
{
    fn into_positional(self) -> PositionalHandler {
        PositionalHandler::Zero(Arc::new(self))
    }
}

impl<F> IntoPositionalHandler<(Arg,)> for F
where
    F: Fn(&mut Context, &str) + Send + Sync + 'static,
{
    fn into_positional(self) -> PositionalHandler {
        PositionalHandler::One(Arc::new(self))
    }
}

impl<F> IntoPositionalHandler<(Arg, Arg)> for F
where
    F: Fn(&mut Context, &str, &str) + Send + Sync + 'static,
{
    fn into_positional(self) -> PositionalHandler {
        PositionalHandler::Two(Arc::new(self))
    }
}

impl<F> IntoPositionalHandler<(Arg, Arg, Arg)> for F
where
    F: Fn(&mut Context, &str, &str, &str) + Send + Sync + 'static,
{
    fn into_positional(self) -> PositionalHandler {
        PositionalHandler::Three(Arc::new(self))
    }
}

impl<F> IntoPositionalHandler<(Arg, Arg, Arg, Arg)> for F
where
    F: Fn(&mut Context, &str, &str, &str, &str) + Send + Sync + 'static,
{
    fn into_positional(self) -> PositionalHandler {
        PositionalHandler::Four(Arc::new(self))
    }
}
