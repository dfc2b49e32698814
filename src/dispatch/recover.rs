//! The panic boundary around every dispatched request.
//!
//! [`guard`] runs a closure under `catch_unwind`. While a guard is active on
//! the current thread, the process panic hook records the panic location and
//! a backtrace so the dispatcher can log them through `tracing` alongside the
//! request.
//!
//! The recording hook wraps whichever hook was installed when the first
//! [`Dispatcher`](crate::Dispatcher) was created, and passes every panic on
//! to it after recording. A hook set later replaces the recorder; handler
//! panics are still caught, only without location and backtrace.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;

use tracing::error;

thread_local! {
    static GUARDED: Cell<bool> = const { Cell::new(false) };
    static LAST_PANIC: RefCell<Option<Captured>> = const { RefCell::new(None) };
}

static INSTALL_HOOK: Once = Once::new();

struct Captured {
    location: Option<String>,
    backtrace: Backtrace,
}

/// A panic caught by [`guard`].
#[derive(Debug)]
pub struct HandlerPanic {
    message: String,
    location: Option<String>,
    backtrace: Option<Backtrace>,
}

impl HandlerPanic {
    fn new(payload: Box<dyn Any + Send>, captured: Option<Captured>) -> Self {
        let message = if let Some(text) = payload.downcast_ref::<&str>() {
            (*text).to_owned()
        } else if let Some(text) = payload.downcast_ref::<String>() {
            text.clone()
        } else {
            "non-string panic payload".to_owned()
        };
        let (location, backtrace) = match captured {
            Some(Captured {
                location,
                backtrace,
            }) => (location, Some(backtrace)),
            None => (None, None),
        };
        Self {
            message,
            location,
            backtrace,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// `file:line:column` of the panic, when the hook saw it.
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    /// Logs the panic at error level, one line per backtrace frame, between
    /// start and end markers.
    pub fn log(&self) {
        error!("---------- handler panic ----------");
        error!(message = %self.message, "handler panicked");
        if let Some(location) = &self.location {
            error!(%location, "panic location");
        }
        if let Some(backtrace) = &self.backtrace {
            for frame in backtrace.to_string().lines() {
                error!("{frame}");
            }
        }
        error!("-------- end handler panic --------");
    }
}

/// Runs `f`, turning a panic into [`HandlerPanic`].
///
/// Guards nest: an inner guard restores the outer one's state when it returns.
pub fn guard<R>(f: impl FnOnce() -> R) -> Result<R, HandlerPanic> {
    install_hook();

    // A panic the closure caught itself must not be reported as ours.
    LAST_PANIC.with(|slot| *slot.borrow_mut() = None);

    let outer = GUARDED.with(|guarded| guarded.replace(true));
    let result = panic::catch_unwind(AssertUnwindSafe(f));
    GUARDED.with(|guarded| guarded.set(outer));

    let captured = LAST_PANIC.with(|slot| slot.borrow_mut().take());
    result.map_err(|payload| HandlerPanic::new(payload, captured))
}

/// Installs the recording panic hook, once per process.
pub(crate) fn install_hook() {
    INSTALL_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if GUARDED.with(Cell::get) {
                let captured = Captured {
                    location: info.location().map(ToString::to_string),
                    backtrace: Backtrace::force_capture(),
                };
                LAST_PANIC.with(|slot| *slot.borrow_mut() = Some(captured));
            }
            previous(info);
        }));
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn swallowed() {
        panic!("swallowed");
    }

    #[test]
    fn panic_caught_inside_guard_leaves_nothing_behind() {
        let caught = guard(|| panic::catch_unwind(swallowed).is_err()).unwrap();
        assert!(caught);
        assert!(LAST_PANIC.with(|slot| slot.borrow().is_none()));

        let err = guard::<()>(|| panic!("real")).unwrap_err();
        assert_eq!(err.message(), "real");
        assert!(err.location().is_some_and(|location| location.contains("recover.rs")));
    }

    #[test]
    fn passes_through_return_value() {
        assert_eq!(guard(|| 21 * 2).unwrap(), 42);
    }

    #[test]
    fn captures_str_and_string_payloads() {
        let err = guard::<()>(|| panic!("boom")).unwrap_err();
        assert_eq!(err.message(), "boom");

        let id = 7;
        let err = guard::<()>(|| panic!("handler {id} failed")).unwrap_err();
        assert_eq!(err.message(), "handler 7 failed");
    }

    #[test]
    fn records_location() {
        let err = guard::<()>(|| panic!("here")).unwrap_err();
        let location = err.location().unwrap();
        assert!(location.contains("recover.rs"), "{location}");
        err.log();
    }

    #[test]
    fn guards_nest() {
        let outer = guard(|| {
            let inner = guard::<()>(|| panic!("inner"));
            assert_eq!(inner.unwrap_err().message(), "inner");
            GUARDED.with(Cell::get)
        });
        assert!(outer.unwrap());
        assert!(!GUARDED.with(Cell::get));
    }
}
