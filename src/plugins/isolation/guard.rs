// src/plugins/isolation/guard.rs
use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;

use futures::FutureExt;

thread_local! {
    // Backtrace taken at the panic site by the hook, consumed by the guard that
    // catches the unwind on the same thread.
    static PANIC_BACKTRACE: RefCell<Option<String>> = RefCell::new(None);
}

static HOOK: Once = Once::new();

/// Installs (once per process) a panic hook that records the faulting
/// backtrace before delegating to the previously installed hook.
pub fn install_panic_hook() {
    HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let backtrace = Backtrace::force_capture().to_string();
            PANIC_BACKTRACE.with(|slot| {
                if let Ok(mut slot) = slot.try_borrow_mut() {
                    *slot = Some(backtrace);
                }
            });
            previous(info);
        }));
    });
}

fn take_backtrace() -> Option<String> {
    PANIC_BACKTRACE.with(|slot| slot.try_borrow_mut().ok().and_then(|mut s| s.take()))
}

/// A panic converted into data.
#[derive(Debug, Clone)]
pub struct PanicReport {
    pub message: String,
    pub backtrace: String,
}

impl PanicReport {
    pub fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };

        // Without the hook the best we have is the stack of the catching frame.
        let backtrace =
            take_backtrace().unwrap_or_else(|| Backtrace::force_capture().to_string());

        Self { message, backtrace }
    }
}

impl fmt::Display for PanicReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Polls `task` to completion, turning a panic into a `PanicReport`.
pub async fn catch_panic<F>(task: F) -> Result<F::Output, PanicReport>
where
    F: Future,
{
    AssertUnwindSafe(task)
        .catch_unwind()
        .await
        .map_err(PanicReport::from_payload)
}
