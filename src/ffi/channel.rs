//! Error Channel
//!
//! Native calls that can fail take an [`ErrorCallback`]. The callback here never
//! unwinds: it copies the message into a thread-local slot and returns, and
//! [`call`] turns a filled slot into an `Err` once the boundary call is back.

use std::cell::RefCell;
use std::ffi::c_void;

use super::types::ErrorCallback;

/// Message used when the native side signals with a null address.
pub const UNKNOWN_ERROR: &str = "Unknown error";

thread_local! {
    static PENDING: RefCell<Option<ErrorSignal>> = const { RefCell::new(None) };
}

/// A failure delivered through the error callback, copied out of native memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorSignal {
    message: Option<String>,
}

impl ErrorSignal {
    /// The decoded message, or [`UNKNOWN_ERROR`] for a null-address signal.
    pub fn message(&self) -> &str {
        self.message.as_deref().unwrap_or(UNKNOWN_ERROR)
    }

    pub fn is_unknown(&self) -> bool {
        self.message.is_none()
    }

    pub fn into_message(self) -> String {
        self.message.unwrap_or_else(|| UNKNOWN_ERROR.to_string())
    }
}

/// Run a boundary call with the channel's callback.
///
/// If the callback fired, the call's return value is discarded unread and the
/// first signal is returned instead.
pub fn call<T>(boundary: impl FnOnce(ErrorCallback) -> T) -> Result<T, ErrorSignal> {
    // a stale signal would otherwise be attributed to this call
    let _ = take_pending();
    let value = boundary(on_error);
    match take_pending() {
        Some(signal) => Err(signal),
        None => Ok(value),
    }
}

fn take_pending() -> Option<ErrorSignal> {
    PENDING
        .try_with(|slot| slot.try_borrow_mut().ok().and_then(|mut s| s.take()))
        .ok()
        .flatten()
}

/// The callback handed to native code.
///
/// # Safety
///
/// When `data` is non-null it must point at `len` readable bytes for the
/// duration of this invocation.
pub unsafe extern "C" fn on_error(data: *const c_void, len: usize) {
    let message = if data.is_null() {
        None
    } else {
        let bytes = std::slice::from_raw_parts(data as *const u8, len);
        Some(String::from_utf8_lossy(bytes).into_owned())
    };
    let _ = PENDING.try_with(|slot| {
        if let Ok(mut slot) = slot.try_borrow_mut() {
            if slot.is_none() {
                *slot = Some(ErrorSignal { message });
            }
        }
    });
}
