//! The boundary function table as a trait.
//!
//! [`NativeLibrary`](super::NativeLibrary) implements it with symbols resolved
//! from the shared library; [`FakeNative`](crate::fake::FakeNative) implements
//! it in-process.

use std::ffi::c_void;
use std::sync::Arc;

use super::types::{ErrorCallback, RawSlice};

/// Shared handle to a boundary implementation. Every wrapper holds one, which
/// keeps the underlying library mapped while the wrapper is alive.
pub type Native = Arc<dyn NativeApi>;

/// The seven entry points exported by the native runtime.
///
/// # Safety
///
/// Implementors must honour the boundary contract: fallible calls invoke
/// `on_error` synchronously on the calling thread, at most once, and only on
/// failure; a handle or slice returned from a call that did not signal stays
/// valid until passed to the matching drop function exactly once.
pub unsafe trait NativeApi: Send + Sync {
    /// Where this implementation came from, for diagnostics.
    fn origin(&self) -> &str;

    /// # Safety
    /// `path` must reference readable bytes for the duration of the call.
    unsafe fn bundle_from_bundle(&self, path: RawSlice, on_error: ErrorCallback) -> *mut c_void;

    /// # Safety
    /// `path` must reference readable bytes for the duration of the call.
    unsafe fn bundle_from_path(&self, path: RawSlice, on_error: ErrorCallback) -> *mut c_void;

    /// # Safety
    /// `bundle` must be a live bundle handle from this implementation.
    unsafe fn bundle_create(
        &self,
        bundle: *mut c_void,
        config: RawSlice,
        on_error: ErrorCallback,
    ) -> *mut c_void;

    /// # Safety
    /// `bundle` must be live and is invalid afterwards.
    unsafe fn bundle_drop(&self, bundle: *mut c_void);

    /// # Safety
    /// `pipeline` must be live and is invalid afterwards.
    unsafe fn pipeline_drop(&self, pipeline: *mut c_void);

    /// # Safety
    /// `pipeline` must be live and not used concurrently.
    unsafe fn pipeline_forward(
        &self,
        pipeline: *mut c_void,
        input: RawSlice,
        on_error: ErrorCallback,
    ) -> RawSlice;

    /// # Safety
    /// `vec` must be a slice returned by `pipeline_forward` that was not
    /// released before.
    unsafe fn vec_drop(&self, vec: RawSlice);
}

impl std::fmt::Debug for dyn NativeApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeApi")
            .field("origin", &self.origin())
            .finish()
    }
}
