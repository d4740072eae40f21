//! Owned native handles and the shared disposal state machine.
//!
//! Each role gets its own non-`Copy` handle type whose release goes to exactly
//! one drop function, so a bundle handle can never reach `PipelineHandle_drop`.
//! [`Owned`] pairs a handle with a Live/Disposed flag; the transition happens
//! once, through an atomic swap, whichever trigger gets there first.

use std::ffi::c_void;
use std::mem::ManuallyDrop;
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::trace;

use crate::error::{Error, Result};
use crate::ffi::{Native, NativeApi, RawSlice};

/// A native resource released through one specific boundary call.
pub(crate) trait NativeHandle {
    /// Name used in `Disposed` errors and logs.
    const KIND: &'static str;

    /// Hand the resource back to the native side.
    ///
    /// # Safety
    ///
    /// Must be called at most once per handle, with the implementation that
    /// produced it.
    unsafe fn release(self, native: &dyn NativeApi);
}

/// A compiled bundle.
#[derive(Debug)]
pub(crate) struct RawBundle(NonNull<c_void>);

/// A configured pipeline.
#[derive(Debug)]
pub(crate) struct RawPipeline(NonNull<c_void>);

/// A result buffer allocated by the native side.
#[derive(Debug)]
pub(crate) struct RawBuffer {
    data: NonNull<c_void>,
    len: usize,
}

impl RawBundle {
    pub(crate) fn new(ptr: *mut c_void) -> Option<Self> {
        NonNull::new(ptr).map(Self)
    }

    pub(crate) fn as_ptr(&self) -> *mut c_void {
        self.0.as_ptr()
    }
}

impl RawPipeline {
    pub(crate) fn new(ptr: *mut c_void) -> Option<Self> {
        NonNull::new(ptr).map(Self)
    }

    pub(crate) fn as_ptr(&self) -> *mut c_void {
        self.0.as_ptr()
    }
}

impl RawBuffer {
    pub(crate) fn new(slice: RawSlice) -> Option<Self> {
        NonNull::new(slice.data).map(|data| Self {
            data,
            len: slice.len,
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Copy the buffer into memory owned by the caller.
    ///
    /// # Safety
    ///
    /// The buffer must not have been released.
    pub(crate) unsafe fn to_vec(&self) -> Vec<u8> {
        self.as_slice().as_bytes().to_vec()
    }

    fn as_slice(&self) -> RawSlice {
        RawSlice {
            data: self.data.as_ptr(),
            len: self.len,
        }
    }
}

impl NativeHandle for RawBundle {
    const KIND: &'static str = "Bundle";

    unsafe fn release(self, native: &dyn NativeApi) {
        native.bundle_drop(self.as_ptr())
    }
}

impl NativeHandle for RawPipeline {
    const KIND: &'static str = "Pipeline";

    unsafe fn release(self, native: &dyn NativeApi) {
        native.pipeline_drop(self.as_ptr())
    }
}

impl NativeHandle for RawBuffer {
    const KIND: &'static str = "Response";

    unsafe fn release(self, native: &dyn NativeApi) {
        native.vec_drop(self.as_slice())
    }
}

// Safety: the runtime's bundles are reference counted and immutable, pipelines
// and buffers are plain heap objects; none are tied to the creating thread.
unsafe impl Send for RawBundle {}
unsafe impl Sync for RawBundle {}
unsafe impl Send for RawPipeline {}
unsafe impl Send for RawBuffer {}

/// Exclusive owner of one native handle.
pub(crate) struct Owned<H: NativeHandle> {
    native: Native,
    handle: ManuallyDrop<H>,
    disposed: AtomicBool,
}

impl<H: NativeHandle> Owned<H> {
    pub(crate) fn new(native: Native, handle: H) -> Self {
        trace!(kind = H::KIND, origin = native.origin(), "acquired native handle");
        Self {
            native,
            handle: ManuallyDrop::new(handle),
            disposed: AtomicBool::new(false),
        }
    }

    /// The handle, if still live.
    pub(crate) fn live(&self) -> Result<&H> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(Error::Disposed { kind: H::KIND });
        }
        Ok(&self.handle)
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    pub(crate) fn native(&self) -> &Native {
        &self.native
    }

    pub(crate) fn native_arc(&self) -> Native {
        Arc::clone(&self.native)
    }

    /// Release the handle if this is the first trigger. Returns whether a
    /// native release call was made.
    pub(crate) fn release(&self) -> bool {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return false;
        }
        // Safety: only the caller that flipped the flag reaches this point, and
        // `handle` is never read again or dropped by `ManuallyDrop`.
        let handle = unsafe { ptr::read(&*self.handle) };
        unsafe { handle.release(&*self.native) };
        trace!(kind = H::KIND, "released native handle");
        true
    }
}

impl<H: NativeHandle> Drop for Owned<H> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<H: NativeHandle> std::fmt::Debug for Owned<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(H::KIND)
            .field("origin", &self.native.origin())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeNative;

    fn pipeline_on(fake: &Arc<FakeNative>) -> RawPipeline {
        let ptr = fake.raw_pipeline();
        RawPipeline::new(ptr).unwrap()
    }

    #[test]
    fn test_null_pointers_are_rejected() {
        assert!(RawBundle::new(ptr::null_mut()).is_none());
        assert!(RawPipeline::new(ptr::null_mut()).is_none());
        assert!(RawBuffer::new(RawSlice::null()).is_none());
    }

    #[test]
    fn test_release_runs_once() {
        let fake = FakeNative::new();
        let owned = Owned::new(fake.native(), pipeline_on(&fake));
        assert_eq!(fake.stats().pipelines_live, 1);

        assert!(owned.release());
        assert!(!owned.release());
        assert!(owned.is_disposed());
        assert_eq!(fake.stats().pipelines_live, 0);
        assert_eq!(fake.stats().pipelines_dropped, 1);

        drop(owned);
        assert_eq!(fake.stats().pipelines_dropped, 1);
    }

    #[test]
    fn test_drop_releases_live_handle() {
        let fake = FakeNative::new();
        let owned = Owned::new(fake.native(), pipeline_on(&fake));
        drop(owned);
        assert_eq!(fake.stats().pipelines_live, 0);
        assert_eq!(fake.stats().pipelines_dropped, 1);
    }

    #[test]
    fn test_live_fails_after_release() {
        let fake = FakeNative::new();
        let owned = Owned::new(fake.native(), pipeline_on(&fake));
        assert!(owned.live().is_ok());
        owned.release();
        let err = owned.live().unwrap_err();
        assert!(matches!(err, Error::Disposed { kind: "Pipeline" }));
    }

    #[test]
    fn test_concurrent_release_single_winner() {
        let fake = FakeNative::new();
        let owned = Arc::new(Owned::new(fake.native(), RawBundle::new(fake.raw_bundle()).unwrap()));

        let winners: usize = (0..8)
            .map(|_| {
                let owned = Arc::clone(&owned);
                std::thread::spawn(move || owned.release())
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|h| h.join().unwrap() as usize)
            .sum();

        assert_eq!(winners, 1);
        assert_eq!(fake.stats().bundles_dropped, 1);
    }
}
