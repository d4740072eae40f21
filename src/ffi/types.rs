//! Boundary Types
//!
//! The (address, length) representation shared with the native runtime and the
//! function-pointer shapes of its exported table.

use std::ffi::c_void;
use std::marker::PhantomData;
use std::ptr;

/// A contiguous byte region at the boundary.
///
/// Layout matches `rust_slice_t { void *data; uintptr_t len; }`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawSlice {
    pub data: *mut c_void,
    pub len: usize,
}

impl RawSlice {
    /// The null slice.
    pub const fn null() -> Self {
        Self {
            data: ptr::null_mut(),
            len: 0,
        }
    }

    pub fn is_null(&self) -> bool {
        self.data.is_null()
    }

    /// View the referenced bytes.
    ///
    /// # Safety
    ///
    /// `data` must be non-null and point at `len` initialized bytes that stay
    /// valid for the returned lifetime.
    pub unsafe fn as_bytes<'a>(&self) -> &'a [u8] {
        std::slice::from_raw_parts(self.data as *const u8, self.len)
    }
}

/// Invoked synchronously by a fallible boundary call, at most once, only on
/// failure. A null address means the cause is unknown.
pub type ErrorCallback = unsafe extern "C" fn(data: *const c_void, len: usize);

/// `Bundle_fromBundle` / `Bundle_fromPath`
pub type OpenFn = unsafe extern "C" fn(path: RawSlice, on_error: ErrorCallback) -> *mut c_void;

/// `Bundle_create`
pub type CreateFn = unsafe extern "C" fn(
    bundle: *mut c_void,
    config: RawSlice,
    on_error: ErrorCallback,
) -> *mut c_void;

/// `Bundle_drop` / `PipelineHandle_drop`
pub type DropFn = unsafe extern "C" fn(handle: *mut c_void);

/// `PipelineHandle_forward`
pub type ForwardFn = unsafe extern "C" fn(
    pipeline: *mut c_void,
    input: RawSlice,
    on_error: ErrorCallback,
) -> RawSlice;

/// `Vec_drop`
pub type VecDropFn = unsafe extern "C" fn(vec: RawSlice);

/// Caller-supplied bytes lent to the native side for a single call.
///
/// The borrow pins the backing buffer for as long as the `Outbound` lives;
/// ownership never moves across the boundary.
#[derive(Debug, Clone, Copy)]
pub struct Outbound<'a> {
    raw: RawSlice,
    _borrow: PhantomData<&'a [u8]>,
}

impl<'a> Outbound<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            raw: RawSlice {
                data: bytes.as_ptr() as *mut c_void,
                len: bytes.len(),
            },
            _borrow: PhantomData,
        }
    }

    /// UTF-8 encoding of `text`.
    pub fn text(text: &'a str) -> Self {
        Self::new(text.as_bytes())
    }

    pub fn raw(&self) -> RawSlice {
        self.raw
    }

    pub fn len(&self) -> usize {
        self.raw.len
    }

    pub fn is_empty(&self) -> bool {
        self.raw.len == 0
    }
}
