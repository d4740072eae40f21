//! Stand-in Runtime
//!
//! Exports the seven `DRT_*` entry points with just enough behaviour to drive
//! the host bindings through a real dynamic library:
//!
//! - `DRT_Bundle_fromBundle` accepts paths ending in `.drb`, anything else
//!   signals `bad bundle`
//! - `DRT_Bundle_fromPath` signals with a null address for `unknown`
//! - `DRT_Bundle_create` keeps the config JSON; `{"fail":true}` signals
//! - `DRT_PipelineHandle_forward` answers `<config>|<input>`; `__fail__`
//!   signals with a null address, `__null__` returns null silently
//!
//! `stub_live_objects` reports how many bundles, pipelines and buffers are
//! still allocated.

use std::ffi::c_void;
use std::ptr;
use std::sync::atomic::{AtomicIsize, Ordering};

#[repr(C)]
#[derive(Clone, Copy)]
pub struct RawSlice {
    pub data: *mut c_void,
    pub len: usize,
}

pub type ErrorCallback = unsafe extern "C" fn(data: *const c_void, len: usize);

static LIVE: AtomicIsize = AtomicIsize::new(0);

unsafe fn text<'a>(slice: RawSlice) -> &'a str {
    if slice.data.is_null() {
        return "";
    }
    let bytes = std::slice::from_raw_parts(slice.data as *const u8, slice.len);
    std::str::from_utf8(bytes).unwrap_or("")
}

unsafe fn fail(on_error: ErrorCallback, message: &str) {
    on_error(message.as_ptr() as *const c_void, message.len());
}

fn boxed(value: String) -> *mut c_void {
    LIVE.fetch_add(1, Ordering::SeqCst);
    Box::into_raw(Box::new(value)) as *mut c_void
}

unsafe fn unbox(handle: *mut c_void) {
    if handle.is_null() {
        return;
    }
    drop(Box::from_raw(handle as *mut String));
    LIVE.fetch_sub(1, Ordering::SeqCst);
}

#[no_mangle]
pub unsafe extern "C" fn DRT_Bundle_fromBundle(path: RawSlice, on_error: ErrorCallback) -> *mut c_void {
    let path = text(path);
    if !path.ends_with(".drb") {
        fail(on_error, "bad bundle");
        return ptr::null_mut();
    }
    boxed(path.to_string())
}

#[no_mangle]
pub unsafe extern "C" fn DRT_Bundle_fromPath(path: RawSlice, on_error: ErrorCallback) -> *mut c_void {
    let path = text(path);
    if path == "unknown" {
        on_error(ptr::null(), 0);
        return ptr::null_mut();
    }
    boxed(path.to_string())
}

#[no_mangle]
pub unsafe extern "C" fn DRT_Bundle_create(
    bundle: *mut c_void,
    config: RawSlice,
    on_error: ErrorCallback,
) -> *mut c_void {
    if bundle.is_null() {
        fail(on_error, "null bundle");
        return ptr::null_mut();
    }
    let config = text(config);
    if config.contains("\"fail\":true") {
        fail(on_error, "rejected config");
        return ptr::null_mut();
    }
    boxed(config.to_string())
}

#[no_mangle]
pub unsafe extern "C" fn DRT_Bundle_drop(bundle: *mut c_void) {
    unbox(bundle)
}

#[no_mangle]
pub unsafe extern "C" fn DRT_PipelineHandle_drop(pipeline: *mut c_void) {
    unbox(pipeline)
}

#[no_mangle]
pub unsafe extern "C" fn DRT_PipelineHandle_forward(
    pipeline: *mut c_void,
    input: RawSlice,
    on_error: ErrorCallback,
) -> RawSlice {
    let null = RawSlice {
        data: ptr::null_mut(),
        len: 0,
    };
    let input = text(input);
    match input {
        "__fail__" => {
            on_error(ptr::null(), 0);
            return null;
        }
        "__null__" => return null,
        _ => {}
    }

    let config = &*(pipeline as *const String);
    let out = format!("{config}|{input}").into_bytes().into_boxed_slice();
    let len = out.len();
    LIVE.fetch_add(1, Ordering::SeqCst);
    RawSlice {
        data: Box::into_raw(out) as *mut u8 as *mut c_void,
        len,
    }
}

#[no_mangle]
pub unsafe extern "C" fn DRT_Vec_drop(vec: RawSlice) {
    if vec.data.is_null() {
        return;
    }
    let slice = ptr::slice_from_raw_parts_mut(vec.data as *mut u8, vec.len);
    drop(Box::from_raw(slice));
    LIVE.fetch_sub(1, Ordering::SeqCst);
}

#[no_mangle]
pub extern "C" fn stub_live_objects() -> isize {
    LIVE.load(Ordering::SeqCst)
}
