//! In-process stand-in for the runtime library.
//!
//! `FakeNative` implements the full boundary table with the same ownership
//! rules as the real runtime (boxed handles, boxed result buffers, errors
//! through the callback) and counts every allocation, release and call, so the
//! binding layer can be exercised without the shared library.
//!
//! Behaviour:
//!
//! | Call | Input | Result |
//! |---|---|---|
//! | `Bundle_fromBundle` | path without `.drb` extension | error signal |
//! | `Bundle_fromBundle` / `fromPath` | path containing `null-handle` | null, no signal |
//! | `Bundle_fromBundle` / `fromPath` | path containing `unknown-error` | null-address signal |
//! | `Bundle_fromPath` | path containing `missing` | error signal |
//! | `Bundle_create` | config not a JSON object, or `"fail": true` | error signal |
//! | `PipelineHandle_forward` | `__fail__` | error signal |
//! | `PipelineHandle_forward` | `__null__` | null slice, no signal |
//! | `PipelineHandle_forward` | `__bytes__` | invalid UTF-8 bytes |
//! | `PipelineHandle_forward` | config `"format": "json"` | JSON document |
//! | `PipelineHandle_forward` | anything else | input uppercased |

use std::ffi::c_void;
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::{json, Map, Value};

use crate::ffi::{ErrorCallback, Native, NativeApi, RawSlice};

struct FakeBundle {
    path: String,
}

struct FakePipeline {
    bundle_path: String,
    config: Map<String, Value>,
}

#[derive(Default)]
struct Counter {
    created: AtomicUsize,
    dropped: AtomicUsize,
}

impl Counter {
    fn created(&self) {
        self.created.fetch_add(1, Ordering::SeqCst);
    }

    fn dropped(&self) {
        self.dropped.fetch_add(1, Ordering::SeqCst);
    }

    fn live(&self) -> usize {
        self.created.load(Ordering::SeqCst) - self.dropped.load(Ordering::SeqCst)
    }
}

/// Snapshot of the fake's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FakeStats {
    pub bundles_live: usize,
    pub bundles_dropped: usize,
    pub pipelines_live: usize,
    pub pipelines_dropped: usize,
    pub buffers_live: usize,
    pub buffers_dropped: usize,
    /// Every entry into the table, drops included
    pub calls: usize,
}

/// Fake runtime library.
#[derive(Default)]
pub struct FakeNative {
    bundles: Counter,
    pipelines: Counter,
    buffers: Counter,
    calls: AtomicUsize,
}

impl FakeNative {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// This fake as the trait object the wrappers hold.
    pub fn native(self: &Arc<Self>) -> Native {
        Arc::clone(self) as Native
    }

    pub fn stats(&self) -> FakeStats {
        FakeStats {
            bundles_live: self.bundles.live(),
            bundles_dropped: self.bundles.dropped.load(Ordering::SeqCst),
            pipelines_live: self.pipelines.live(),
            pipelines_dropped: self.pipelines.dropped.load(Ordering::SeqCst),
            buffers_live: self.buffers.live(),
            buffers_dropped: self.buffers.dropped.load(Ordering::SeqCst),
            calls: self.calls.load(Ordering::SeqCst),
        }
    }

    #[cfg(test)]
    pub(crate) fn raw_bundle(&self) -> *mut c_void {
        self.new_bundle("test.drb".to_string())
    }

    #[cfg(test)]
    pub(crate) fn raw_pipeline(&self) -> *mut c_void {
        self.new_pipeline("test.drb".to_string(), Map::new())
    }

    fn enter(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    fn new_bundle(&self, path: String) -> *mut c_void {
        self.bundles.created();
        Box::into_raw(Box::new(FakeBundle { path })) as *mut c_void
    }

    fn new_pipeline(&self, bundle_path: String, config: Map<String, Value>) -> *mut c_void {
        self.pipelines.created();
        Box::into_raw(Box::new(FakePipeline {
            bundle_path,
            config,
        })) as *mut c_void
    }

    fn new_buffer(&self, bytes: Vec<u8>) -> RawSlice {
        self.buffers.created();
        let boxed = bytes.into_boxed_slice();
        let len = boxed.len();
        RawSlice {
            data: Box::into_raw(boxed) as *mut u8 as *mut c_void,
            len,
        }
    }

    unsafe fn open(&self, path: RawSlice, on_error: ErrorCallback, packaged: bool) -> *mut c_void {
        self.enter();
        let path = String::from_utf8_lossy(path.as_bytes()).into_owned();

        if path.contains("null-handle") {
            return ptr::null_mut();
        }
        if path.contains("unknown-error") {
            on_error(ptr::null(), 0);
            return ptr::null_mut();
        }
        if packaged && !path.ends_with(".drb") {
            signal(on_error, &format!("not a bundle archive: {path}"));
            return ptr::null_mut();
        }
        if !packaged && path.contains("missing") {
            signal(on_error, &format!("pipeline definition not found: {path}"));
            return ptr::null_mut();
        }
        self.new_bundle(path)
    }
}

unsafe fn signal(on_error: ErrorCallback, message: &str) {
    on_error(message.as_ptr() as *const c_void, message.len());
}

unsafe impl NativeApi for FakeNative {
    fn origin(&self) -> &str {
        "fake"
    }

    unsafe fn bundle_from_bundle(&self, path: RawSlice, on_error: ErrorCallback) -> *mut c_void {
        self.open(path, on_error, true)
    }

    unsafe fn bundle_from_path(&self, path: RawSlice, on_error: ErrorCallback) -> *mut c_void {
        self.open(path, on_error, false)
    }

    unsafe fn bundle_create(
        &self,
        bundle: *mut c_void,
        config: RawSlice,
        on_error: ErrorCallback,
    ) -> *mut c_void {
        self.enter();
        let bundle = &*(bundle as *const FakeBundle);
        let config = match serde_json::from_slice::<Value>(config.as_bytes()) {
            Ok(Value::Object(map)) => map,
            Ok(_) => {
                signal(on_error, "config must be a JSON object");
                return ptr::null_mut();
            }
            Err(e) => {
                signal(on_error, &format!("invalid config: {e}"));
                return ptr::null_mut();
            }
        };
        if config.get("fail") == Some(&Value::Bool(true)) {
            signal(on_error, "pipeline construction rejected");
            return ptr::null_mut();
        }
        self.new_pipeline(bundle.path.clone(), config)
    }

    unsafe fn bundle_drop(&self, bundle: *mut c_void) {
        self.enter();
        drop(Box::from_raw(bundle as *mut FakeBundle));
        self.bundles.dropped();
    }

    unsafe fn pipeline_drop(&self, pipeline: *mut c_void) {
        self.enter();
        drop(Box::from_raw(pipeline as *mut FakePipeline));
        self.pipelines.dropped();
    }

    unsafe fn pipeline_forward(
        &self,
        pipeline: *mut c_void,
        input: RawSlice,
        on_error: ErrorCallback,
    ) -> RawSlice {
        self.enter();
        let pipeline = &*(pipeline as *const FakePipeline);
        let input = String::from_utf8_lossy(input.as_bytes()).into_owned();

        let output = match input.as_str() {
            "__fail__" => {
                signal(on_error, "pipeline failed on input");
                return RawSlice::null();
            }
            "__null__" => return RawSlice::null(),
            "__bytes__" => vec![0xff, 0xfe, 0xfd],
            _ if pipeline.config.get("format") == Some(&Value::from("json")) => {
                let tokens: Vec<&str> = input.split_whitespace().collect();
                let doc = json!({
                    "bundle": pipeline.bundle_path,
                    "input": input,
                    "tokens": tokens,
                });
                doc.to_string().into_bytes()
            }
            _ => input.to_uppercase().into_bytes(),
        };
        self.new_buffer(output)
    }

    unsafe fn vec_drop(&self, vec: RawSlice) {
        self.enter();
        let slice = ptr::slice_from_raw_parts_mut(vec.data as *mut u8, vec.len);
        drop(Box::from_raw(slice));
        self.buffers.dropped();
    }
}
