//! Native Boundary
//!
//! Everything that touches raw memory shared with the runtime library.
//!
//! # Architecture
//!
//! ```text
//! Bundle / Pipeline / Response
//!       │
//!       ▼
//! NativeApi (trait; Arc<dyn NativeApi> held by every wrapper)
//!       │
//!       ├── NativeLibrary (libloading, DRT_* symbols)
//!       └── FakeNative    (in-process, tests and benches)
//! ```
//!
//! Fallible calls go through [`channel::call`], which hands the native side an
//! error callback and turns a delivered message into an `Err`.

pub mod channel;
mod api;
mod loader;
mod types;

pub use api::{Native, NativeApi};
pub use channel::{ErrorSignal, UNKNOWN_ERROR};
pub use loader::{
    LibraryLoader, NativeLibrary, SYM_BUNDLE_CREATE, SYM_BUNDLE_DROP, SYM_BUNDLE_FROM_BUNDLE,
    SYM_BUNDLE_FROM_PATH, SYM_PIPELINE_DROP, SYM_PIPELINE_FORWARD, SYM_VEC_DROP,
};
pub use types::{
    CreateFn, DropFn, ErrorCallback, ForwardFn, OpenFn, Outbound, RawSlice, VecDropFn,
};
