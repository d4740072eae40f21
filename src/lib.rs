//! drt-host - Host bindings for a native linguistic pipeline runtime
//!
//! Drives a precompiled pipeline runtime shipped as a shared library
//! (`libdivvun_runtime.so`, `libdivvun_runtime.dylib`, `divvun_runtime.dll`)
//! through its fixed C function table, without reimplementing any of the
//! pipeline logic.
//!
//! # Objects
//!
//! - [`LibraryLoader`] opens the library once and caches it
//! - [`Bundle`] owns a compiled pipeline definition
//! - [`Pipeline`] owns a configured pipeline created from a bundle
//! - [`Response`] owns one result buffer and hands it out exactly once
//!
//! Each wrapper releases its native resource exactly once: on `dispose()`, on
//! drop, or (for a response) on the first read. Operations on a disposed
//! wrapper fail with [`Error::Disposed`] without calling into the library.
//!
//! # Example
//!
//! ```no_run
//! use drt_host::{Bundle, LibraryLoader};
//!
//! # fn main() -> drt_host::Result<()> {
//! let native = LibraryLoader::global().load()?;
//! let bundle = Bundle::from_bundle(&native, "pipeline.drb")?;
//! let mut pipeline = bundle.create_default()?;
//! let mut response = pipeline.forward("Hello, world!")?;
//! println!("{}", response.string()?);
//! # Ok(())
//! # }
//! ```
//!
//! # Threading
//!
//! Boundary calls are synchronous; `forward` blocks for the whole pipeline
//! run and offers no cancellation. [`LibraryLoader`] serializes loading behind
//! a mutex. `Bundle` is `Send + Sync`, `Pipeline` and `Response` are `Send`.
//!
//! # Lifetimes
//!
//! A [`Pipeline`] does not keep its [`Bundle`] alive. Disposing a bundle while
//! pipelines created from it are still in use is left to the caller to avoid.

pub mod bundle;
pub mod config;
pub mod error;
pub mod fake;
pub mod ffi;
mod handle;
pub mod pipeline;
pub mod response;

pub use bundle::{config_to_json, Bundle, PipelineConfig, BUNDLE_EXTENSION};
pub use config::LoaderConfig;
pub use error::{Error, Result};
pub use ffi::{LibraryLoader, Native, NativeApi, NativeLibrary};
pub use pipeline::Pipeline;
pub use response::Response;
