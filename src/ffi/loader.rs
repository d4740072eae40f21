//! Dynamic Library Loader
//!
//! Safe wrapper around libloading for opening the runtime library and binding
//! its function table.

use std::ffi::c_void;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use libloading::Library;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tracing::{debug, warn};

use super::api::{Native, NativeApi};
use super::types::{CreateFn, DropFn, ErrorCallback, ForwardFn, OpenFn, RawSlice, VecDropFn};
use crate::config::{ConfigError, LoaderConfig};
use crate::error::{Error, Result};

pub const SYM_BUNDLE_FROM_BUNDLE: &str = "DRT_Bundle_fromBundle";
pub const SYM_BUNDLE_FROM_PATH: &str = "DRT_Bundle_fromPath";
pub const SYM_BUNDLE_CREATE: &str = "DRT_Bundle_create";
pub const SYM_BUNDLE_DROP: &str = "DRT_Bundle_drop";
pub const SYM_PIPELINE_DROP: &str = "DRT_PipelineHandle_drop";
pub const SYM_PIPELINE_FORWARD: &str = "DRT_PipelineHandle_forward";
pub const SYM_VEC_DROP: &str = "DRT_Vec_drop";

/// Resolved entry points. Only valid while the owning `Library` is loaded.
#[derive(Clone, Copy)]
struct FunctionTable {
    from_bundle: OpenFn,
    from_path: OpenFn,
    create: CreateFn,
    bundle_drop: DropFn,
    pipeline_drop: DropFn,
    forward: ForwardFn,
    vec_drop: VecDropFn,
}

/// The runtime library, opened and bound.
pub struct NativeLibrary {
    /// Path the library was opened from
    path: PathBuf,
    origin: String,
    /// Function pointers into `_library`
    table: FunctionTable,
    /// Declared last so it is unloaded after everything else is dropped
    _library: Library,
}

impl NativeLibrary {
    /// Open the library at `path` and bind every symbol of the table.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        // Safety: loading runs the library's initializers. We trust the caller
        // to point us at the runtime library.
        let library = unsafe { Library::new(&path) }.map_err(|source| Error::Load {
            path: path.clone(),
            source,
        })?;

        let table = FunctionTable {
            from_bundle: symbol(&library, &path, SYM_BUNDLE_FROM_BUNDLE)?,
            from_path: symbol(&library, &path, SYM_BUNDLE_FROM_PATH)?,
            create: symbol(&library, &path, SYM_BUNDLE_CREATE)?,
            bundle_drop: symbol(&library, &path, SYM_BUNDLE_DROP)?,
            pipeline_drop: symbol(&library, &path, SYM_PIPELINE_DROP)?,
            forward: symbol(&library, &path, SYM_PIPELINE_FORWARD)?,
            vec_drop: symbol(&library, &path, SYM_VEC_DROP)?,
        };

        debug!(path = %path.display(), "opened native runtime library");

        Ok(Self {
            origin: path.display().to_string(),
            path,
            table,
            _library: library,
        })
    }

    /// Get the path to this library
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for NativeLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeLibrary")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

fn symbol<T: Copy>(library: &Library, path: &Path, name: &'static str) -> Result<T> {
    let mut c_name = Vec::with_capacity(name.len() + 1);
    c_name.extend_from_slice(name.as_bytes());
    c_name.push(0);

    // Safety: `T` is one of the fn-pointer aliases in `types`, which mirror the
    // C header of the runtime.
    let sym = unsafe { library.get::<T>(&c_name) }.map_err(|source| Error::MissingSymbol {
        symbol: name,
        path: path.to_path_buf(),
        source,
    })?;
    Ok(*sym)
}

// Safety: the table is immutable after `open` and the runtime's exports are
// callable from any thread.
unsafe impl NativeApi for NativeLibrary {
    fn origin(&self) -> &str {
        &self.origin
    }

    unsafe fn bundle_from_bundle(&self, path: RawSlice, on_error: ErrorCallback) -> *mut c_void {
        (self.table.from_bundle)(path, on_error)
    }

    unsafe fn bundle_from_path(&self, path: RawSlice, on_error: ErrorCallback) -> *mut c_void {
        (self.table.from_path)(path, on_error)
    }

    unsafe fn bundle_create(
        &self,
        bundle: *mut c_void,
        config: RawSlice,
        on_error: ErrorCallback,
    ) -> *mut c_void {
        (self.table.create)(bundle, config, on_error)
    }

    unsafe fn bundle_drop(&self, bundle: *mut c_void) {
        (self.table.bundle_drop)(bundle)
    }

    unsafe fn pipeline_drop(&self, pipeline: *mut c_void) {
        (self.table.pipeline_drop)(pipeline)
    }

    unsafe fn pipeline_forward(
        &self,
        pipeline: *mut c_void,
        input: RawSlice,
        on_error: ErrorCallback,
    ) -> RawSlice {
        (self.table.forward)(pipeline, input, on_error)
    }

    unsafe fn vec_drop(&self, vec: RawSlice) {
        (self.table.vec_drop)(vec)
    }
}

static GLOBAL: Lazy<LibraryLoader> = Lazy::new(|| {
    let config = std::env::current_dir()
        .map_err(ConfigError::from)
        .and_then(|cwd| LoaderConfig::discover(&cwd))
        .unwrap_or_else(|e| {
            warn!(error = %e, "ignoring drt.toml, using environment only");
            LoaderConfig::from_env()
        });
    LibraryLoader::with_config(config)
});

/// Caches the opened runtime library.
///
/// The cache is behind a mutex that is held while the library is opened, so
/// concurrent first loads are serialized and open the library once. A failed
/// load or reload leaves the cache as it was.
pub struct LibraryLoader {
    config: Mutex<LoaderConfig>,
    cached: Mutex<Option<Native>>,
}

impl LibraryLoader {
    /// Loader using the default library name and the platform search path.
    pub fn new() -> Self {
        Self::with_config(LoaderConfig::default())
    }

    pub fn with_config(config: LoaderConfig) -> Self {
        Self {
            config: Mutex::new(config),
            cached: Mutex::new(None),
        }
    }

    /// Loader configured from the `drt.toml` at `path`.
    pub fn from_config_file(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::with_config(LoaderConfig::load(path.as_ref())?))
    }

    /// Loader configured from the nearest `drt.toml` at or above `start_dir`,
    /// with `DRT_LIB_DIR` / `DRT_LIB_NAME` applied on top.
    pub fn discover(start_dir: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::with_config(LoaderConfig::discover(start_dir.as_ref())?))
    }

    /// Loader whose cache already holds `native`.
    pub fn preloaded(native: Native) -> Self {
        let loader = Self::new();
        *loader.cached.lock() = Some(native);
        loader
    }

    /// Process-wide loader, configured like [`discover`](Self::discover) from
    /// the working directory. An unreadable `drt.toml` is logged and skipped.
    pub fn global() -> &'static LibraryLoader {
        &GLOBAL
    }

    /// Return the cached library, opening it on first use.
    pub fn load(&self) -> Result<Native> {
        let mut cached = self.cached.lock();
        if let Some(native) = cached.as_ref() {
            return Ok(Arc::clone(native));
        }

        let path = self.config.lock().library_path();
        let native: Native = Arc::new(NativeLibrary::open(&path)?);
        *cached = Some(Arc::clone(&native));
        Ok(native)
    }

    /// Reload from `dir`, replacing the cached library on success.
    ///
    /// Wrappers created from the previous library keep it mapped until they
    /// are dropped.
    pub fn set_path(&self, dir: impl AsRef<Path>) -> Result<Native> {
        let mut cached = self.cached.lock();
        let mut config = self.config.lock().clone();
        config.library.dir = Some(dir.as_ref().to_path_buf());

        let native: Native = Arc::new(NativeLibrary::open(config.library_path())?);
        debug!(dir = %dir.as_ref().display(), "reloaded native runtime library");

        *self.config.lock() = config;
        *cached = Some(Arc::clone(&native));
        Ok(native)
    }

    /// The cached library, if one has been loaded.
    pub fn current(&self) -> Option<Native> {
        self.cached.lock().clone()
    }

    /// Snapshot of the loader configuration.
    pub fn config(&self) -> LoaderConfig {
        self.config.lock().clone()
    }
}

impl Default for LibraryLoader {
    fn default() -> Self {
        Self::new()
    }
}
