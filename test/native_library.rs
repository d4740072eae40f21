//! Native Library Tests
//!
//! Builds the stand-in runtime under `test/native-stub` as a real shared
//! library and drives the bindings through `NativeLibrary`, so the symbol
//! table, the `extern "C"` error callback and the slice layout are exercised
//! across an actual dynamic-library boundary.

use std::path::{Path, PathBuf};
use std::process::Command;

use drt_host::config::library_filename;
use drt_host::{Bundle, Error, LibraryLoader, LoaderConfig, Native, NativeLibrary, PipelineConfig};
use libloading::Library;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use serde_json::json;

/// Directory holding the freshly built stand-in library.
static STUB_DIR: Lazy<PathBuf> = Lazy::new(|| {
    let manifest = Path::new(env!("CARGO_MANIFEST_DIR")).join("test/native-stub/Cargo.toml");
    let target = Path::new(env!("CARGO_TARGET_TMPDIR")).join("native-stub");

    let status = Command::new(env!("CARGO"))
        .arg("build")
        .arg("--quiet")
        .arg("--manifest-path")
        .arg(&manifest)
        .arg("--target-dir")
        .arg(&target)
        .env_remove("CARGO_TARGET_DIR")
        .env_remove("CARGO_BUILD_TARGET")
        .status()
        .expect("failed to spawn cargo");
    assert!(status.success(), "building the stand-in runtime failed");

    let dir = target.join("debug");
    assert!(dir.join(library_filename("divvun_runtime")).exists());
    dir
});

/// The stand-in keeps a process-wide live-object count; tests that read it
/// must not overlap.
static SERIAL: Mutex<()> = parking_lot::const_mutex(());

fn load() -> Native {
    LibraryLoader::with_config(LoaderConfig::with_dir(STUB_DIR.as_path()))
        .load()
        .unwrap()
}

fn live_objects() -> isize {
    let path = STUB_DIR.join(library_filename("divvun_runtime"));
    // Same path, so the loader maps the already-open image
    unsafe {
        let library = Library::new(path).unwrap();
        let count = library
            .get::<unsafe extern "C" fn() -> isize>(b"stub_live_objects\0")
            .unwrap();
        count()
    }
}

fn config(value: serde_json::Value) -> PipelineConfig {
    value.as_object().cloned().unwrap()
}

#[test]
fn test_forward_through_native_library() {
    let _guard = SERIAL.lock();
    let native = load();
    assert!(native.origin().ends_with(&library_filename("divvun_runtime")));

    let mut bundle = Bundle::from_bundle(&native, "pipeline.drb").unwrap();
    let mut pipeline = bundle.create_default().unwrap();
    let mut response = pipeline.forward("Hello, world!").unwrap();

    assert_eq!(response.len(), "{}|Hello, world!".len());
    assert_eq!(response.string().unwrap(), "{}|Hello, world!");

    response.dispose();
    pipeline.dispose();
    bundle.dispose();
    assert_eq!(live_objects(), 0);
}

#[test]
fn test_config_reaches_native_side() {
    let _guard = SERIAL.lock();
    let native = load();

    let bundle = Bundle::from_path(&native, "pipelines/grammar").unwrap();
    let output = bundle
        .run("čállit", &config(json!({ "format": "json" })))
        .unwrap();
    assert_eq!(String::from_utf8(output).unwrap(), r#"{"format":"json"}|čállit"#);

    drop(bundle);
    assert_eq!(live_objects(), 0);
}

#[test]
fn test_forward_failure_without_message_is_unknown_error() {
    let _guard = SERIAL.lock();
    let native = load();
    let bundle = Bundle::from_bundle(&native, "pipeline.drb").unwrap();
    let mut pipeline = bundle.create_default().unwrap();

    let err = pipeline.forward("__fail__").unwrap_err();
    assert!(matches!(&err, Error::Native(message) if message == "Unknown error"));
    assert_eq!(err.to_string(), "pipeline failed: Unknown error");

    // The pipeline stays usable after a signalled failure
    let mut response = pipeline.forward("again").unwrap();
    assert_eq!(response.string().unwrap(), "{}|again");
}

#[test]
fn test_forward_null_without_signal_is_guard_error() {
    let _guard = SERIAL.lock();
    let native = load();
    let bundle = Bundle::from_bundle(&native, "pipeline.drb").unwrap();
    let mut pipeline = bundle.create_default().unwrap();

    let err = pipeline.forward("__null__").unwrap_err();
    assert!(matches!(
        err,
        Error::Guard {
            call: "DRT_PipelineHandle_forward"
        }
    ));
}

#[test]
fn test_construction_failure_carries_native_message() {
    let _guard = SERIAL.lock();
    let native = load();

    let err = Bundle::from_bundle(&native, "x.txt").unwrap_err();
    assert!(matches!(&err, Error::Construction(message) if message == "bad bundle"));
    assert_eq!(err.to_string(), "construction failed: bad bundle");

    let err = Bundle::from_path(&native, "unknown").unwrap_err();
    assert!(matches!(&err, Error::Construction(message) if message == "Unknown error"));

    let bundle = Bundle::from_bundle(&native, "pipeline.drb").unwrap();
    let err = bundle.create(&config(json!({ "fail": true }))).unwrap_err();
    assert!(matches!(&err, Error::Construction(message) if message == "rejected config"));

    drop(bundle);
    assert_eq!(live_objects(), 0);
}

#[test]
fn test_disposed_wrappers_do_not_call_native() {
    let _guard = SERIAL.lock();
    let native = load();
    let mut bundle = Bundle::from_bundle(&native, "pipeline.drb").unwrap();
    let mut pipeline = bundle.create_default().unwrap();

    pipeline.dispose();
    pipeline.dispose();
    assert!(pipeline.forward("x").unwrap_err().is_disposed());

    bundle.dispose();
    assert!(bundle.create_default().unwrap_err().is_disposed());
    assert_eq!(live_objects(), 0);
}

#[test]
fn test_set_path_loads_library_from_directory() {
    let loader = LibraryLoader::new();
    let native = loader.set_path(STUB_DIR.as_path()).unwrap();

    assert_eq!(loader.config().library.dir.as_deref(), Some(STUB_DIR.as_path()));
    let current = loader.current().unwrap();
    assert_eq!(current.origin(), native.origin());
}

#[test]
fn test_open_binds_every_symbol() {
    let library = NativeLibrary::open(STUB_DIR.join(library_filename("divvun_runtime"))).unwrap();
    assert_eq!(library.path(), STUB_DIR.join(library_filename("divvun_runtime")));
}
