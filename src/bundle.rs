//! Compiled pipeline definitions.

use std::path::Path;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::ffi::{
    channel, Native, Outbound, SYM_BUNDLE_CREATE, SYM_BUNDLE_FROM_BUNDLE,
    SYM_BUNDLE_FROM_PATH,
};
use crate::handle::{Owned, RawBundle, RawPipeline};
use crate::pipeline::Pipeline;

/// Pipeline options, sent to the runtime as a JSON object. No schema is
/// enforced here.
pub type PipelineConfig = Map<String, Value>;

/// File extension of packaged bundles.
pub const BUNDLE_EXTENSION: &str = "drb";

/// Serialize `config` the way [`Bundle::create`] sends it.
pub fn config_to_json(config: &PipelineConfig) -> Result<String> {
    serde_json::to_string(config).map_err(Error::ConfigEncode)
}

/// A loaded pipeline definition.
#[derive(Debug)]
pub struct Bundle {
    handle: Owned<RawBundle>,
}

#[derive(Clone, Copy)]
enum Source {
    Packaged,
    Directory,
}

impl Source {
    fn symbol(self) -> &'static str {
        match self {
            Source::Packaged => SYM_BUNDLE_FROM_BUNDLE,
            Source::Directory => SYM_BUNDLE_FROM_PATH,
        }
    }
}

impl Bundle {
    /// Load a packaged `.drb` bundle.
    pub fn from_bundle(native: &Native, path: &str) -> Result<Self> {
        Self::load(native, path, Source::Packaged)
    }

    /// Load an unpacked, directory-based pipeline definition.
    pub fn from_path(native: &Native, path: &str) -> Result<Self> {
        Self::load(native, path, Source::Directory)
    }

    /// [`from_bundle`](Self::from_bundle) for `.drb` files, otherwise
    /// [`from_path`](Self::from_path).
    pub fn open(native: &Native, path: &str) -> Result<Self> {
        let packaged = Path::new(path)
            .extension()
            .is_some_and(|ext| ext == BUNDLE_EXTENSION);
        if packaged {
            Self::from_bundle(native, path)
        } else {
            Self::from_path(native, path)
        }
    }

    fn load(native: &Native, path: &str, source: Source) -> Result<Self> {
        let arg = Outbound::text(path);

        // Safety: `arg` borrows `path`, which outlives the call.
        let ptr = channel::call(|on_error| unsafe {
            match source {
                Source::Packaged => native.bundle_from_bundle(arg.raw(), on_error),
                Source::Directory => native.bundle_from_path(arg.raw(), on_error),
            }
        })
        .map_err(|signal| Error::Construction(signal.into_message()))?;

        let handle = RawBundle::new(ptr).ok_or_else(|| {
            warn!(call = source.symbol(), path, "null bundle without error signal");
            Error::Guard {
                call: source.symbol(),
            }
        })?;
        debug!(path, origin = native.origin(), "loaded bundle");

        Ok(Self {
            handle: Owned::new(native.clone(), handle),
        })
    }

    /// Instantiate a pipeline with `config`.
    pub fn create(&self, config: &PipelineConfig) -> Result<Pipeline> {
        let bundle = self.handle.live()?.as_ptr();
        let native = self.handle.native();
        let json = config_to_json(config)?;
        let arg = Outbound::text(&json);

        // Safety: `bundle` is live for the duration of `&self`; `json` outlives the call.
        let ptr = channel::call(|on_error| unsafe {
            native.bundle_create(bundle, arg.raw(), on_error)
        })
        .map_err(|signal| Error::Construction(signal.into_message()))?;

        let handle = RawPipeline::new(ptr).ok_or_else(|| {
            warn!(call = SYM_BUNDLE_CREATE, "null pipeline without error signal");
            Error::Guard {
                call: SYM_BUNDLE_CREATE,
            }
        })?;
        Ok(Pipeline::new(self.handle.native_arc(), handle))
    }

    /// Instantiate a pipeline with an empty config (`{}`).
    pub fn create_default(&self) -> Result<Pipeline> {
        self.create(&PipelineConfig::new())
    }

    /// Create a pipeline, run `input` through it once, and dispose it.
    pub fn run(&self, input: &str, config: &PipelineConfig) -> Result<Vec<u8>> {
        let mut pipeline = self.create(config)?;
        let mut response = pipeline.forward(input)?;
        pipeline.dispose();
        response.bytes()
    }

    /// Release the native bundle. Idempotent. Pipelines already created from
    /// this bundle are not disposed.
    pub fn dispose(&mut self) {
        self.handle.release();
    }

    pub fn is_disposed(&self) -> bool {
        self.handle.is_disposed()
    }
}
