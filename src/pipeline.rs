//! Configured, runnable pipelines.

use tracing::warn;

use crate::error::{Error, Result};
use crate::ffi::{channel, Native, Outbound, SYM_PIPELINE_FORWARD};
use crate::handle::{Owned, RawBuffer, RawPipeline};
use crate::response::Response;

/// A pipeline instance produced by [`Bundle::create`](crate::Bundle::create).
///
/// The pipeline does not keep its bundle alive; disposing the bundle first is
/// allowed and the caller's responsibility.
#[derive(Debug)]
pub struct Pipeline {
    handle: Owned<RawPipeline>,
}

impl Pipeline {
    pub(crate) fn new(native: Native, handle: RawPipeline) -> Self {
        Self {
            handle: Owned::new(native, handle),
        }
    }

    /// Run `input` through the pipeline.
    ///
    /// Blocks until the native pipeline has produced its output. Each call
    /// returns an independent [`Response`].
    pub fn forward(&mut self, input: &str) -> Result<Response> {
        let pipeline = self.handle.live()?.as_ptr();
        let native = self.handle.native();
        let input = Outbound::text(input);

        // Safety: `pipeline` is live and exclusively borrowed; `input` outlives the call.
        let out = channel::call(|on_error| unsafe {
            native.pipeline_forward(pipeline, input.raw(), on_error)
        })
        .map_err(|signal| Error::Native(signal.into_message()))?;

        match RawBuffer::new(out) {
            Some(buffer) => Ok(Response::new(self.handle.native_arc(), buffer)),
            None => {
                warn!(call = SYM_PIPELINE_FORWARD, "null result without error signal");
                Err(Error::Guard {
                    call: SYM_PIPELINE_FORWARD,
                })
            }
        }
    }

    /// Release the native pipeline. Idempotent.
    pub fn dispose(&mut self) {
        self.handle.release();
    }

    pub fn is_disposed(&self) -> bool {
        self.handle.is_disposed()
    }
}
