//! Pipeline output.

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::trace;

use crate::error::{Error, Result};
use crate::ffi::Native;
use crate::handle::{Owned, RawBuffer};

/// The result buffer of one [`Pipeline::forward`](crate::Pipeline::forward).
///
/// The bytes are copied out of native memory when the response is built. The
/// native buffer is released on the first read (`bytes`, `string`, `json`,
/// `json_as`), on [`dispose`](Self::dispose), or on drop, whichever comes
/// first. Every read after the first fails with [`Error::Disposed`].
#[derive(Debug)]
pub struct Response {
    data: Vec<u8>,
    buffer: Owned<RawBuffer>,
}

impl Response {
    pub(crate) fn new(native: Native, buffer: RawBuffer) -> Self {
        // Safety: the buffer was just returned by a call that did not signal.
        let data = unsafe { buffer.to_vec() };
        trace!(len = buffer.len(), "copied pipeline output");
        Self {
            data,
            buffer: Owned::new(native, buffer),
        }
    }

    /// Take the payload and release the native buffer.
    pub fn bytes(&mut self) -> Result<Vec<u8>> {
        self.buffer.live()?;
        let data = std::mem::take(&mut self.data);
        self.buffer.release();
        Ok(data)
    }

    /// Take the payload as UTF-8 text.
    pub fn string(&mut self) -> Result<String> {
        Ok(String::from_utf8(self.bytes()?)?)
    }

    /// Take the payload as a JSON value.
    pub fn json(&mut self) -> Result<Value> {
        self.json_as()
    }

    /// Take the payload and deserialize it into `T`.
    pub fn json_as<T: DeserializeOwned>(&mut self) -> Result<T> {
        let text = self.string()?;
        serde_json::from_str(&text).map_err(Error::Parse)
    }

    /// Payload size in bytes, zero once consumed.
    pub fn len(&self) -> usize {
        if self.buffer.is_disposed() {
            0
        } else {
            self.data.len()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Release the native buffer without reading it. Idempotent.
    pub fn dispose(&mut self) {
        if self.buffer.release() {
            self.data = Vec::new();
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.buffer.is_disposed()
    }
}
