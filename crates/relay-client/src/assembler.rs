//! Reassembly of partial reads into whole messages.

use crate::errors::ClientError;

/// Default cap on a reassembled message.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Buffers data fragments until the end-of-message boundary.
///
/// Nothing is handed out before `fin`, so callers never decode a partial
/// message.
#[derive(Debug)]
pub struct FrameAssembler {
    buf: Vec<u8>,
    max_size: usize,
}

impl FrameAssembler {
    /// Assembler with the default size cap.
    pub fn new() -> Self {
        Self::with_max_size(DEFAULT_MAX_MESSAGE_SIZE)
    }

    /// Assembler rejecting messages over `max_size` bytes.
    pub fn with_max_size(max_size: usize) -> Self {
        Self {
            buf: Vec::new(),
            max_size,
        }
    }

    /// Append a fragment. Returns the message once `fin` is seen.
    pub fn push(&mut self, payload: &[u8], fin: bool) -> Result<Option<String>, ClientError> {
        if self.buf.len() + payload.len() > self.max_size {
            self.buf.clear();
            return Err(ClientError::TransportFrame(format!(
                "message exceeds {} bytes",
                self.max_size
            )));
        }
        self.buf.extend_from_slice(payload);
        if !fin {
            return Ok(None);
        }
        let bytes = std::mem::take(&mut self.buf);
        String::from_utf8(bytes)
            .map(Some)
            .map_err(|e| ClientError::TransportFrame(format!("invalid UTF-8: {e}")))
    }

    /// Bytes buffered for the message in progress.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new()
    }
}
