use std::sync::Arc;

use log::warn;
use thiserror::Error;

use crate::protocol::encoding::{Base64Encoding, BinaryEncoding};
use crate::protocol::message::{CompileRequest, CompileResult, WireReply, WireRequest};

pub const FRAME_DELIMITER: u8 = b'\n';

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("malformed reply frame: {0}")]
    MalformedFrame(#[source] serde_json::Error),
    #[error("malformed {encoding} artifact: {reason}")]
    MalformedBinary {
        encoding: &'static str,
        reason: String,
    },
    #[error("reply is not valid UTF-8: {0}")]
    InvalidText(#[source] std::str::Utf8Error),
    #[error("can't encode request: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Newline-delimited JSON framing for compile requests and replies.
#[derive(Clone)]
pub struct MessageCodec {
    binary: Arc<dyn BinaryEncoding>,
}

impl Default for MessageCodec {
    fn default() -> Self {
        MessageCodec::new(Arc::new(Base64Encoding))
    }
}

impl MessageCodec {
    pub fn new(binary: Arc<dyn BinaryEncoding>) -> Self {
        MessageCodec { binary }
    }

    /// Serializes a request into one frame terminated by a single `\n`.
    ///
    /// JSON string escaping guarantees that newlines inside the source text
    /// never appear raw in the frame.
    pub fn encode(&self, request: &CompileRequest) -> Result<Vec<u8>, CodecError> {
        let mut frame =
            serde_json::to_vec(&WireRequest::from(request)).map_err(CodecError::Encode)?;
        frame.push(FRAME_DELIMITER);
        Ok(frame)
    }

    /// Parses one raw reply line as received from the transport.
    pub fn decode_frame(&self, frame: &[u8]) -> Result<CompileResult, CodecError> {
        self.decode(std::str::from_utf8(frame).map_err(CodecError::InvalidText)?)
    }

    /// Parses one reply line.
    ///
    /// An artifact field that can't be decoded is logged and dropped: the
    /// reply is still returned with `binary` set to `None`. So is an artifact
    /// attached to a failure where nothing ran.
    pub fn decode(&self, line: &str) -> Result<CompileResult, CodecError> {
        let reply: WireReply = serde_json::from_str(line.trim_end_matches(['\r', '\n']))
            .map_err(CodecError::MalformedFrame)?;
        let error_message = non_empty(reply.error);

        let mut binary = match non_empty(reply.binary_base64) {
            Some(text) => match self.decode_binary(&text) {
                Ok(data) => Some(data),
                Err(e) => {
                    warn!("Ignoring artifact field: {}", e);
                    None
                }
            },
            None => None,
        };
        let compile_failed =
            error_message.is_some() && reply.run_stdout.is_empty() && reply.run_stderr.is_empty();
        if compile_failed && binary.take().is_some() {
            warn!("Ignoring artifact of a failed compilation");
        }

        Ok(CompileResult {
            compile_stdout: reply.compile_stdout,
            compile_stderr: reply.compile_stderr,
            run_stdout: reply.run_stdout,
            run_stderr: reply.run_stderr,
            exit_code: reply.exit_code,
            error_message,
            binary,
        })
    }

    pub fn decode_binary(&self, text: &str) -> Result<Vec<u8>, CodecError> {
        self.binary
            .decode(text)
            .map_err(|reason| CodecError::MalformedBinary {
                encoding: self.binary.name(),
                reason,
            })
    }

    pub fn encode_binary(&self, data: &[u8]) -> String {
        self.binary.encode(data)
    }
}

// The service writes "" for fields it has nothing to say about.
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
