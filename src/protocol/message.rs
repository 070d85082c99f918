use serde::{Deserialize, Serialize};

pub const DEFAULT_LANGUAGE: &str = "c";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompileRequest {
    // Source language identifier
    pub language: String,
    // Full source text
    pub source: String,
    // Arguments passed to the produced program
    pub arguments: Vec<String>,
}

impl CompileRequest {
    /// Builds a request owning its own copy of `source`, so later edits of
    /// the caller's buffer never reach an in-flight request.
    pub fn new<L: Into<String>>(language: L, source: &str, arguments: &[String]) -> Self {
        CompileRequest {
            language: language.into(),
            source: source.to_string(),
            arguments: arguments.to_vec(),
        }
    }
}

/// Decoded reply of the compile service.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CompileResult {
    pub compile_stdout: String,
    pub compile_stderr: String,
    pub run_stdout: String,
    pub run_stderr: String,
    // Exit status of the last executed step, if the service reported one
    pub exit_code: Option<i32>,
    // Top-level remote failure description
    pub error_message: Option<String>,
    // Compiled executable
    pub binary: Option<Vec<u8>>,
}

impl CompileResult {
    pub fn success(&self) -> bool {
        self.error_message.is_none()
    }
}

#[derive(Serialize)]
pub(crate) struct WireRequest<'a> {
    pub language: &'a str,
    pub source: &'a str,
    pub args: &'a [String],
}

impl<'a> From<&'a CompileRequest> for WireRequest<'a> {
    fn from(request: &'a CompileRequest) -> Self {
        WireRequest {
            language: &request.language,
            source: &request.source,
            args: &request.arguments,
        }
    }
}

#[derive(Deserialize)]
pub(crate) struct WireReply {
    #[serde(default)]
    pub compile_stdout: String,
    #[serde(default)]
    pub compile_stderr: String,
    #[serde(default)]
    pub run_stdout: String,
    #[serde(default)]
    pub run_stderr: String,
    #[serde(default)]
    pub exit_code: Option<i32>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub binary_base64: Option<String>,
}
