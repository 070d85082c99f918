use std::fmt::{Display, Formatter};

use crate::client::coordinator::RequestOutcome;
use crate::client::presenter::Presenter;
use crate::protocol::message::CompileResult;

const SEPARATOR: &str = "\n";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Status {
    Succeeded,
    RemoteError(String),
    TransportFailed(String),
    ProtocolFailed(String),
    EmptyReply,
}

impl Status {
    /// Whether the reply made it through the protocol, with or without a remote error.
    pub fn delivered(&self) -> bool {
        matches!(self, Status::Succeeded | Status::RemoteError(_))
    }
}

impl Display for Status {
    fn fmt(&self, f: &mut Formatter) -> Result<(), ::std::fmt::Error> {
        match self {
            Status::Succeeded => write!(f, "completed successfully"),
            Status::RemoteError(ref message) => write!(f, "completed with error: {}", message),
            Status::TransportFailed(ref reason) => write!(f, "connection error: {}", reason),
            Status::ProtocolFailed(ref reason) => write!(f, "invalid response: {}", reason),
            Status::EmptyReply => write!(f, "empty response from server"),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ArtifactUpdate {
    // Keep whatever the pre-submission clear left behind
    Untouched,
    Cleared,
    Available(Vec<u8>),
}

/// What a single outcome shows on each channel. `None` leaves a channel alone.
#[derive(Debug, PartialEq, Eq)]
pub struct Projection {
    pub diagnostics: Option<String>,
    pub output: Option<String>,
    pub exit_code: Option<i32>,
    pub artifact: ArtifactUpdate,
    pub status: Status,
}

pub fn project(outcome: RequestOutcome) -> Projection {
    match outcome {
        RequestOutcome::Delivered(result) => project_result(result),
        RequestOutcome::TransportFailed(e) => failure(Status::TransportFailed(e.to_string())),
        RequestOutcome::ProtocolFailed(e) => failure(Status::ProtocolFailed(e.to_string())),
        RequestOutcome::EmptyReply => failure(Status::EmptyReply),
    }
}

/// Pushes a projection to the presenter, terminal status last.
pub fn apply<P: Presenter + ?Sized>(presenter: &mut P, projection: Projection) -> Status {
    if let Some(ref text) = projection.diagnostics {
        presenter.on_diagnostics(text);
    }
    if let Some(ref text) = projection.output {
        presenter.on_output(text);
    }
    match projection.artifact {
        ArtifactUpdate::Untouched => {}
        ArtifactUpdate::Cleared => presenter.on_artifact_available(None),
        ArtifactUpdate::Available(data) => presenter.on_artifact_available(Some(data)),
    }
    if let Some(code) = projection.exit_code {
        presenter.on_exit_code(code);
    }
    presenter.on_status_changed(&projection.status.to_string());
    projection.status
}

fn project_result(result: CompileResult) -> Projection {
    Projection {
        diagnostics: Some(join(result.compile_stdout, &result.compile_stderr)),
        output: Some(join(result.run_stdout, &result.run_stderr)),
        exit_code: result.exit_code,
        artifact: match result.binary {
            Some(data) => ArtifactUpdate::Available(data),
            None => ArtifactUpdate::Cleared,
        },
        status: match result.error_message {
            Some(message) => Status::RemoteError(message),
            None => Status::Succeeded,
        },
    }
}

fn failure(status: Status) -> Projection {
    Projection {
        diagnostics: None,
        output: None,
        exit_code: None,
        artifact: ArtifactUpdate::Untouched,
        status,
    }
}

fn join(mut head: String, tail: &str) -> String {
    if !tail.is_empty() {
        head.push_str(SEPARATOR);
        head.push_str(tail);
    }
    head
}

#[cfg(test)]
mod test {
    use super::*;

    use crate::client::session::TransportError;
    use crate::protocol::codec::MessageCodec;

    #[test]
    fn test_project_success() {
        let projection = project(RequestOutcome::Delivered(CompileResult {
            binary: Some(vec![0, 1, 2]),
            ..Default::default()
        }));
        assert_eq!(
            projection,
            Projection {
                diagnostics: Some(String::new()),
                output: Some(String::new()),
                exit_code: None,
                artifact: ArtifactUpdate::Available(vec![0, 1, 2]),
                status: Status::Succeeded,
            }
        );
        assert_eq!(projection.status.to_string(), "completed successfully");
    }

    #[test]
    fn test_project_remote_error() {
        let projection = project(RequestOutcome::Delivered(CompileResult {
            compile_stdout: "gcc output".to_string(),
            compile_stderr: "error: expected ';'".to_string(),
            run_stderr: "never shown alone".to_string(),
            error_message: Some("compilation failed".to_string()),
            ..Default::default()
        }));
        assert_eq!(
            projection.diagnostics.as_deref(),
            Some("gcc output\nerror: expected ';'")
        );
        assert_eq!(projection.output.as_deref(), Some("\nnever shown alone"));
        assert_eq!(projection.artifact, ArtifactUpdate::Cleared);
        assert_eq!(
            projection.status.to_string(),
            "completed with error: compilation failed"
        );
        assert!(projection.status.delivered());
    }

    #[test]
    fn test_project_failures_leave_channels() {
        for (outcome, text) in vec![
            (RequestOutcome::EmptyReply, "empty response from server"),
            (
                RequestOutcome::TransportFailed(TransportError::ReadTimeout),
                "connection error: timed out waiting for reply",
            ),
        ] {
            let projection = project(outcome);
            assert_eq!(projection.diagnostics, None);
            assert_eq!(projection.output, None);
            assert_eq!(projection.artifact, ArtifactUpdate::Untouched);
            assert_eq!(projection.status.to_string(), text);
            assert!(!projection.status.delivered());
        }

        let error = MessageCodec::default().decode("not json").unwrap_err();
        let projection = project(RequestOutcome::ProtocolFailed(error));
        assert!(projection.status.to_string().starts_with("invalid response: "));
    }
}
