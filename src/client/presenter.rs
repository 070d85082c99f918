use std::io::Write;
use std::path::Path;

use log::warn;

use crate::artifact::{ArtifactSlot, SaveError};

/// Receiver of everything a submission makes visible.
///
/// Callbacks run on the thread that owns the [`Coordinator`](super::coordinator::Coordinator),
/// never on a worker thread.
pub trait Presenter {
    // Start of a submission: previous result must disappear.
    fn on_cleared(&mut self);
    // Terminal status, once per submission.
    fn on_status_changed(&mut self, status: &str);
    fn on_diagnostics(&mut self, text: &str);
    fn on_output(&mut self, text: &str);
    fn on_artifact_available(&mut self, artifact: Option<Vec<u8>>);

    fn on_exit_code(&mut self, _code: i32) {}
}

/// Presenter printing the panels of a finished submission to a stream.
pub struct ConsolePresenter<W: Write> {
    out: W,
    artifact: ArtifactSlot,
    status: Option<String>,
}

impl<W: Write> ConsolePresenter<W> {
    pub fn new(out: W) -> Self {
        ConsolePresenter {
            out,
            artifact: ArtifactSlot::new(),
            status: None,
        }
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn artifact(&self) -> Option<&[u8]> {
        self.artifact.get()
    }

    pub fn save_artifact(&self, path: &Path) -> Result<(), SaveError> {
        self.artifact.save_to(path)
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn panel(&mut self, title: &str, text: &str) {
        let result = writeln!(self.out, "== {title} ==").and_then(|_| {
            if text.is_empty() {
                Ok(())
            } else if text.ends_with('\n') {
                self.out.write_all(text.as_bytes())
            } else {
                writeln!(self.out, "{text}")
            }
        });
        if let Err(e) = result {
            warn!("Can't write {} panel: {}", title, e);
        }
    }
}

impl<W: Write> Presenter for ConsolePresenter<W> {
    fn on_cleared(&mut self) {
        self.artifact.clear();
        self.status = None;
    }

    fn on_status_changed(&mut self, status: &str) {
        self.status = Some(status.to_string());
        if let Err(e) = writeln!(self.out, "Status: {status}").and_then(|_| self.out.flush()) {
            warn!("Can't write status: {}", e);
        }
    }

    fn on_diagnostics(&mut self, text: &str) {
        self.panel("Compile Diagnostics", text);
    }

    fn on_output(&mut self, text: &str) {
        self.panel("Program Output", text);
    }

    fn on_artifact_available(&mut self, artifact: Option<Vec<u8>>) {
        self.artifact.store(artifact);
    }

    fn on_exit_code(&mut self, code: i32) {
        if let Err(e) = writeln!(self.out, "Exit code: {code}") {
            warn!("Can't write exit code: {}", e);
        }
    }
}
