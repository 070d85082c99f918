use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use log::{debug, trace};
use thiserror::Error;

use crate::client::presenter::Presenter;
use crate::client::projector::{self, Status};
use crate::client::session::{Session, TransportError};
use crate::config::Config;
use crate::protocol::codec::{CodecError, MessageCodec};
use crate::protocol::message::{CompileRequest, CompileResult};

#[derive(Debug)]
pub enum RequestOutcome {
    Delivered(CompileResult),
    TransportFailed(TransportError),
    ProtocolFailed(CodecError),
    EmptyReply,
}

impl From<TransportError> for RequestOutcome {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::EmptyReply => RequestOutcome::EmptyReply,
            e => RequestOutcome::TransportFailed(e),
        }
    }
}

impl From<CodecError> for RequestOutcome {
    fn from(e: CodecError) -> Self {
        RequestOutcome::ProtocolFailed(e)
    }
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("source code is empty")]
    EmptySource,
}

/// Delivered outcome of the latest submission.
#[derive(Debug, PartialEq, Eq)]
pub struct Dispatched {
    pub generation: u64,
    pub status: Status,
}

struct OutcomeMessage {
    generation: u64,
    outcome: RequestOutcome,
}

/// Runs submissions on worker threads and hands their outcomes back to the
/// thread that owns it.
///
/// Every submission gets a generation number. Only the outcome of the latest
/// generation reaches the presenter; outcomes of superseded submissions are
/// dropped when they arrive. A superseded request is not cancelled.
pub struct Coordinator {
    config: Arc<Config>,
    codec: MessageCodec,
    arguments: Vec<String>,
    tx_outcome: Sender<OutcomeMessage>,
    rx_outcome: Receiver<OutcomeMessage>,
    generation: u64,
    in_flight: usize,
}

impl Coordinator {
    pub fn new(config: Config) -> Self {
        Self::with_codec(config, MessageCodec::default())
    }

    pub fn with_codec(config: Config, codec: MessageCodec) -> Self {
        let (tx_outcome, rx_outcome) = crossbeam_channel::unbounded();
        Coordinator {
            config: Arc::new(config),
            codec,
            arguments: Vec::new(),
            tx_outcome,
            rx_outcome,
            generation: 0,
            in_flight: 0,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Arguments passed to the compiled program by subsequent submissions.
    pub fn set_arguments(&mut self, arguments: Vec<String>) {
        self.arguments = arguments;
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Starts a request for `source` and returns its generation.
    ///
    /// The presenter is cleared before this returns; the outcome arrives later
    /// through [`dispatch`](Self::dispatch) or [`wait`](Self::wait).
    pub fn submit<P: Presenter + ?Sized>(
        &mut self,
        presenter: &mut P,
        source: &str,
    ) -> Result<u64, SubmitError> {
        if source.trim().is_empty() {
            return Err(SubmitError::EmptySource);
        }
        let request = CompileRequest::new(self.config.language.as_str(), source, &self.arguments);

        presenter.on_cleared();
        self.generation += 1;
        self.in_flight += 1;
        let generation = self.generation;
        debug!(
            "Submitting request #{} to {} ({} bytes of source)",
            generation,
            self.config.endpoint(),
            request.source.len()
        );

        let config = self.config.clone();
        let codec = self.codec.clone();
        let tx_outcome = self.tx_outcome.clone();
        let spawned = thread::Builder::new()
            .name(format!("compile-{generation}"))
            .spawn(move || {
                let outcome = run_request(&config, &codec, &request);
                // Receiver lives as long as the coordinator.
                drop(tx_outcome.send(OutcomeMessage {
                    generation,
                    outcome,
                }));
            });
        if let Err(e) = spawned {
            drop(self.tx_outcome.send(OutcomeMessage {
                generation,
                outcome: RequestOutcome::TransportFailed(TransportError::Io(e)),
            }));
        }
        Ok(generation)
    }

    /// Delivers every outcome that already arrived, without blocking.
    pub fn dispatch<P: Presenter + ?Sized>(&mut self, presenter: &mut P) -> Option<Dispatched> {
        let mut last = None;
        loop {
            match self.rx_outcome.try_recv() {
                Ok(message) => {
                    if let Some(dispatched) = self.deliver(presenter, message) {
                        last = Some(dispatched);
                    }
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return last,
            }
        }
    }

    /// Blocks until the latest submission is delivered, `timeout` elapses or
    /// nothing is in flight.
    pub fn wait<P: Presenter + ?Sized>(
        &mut self,
        presenter: &mut P,
        timeout: Duration,
    ) -> Option<Dispatched> {
        let deadline = Instant::now() + timeout;
        while self.in_flight > 0 {
            let left = deadline.saturating_duration_since(Instant::now());
            match self.rx_outcome.recv_timeout(left) {
                Ok(message) => {
                    if let Some(dispatched) = self.deliver(presenter, message) {
                        return Some(dispatched);
                    }
                }
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    return None;
                }
            }
        }
        None
    }

    fn deliver<P: Presenter + ?Sized>(
        &mut self,
        presenter: &mut P,
        message: OutcomeMessage,
    ) -> Option<Dispatched> {
        self.in_flight -= 1;
        if message.generation != self.generation {
            debug!(
                "Dropping outcome of superseded request #{} (latest #{})",
                message.generation, self.generation
            );
            return None;
        }
        trace!("Delivering outcome of request #{}", message.generation);
        let status = projector::apply(presenter, projector::project(message.outcome));
        Some(Dispatched {
            generation: message.generation,
            status,
        })
    }
}

/// Encode, round trip and decode for one request. Runs on the calling thread.
pub fn run_request(
    config: &Config,
    codec: &MessageCodec,
    request: &CompileRequest,
) -> RequestOutcome {
    let frame = match codec.encode(request) {
        Ok(v) => v,
        Err(e) => return e.into(),
    };
    let reply = match Session::new(config.host.as_str(), config.port, config.timeout())
        .with_reply_limit(config.reply_limit())
        .execute(&frame)
    {
        Ok(v) => v,
        Err(e) => return e.into(),
    };
    match codec.decode_frame(&reply) {
        Ok(result) => RequestOutcome::Delivered(result),
        Err(e) => e.into(),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl Presenter for Recorder {
        fn on_cleared(&mut self) {
            self.events.push("cleared".to_string());
        }

        fn on_status_changed(&mut self, status: &str) {
            self.events.push(format!("status: {status}"));
        }

        fn on_diagnostics(&mut self, text: &str) {
            self.events.push(format!("diagnostics: {text}"));
        }

        fn on_output(&mut self, text: &str) {
            self.events.push(format!("output: {text}"));
        }

        fn on_artifact_available(&mut self, artifact: Option<Vec<u8>>) {
            self.events.push(format!("artifact: {artifact:?}"));
        }
    }

    #[test]
    fn test_outcome_from_transport_error() {
        assert!(matches!(
            RequestOutcome::from(TransportError::EmptyReply),
            RequestOutcome::EmptyReply
        ));
        assert!(matches!(
            RequestOutcome::from(TransportError::ReadTimeout),
            RequestOutcome::TransportFailed(TransportError::ReadTimeout)
        ));
    }

    #[test]
    fn test_submit_empty_source() {
        let mut coordinator = Coordinator::new(Config::default());
        let mut recorder = Recorder::default();
        assert!(matches!(
            coordinator.submit(&mut recorder, " \n\t"),
            Err(SubmitError::EmptySource)
        ));
        assert!(recorder.events.is_empty());
        assert_eq!(coordinator.generation(), 0);
        assert_eq!(coordinator.wait(&mut recorder, Duration::from_millis(10)), None);
    }

    #[test]
    fn test_stale_outcome_dropped() {
        let mut coordinator = Coordinator::new(Config::default());
        let mut recorder = Recorder::default();
        coordinator.generation = 2;
        coordinator.in_flight = 2;
        for generation in [1, 2] {
            coordinator
                .tx_outcome
                .send(OutcomeMessage {
                    generation,
                    outcome: RequestOutcome::EmptyReply,
                })
                .unwrap();
        }

        assert_eq!(
            coordinator.dispatch(&mut recorder),
            Some(Dispatched {
                generation: 2,
                status: Status::EmptyReply,
            })
        );
        assert_eq!(coordinator.in_flight(), 0);
        assert_eq!(recorder.events, vec!["status: empty response from server"]);
    }
}
