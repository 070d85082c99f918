use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use log::trace;
use thiserror::Error;

use crate::protocol::codec::FRAME_DELIMITER;

pub const DEFAULT_REPLY_LIMIT: u64 = 64 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("can't resolve {endpoint}: {source}")]
    Resolve {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },
    #[error("no addresses found for {0}")]
    Unresolvable(String),
    #[error("connection refused by {0}")]
    Refused(SocketAddr),
    #[error("connect to {0} timed out")]
    ConnectTimeout(SocketAddr),
    #[error("timed out sending request")]
    WriteTimeout,
    #[error("timed out waiting for reply")]
    ReadTimeout,
    #[error("empty response from server")]
    EmptyReply,
    #[error("reply exceeds {0} bytes without a frame delimiter")]
    ReplyTooLarge(u64),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Sending,
    AwaitingReply,
    ClosedSuccess,
    ClosedFailure,
}

/// One request/reply exchange over a dedicated TCP connection.
///
/// The connection lives only inside [`Session::execute`] and is closed before
/// it returns, whatever the result.
pub struct Session {
    host: String,
    port: u16,
    timeout: Duration,
    reply_limit: u64,
    state: SessionState,
}

impl Session {
    pub fn new<H: Into<String>>(host: H, port: u16, timeout: Duration) -> Self {
        Session {
            host: host.into(),
            port,
            timeout,
            reply_limit: DEFAULT_REPLY_LIMIT,
            state: SessionState::Idle,
        }
    }

    #[must_use]
    pub fn with_reply_limit(mut self, reply_limit: u64) -> Self {
        self.reply_limit = reply_limit;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Sends `frame` and returns the first reply line, delimiter included.
    ///
    /// Every step of the exchange shares a single `timeout` budget. Anything the peer
    /// sends after the first delimiter is discarded.
    pub fn execute(&mut self, frame: &[u8]) -> Result<Vec<u8>, TransportError> {
        let deadline = Instant::now() + self.timeout;
        let result = self.round_trip(frame, deadline);
        self.transition(match result {
            Ok(_) => SessionState::ClosedSuccess,
            Err(_) => SessionState::ClosedFailure,
        });
        result
    }

    fn round_trip(&mut self, frame: &[u8], deadline: Instant) -> Result<Vec<u8>, TransportError> {
        self.transition(SessionState::Connecting);
        let mut stream = self.connect(deadline)?;

        self.transition(SessionState::Sending);
        send(&mut stream, frame, deadline)?;

        self.transition(SessionState::AwaitingReply);
        read_line(&stream, deadline, self.reply_limit)
    }

    fn connect(&self, deadline: Instant) -> Result<TcpStream, TransportError> {
        let endpoint = self.endpoint();
        let addrs: Vec<SocketAddr> = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|source| TransportError::Resolve {
                endpoint: endpoint.clone(),
                source,
            })?
            .collect();

        let mut last_error = TransportError::Unresolvable(endpoint);
        for addr in addrs {
            let budget = remaining(deadline).ok_or(TransportError::ConnectTimeout(addr))?;
            trace!("Connecting to {} (budget {:?})", addr, budget);
            match TcpStream::connect_timeout(&addr, budget) {
                Ok(stream) => return Ok(stream),
                Err(e) if e.kind() == ErrorKind::ConnectionRefused => {
                    last_error = TransportError::Refused(addr);
                }
                Err(e) if is_timeout(&e) => {
                    last_error = TransportError::ConnectTimeout(addr);
                }
                Err(e) => {
                    last_error = TransportError::Io(e);
                }
            }
        }
        Err(last_error)
    }

    fn transition(&mut self, state: SessionState) {
        trace!("Session {}: {:?} -> {:?}", self.endpoint(), self.state, state);
        self.state = state;
    }
}

/// Runs a single exchange with a fresh [`Session`].
pub fn execute(
    host: &str,
    port: u16,
    frame: &[u8],
    timeout: Duration,
) -> Result<Vec<u8>, TransportError> {
    Session::new(host, port, timeout).execute(frame)
}

fn send(stream: &mut TcpStream, frame: &[u8], deadline: Instant) -> Result<(), TransportError> {
    stream.set_write_timeout(Some(
        remaining(deadline).ok_or(TransportError::WriteTimeout)?,
    ))?;
    stream
        .write_all(frame)
        .and_then(|_| stream.flush())
        .map_err(|e| {
            if is_timeout(&e) {
                TransportError::WriteTimeout
            } else {
                TransportError::Io(e)
            }
        })
}

fn read_line(stream: &TcpStream, deadline: Instant, limit: u64) -> Result<Vec<u8>, TransportError> {
    let mut reader = BufReader::new(stream);
    let mut line = Vec::new();
    loop {
        stream.set_read_timeout(Some(
            remaining(deadline).ok_or(TransportError::ReadTimeout)?,
        ))?;
        let (found, used) = {
            let available = match reader.fill_buf() {
                Ok(v) => v,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if is_timeout(&e) => return Err(TransportError::ReadTimeout),
                Err(e) => return Err(TransportError::Io(e)),
            };
            if available.is_empty() {
                // Peer closed the connection.
                break;
            }
            match available.iter().position(|b| *b == FRAME_DELIMITER) {
                Some(pos) => {
                    line.extend_from_slice(&available[..=pos]);
                    (true, pos + 1)
                }
                None => {
                    line.extend_from_slice(available);
                    (false, available.len())
                }
            }
        };
        reader.consume(used);
        if found {
            return Ok(line);
        }
        if line.len() as u64 > limit {
            return Err(TransportError::ReplyTooLarge(limit));
        }
    }
    if line.is_empty() {
        return Err(TransportError::EmptyReply);
    }
    Ok(line)
}

fn remaining(deadline: Instant) -> Option<Duration> {
    Some(deadline.saturating_duration_since(Instant::now())).filter(|left| !left.is_zero())
}

fn is_timeout(e: &std::io::Error) -> bool {
    matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
}
