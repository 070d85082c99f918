#![allow(dead_code)]

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::thread::JoinHandle;

use octocompile::client::presenter::Presenter;
use octocompile::config::Config;

/// Compile service stand-in answering a fixed number of connections in order.
pub struct StubService {
    port: u16,
    handle: JoinHandle<Vec<Vec<u8>>>,
}

impl StubService {
    pub fn spawn<F>(connections: usize, handler: F) -> Self
    where
        F: Fn(usize, &[u8], &mut TcpStream) + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = thread::spawn(move || {
            let mut requests = Vec::new();
            for index in 0..connections {
                let (mut stream, _) = listener.accept().unwrap();
                let mut request = Vec::new();
                BufReader::new(&stream).read_until(b'\n', &mut request).unwrap();
                handler(index, &request, &mut stream);
                requests.push(request);
            }
            requests
        });
        StubService { port, handle }
    }

    /// Replies to every connection with `reply` as is.
    pub fn replying(connections: usize, reply: &'static str) -> Self {
        Self::spawn(connections, move |_, _, stream| {
            stream.write_all(reply.as_bytes()).unwrap();
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Waits for the service to finish and returns the received request frames.
    pub fn requests(self) -> Vec<Vec<u8>> {
        self.handle.join().unwrap()
    }
}

pub fn config(port: u16) -> Config {
    Config {
        port,
        timeout_ms: 2000,
        ..Default::default()
    }
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[derive(Default)]
pub struct Recorder {
    pub cleared: usize,
    pub statuses: Vec<String>,
    pub diagnostics: Vec<String>,
    pub outputs: Vec<String>,
    pub artifacts: Vec<Option<Vec<u8>>>,
    pub exit_codes: Vec<i32>,
}

impl Presenter for Recorder {
    fn on_cleared(&mut self) {
        self.cleared += 1;
    }

    fn on_status_changed(&mut self, status: &str) {
        self.statuses.push(status.to_string());
    }

    fn on_diagnostics(&mut self, text: &str) {
        self.diagnostics.push(text.to_string());
    }

    fn on_output(&mut self, text: &str) {
        self.outputs.push(text.to_string());
    }

    fn on_artifact_available(&mut self, artifact: Option<Vec<u8>>) {
        self.artifacts.push(artifact);
    }

    fn on_exit_code(&mut self, code: i32) {
        self.exit_codes.push(code);
    }
}
