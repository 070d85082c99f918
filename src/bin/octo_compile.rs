use std::fs;
use std::io;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{ArgAction, Parser};
use log::{error, info};

use octocompile::client::coordinator::Coordinator;
use octocompile::client::presenter::ConsolePresenter;
use octocompile::client::projector::Status;
use octocompile::config::{Config, Overrides};
use octocompile::utils;

const EXIT_SUCCESS: i32 = 0;
const EXIT_REMOTE_ERROR: i32 = 1;
const EXIT_FAILED: i32 = 2;
const EXIT_USAGE: i32 = 3;

const SAMPLE_PROGRAM: &str = r#"#include <stdio.h>

int main(void) {
    printf("Hello from remote compiler!\n");
    return 0;
}
"#;

/// Send source code to a remote compile service and show what it returns.
#[derive(Parser)]
#[command(name = "octo_compile", version)]
struct Args {
    /// Source file, `-` for stdin. A sample program is sent when omitted.
    source: Option<PathBuf>,
    #[arg(long)]
    host: Option<String>,
    #[arg(long)]
    port: Option<u16>,
    #[arg(long)]
    timeout_ms: Option<u64>,
    #[arg(long)]
    language: Option<String>,
    /// Save the returned executable to this path.
    #[arg(long, value_name = "PATH")]
    save: Option<PathBuf>,
    /// Show configuration paths and values, then exit.
    #[arg(long)]
    config: bool,
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
    /// Arguments passed to the compiled program.
    #[arg(last = true)]
    args: Vec<String>,
}

fn main() {
    std::process::exit(run(Args::parse()));
}

fn run(args: Args) -> i32 {
    if let Err(e) = utils::init_logger(log_level(args.verbose)) {
        eprintln!("Can't initialize logging: {e}");
    }
    if args.config {
        Config::help();
        return EXIT_SUCCESS;
    }

    let config = match Config::load_with(Overrides {
        host: args.host,
        port: args.port,
        timeout_ms: args.timeout_ms,
        language: args.language,
    }) {
        Ok(v) => v,
        Err(e) => {
            error!("FATAL ERROR: Can't load configuration: {}", e);
            return EXIT_USAGE;
        }
    };
    let source = match read_source(args.source.as_deref()) {
        Ok(v) => v,
        Err(e) => {
            error!("FATAL ERROR: Can't read source: {}", e);
            return EXIT_USAGE;
        }
    };

    // Worker gives up after the session timeout; name resolution is on top of it.
    let budget = config.timeout() + Duration::from_secs(5);
    let mut coordinator = Coordinator::new(config);
    coordinator.set_arguments(args.args);
    let mut presenter = ConsolePresenter::new(io::stdout());

    info!("Sending request to {}", coordinator.config().endpoint());
    if let Err(e) = coordinator.submit(&mut presenter, &source) {
        error!("{}", e);
        return EXIT_USAGE;
    }
    let dispatched = match coordinator.wait(&mut presenter, budget) {
        Some(v) => v,
        None => {
            error!("No outcome within {:?}", budget);
            return EXIT_FAILED;
        }
    };
    info!("Request #{} finished: {}", dispatched.generation, dispatched.status);

    if let Some(path) = args.save {
        if let Some(code) = save_artifact(&presenter, &path, &dispatched.status) {
            return code;
        }
    }

    exit_code(&dispatched.status)
}

fn exit_code(status: &Status) -> i32 {
    match status {
        Status::Succeeded => EXIT_SUCCESS,
        Status::RemoteError(_) => EXIT_REMOTE_ERROR,
        Status::TransportFailed(_) | Status::ProtocolFailed(_) | Status::EmptyReply => EXIT_FAILED,
    }
}

/// Saves the artifact of the finished submission, returning the exit code
/// that replaces the outcome's one when saving a delivered reply fails.
fn save_artifact<W: Write>(
    presenter: &ConsolePresenter<W>,
    path: &Path,
    status: &Status,
) -> Option<i32> {
    match presenter.save_artifact(path) {
        Ok(()) => {
            info!("Binary saved to {}", path.display());
            None
        }
        Err(e) => {
            error!("Can't save {}: {}", path.display(), e);
            Some(EXIT_USAGE).filter(|_| status.delivered())
        }
    }
}

fn read_source(path: Option<&Path>) -> io::Result<String> {
    match path {
        None => Ok(SAMPLE_PROGRAM.to_string()),
        Some(p) if p.as_os_str() == "-" => {
            let mut source = String::new();
            io::stdin().read_to_string(&mut source)?;
            Ok(source)
        }
        Some(p) => fs::read_to_string(p),
    }
}

fn log_level(verbose: u8) -> log::LevelFilter {
    match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use octocompile::client::presenter::Presenter;

    #[test]
    fn test_save_without_delivered_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.out");
        let mut presenter = ConsolePresenter::new(Vec::new());
        presenter.on_cleared();

        assert_eq!(save_artifact(&presenter, &path, &Status::EmptyReply), None);
        assert_eq!(exit_code(&Status::EmptyReply), EXIT_FAILED);
        assert_eq!(
            save_artifact(&presenter, &path, &Status::RemoteError("x".to_string())),
            Some(EXIT_USAGE)
        );
        assert!(!path.exists());
    }

    #[test]
    fn test_save_delivered_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.out");
        let mut presenter = ConsolePresenter::new(Vec::new());
        presenter.on_cleared();
        presenter.on_artifact_available(Some(vec![0x7f, b'E', b'L', b'F']));

        assert_eq!(save_artifact(&presenter, &path, &Status::Succeeded), None);
        assert_eq!(fs::read(&path).unwrap(), b"\x7fELF".to_vec());
    }
}
