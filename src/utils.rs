use std::env;
use std::io;

/// Logs to stderr and, when it can be opened, to `<exe>.log` next to the
/// executable. Stdout stays free for the result panels.
pub fn init_logger(level: log::LevelFilter) -> Result<(), fern::InitError> {
    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}] {}: {}",
                record.level(),
                record.target(),
                message
            ))
        })
        .chain(io::stderr())
        .level(level);

    if let Some(log_file) = env::current_exe()
        .ok()
        .map(|exe| exe.with_extension("log"))
    {
        match fern::log_file(&log_file) {
            Ok(file) => dispatch = dispatch.chain(file),
            Err(e) => eprintln!("Can't open log file {}: {}", log_file.display(), e),
        }
    }

    dispatch.apply()?;
    Ok(())
}
