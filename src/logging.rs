//! Logger setup: stdout at the chosen level, optional debug log file

use anyhow::{Context, Result};
use log::LevelFilter;
use std::path::Path;

pub fn setup_logger(level: LevelFilter, log_file: Option<&Path>) -> Result<()> {
    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{} - {} - {} - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.target(),
                record.level(),
                message
            ))
        })
        .chain(fern::Dispatch::new().level(level).chain(std::io::stdout()));

    if let Some(path) = log_file {
        let file = fern::log_file(path)
            .with_context(|| format!("Failed to open log file: {:?}", path))?;
        dispatch = dispatch.chain(fern::Dispatch::new().level(LevelFilter::Debug).chain(file));
    }

    dispatch.apply().context("Logger already initialized")?;
    Ok(())
}

/// Stdout level for a `-v` count.
pub fn level_for_verbosity(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}
