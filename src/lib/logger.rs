use directories::ProjectDirs;
use log::LevelFilter;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

use crate::{ConfigError, Result};

/// Initialize the logger with file and console output
///
/// Console output goes to stderr so that `--output json` stays parseable.
///
/// # Arguments
///
/// * `verbose` - Enable debug level logging
/// * `quiet` - Suppress console output (logs still written to file)
///
/// # Platform-specific log locations
///
/// * **macOS**: `~/Library/Application Support/com.bulkloader.bulkloader/bulkloader.log`
/// * **Linux**: `~/.local/share/bulkloader/bulkloader.log`
/// * **Windows**: `C:\Users\<User>\AppData\Local\bulkloader\bulkloader\data\bulkloader.log`
///
pub fn init_logger(verbose: bool, quiet: bool) -> Result<()> {
    let log_level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let log_path = log_file_path()?;

    let log_file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .map_err(|e| ConfigError::InvalidValue(format!("Failed to open log file: {}", e)))?;

    let mut builder = env_logger::Builder::new();
    builder.filter_level(log_level).format_timestamp_secs();

    if quiet {
        builder.target(env_logger::Target::Pipe(Box::new(log_file)));
    } else {
        builder.target(env_logger::Target::Pipe(Box::new(TeeWriter {
            console: std::io::stderr(),
            file: log_file,
        })));
    }

    builder.init();

    log::debug!("Logging to: {}", log_path.display());

    Ok(())
}

fn log_file_path() -> Result<PathBuf> {
    if let Some(proj_dirs) = ProjectDirs::from("com", "bulkloader", "bulkloader") {
        let log_dir = proj_dirs.data_local_dir();
        fs::create_dir_all(log_dir).map_err(|e| {
            ConfigError::InvalidValue(format!("Failed to create log directory: {}", e))
        })?;
        Ok(log_dir.join("bulkloader.log"))
    } else {
        // Fallback to current directory if ProjectDirs fails
        Ok(std::env::current_dir()
            .map_err(|e| {
                ConfigError::InvalidValue(format!("Failed to get current directory: {}", e))
            })?
            .join("bulkloader.log"))
    }
}

struct TeeWriter<C: Write, F: Write> {
    console: C,
    file: F,
}

impl<C: Write, F: Write> Write for TeeWriter<C, F> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.console.write_all(buf)?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.console.flush()?;
        self.file.flush()?;
        Ok(())
    }
}
