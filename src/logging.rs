use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Filter used when RUST_LOG is not set
pub const DEFAULT_LOG_FILTER: &str = "info";

const DEFAULT_LOG_FILE: &str = "release-watch.log";

/// Install the global subscriber writing to `log_path`.
///
/// The returned guard flushes buffered lines on drop and must be kept alive
/// for the lifetime of the process.
pub fn init(log_path: &Path, json: bool) -> io::Result<WorkerGuard> {
    let (dir, file_name) = split_log_path(log_path);
    std::fs::create_dir_all(&dir)?;

    let appender = tracing_appender::rolling::never(&dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false);

    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(io::Error::other)?;

    Ok(guard)
}

fn split_log_path(log_path: &Path) -> (PathBuf, OsString) {
    let dir = log_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let file_name = log_path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_else(|| OsString::from(DEFAULT_LOG_FILE));
    (dir, file_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("/var/lib/release-watch/app.log", "/var/lib/release-watch", "app.log")]
    #[case("app.log", ".", "app.log")]
    #[case("/", ".", "release-watch.log")]
    fn split_log_path_separates_directory_and_file(
        #[case] path: &str,
        #[case] dir: &str,
        #[case] file: &str,
    ) {
        let (actual_dir, actual_file) = split_log_path(Path::new(path));

        assert_eq!(actual_dir, PathBuf::from(dir));
        assert_eq!(actual_file, OsString::from(file));
    }
}
