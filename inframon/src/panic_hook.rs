use chrono::Local;
use std::{
    backtrace::Backtrace,
    fs::OpenOptions,
    io::Write,
    panic::{PanicHookInfo, take_hook},
    path::{Path, PathBuf},
    thread,
};

use crate::config::FileLogSettings;

/// Installs a global panic hook that logs panics via `tracing`.
///
/// With file logging, the record is also appended straight to the current daily
/// log file: release builds abort on panic and the non-blocking writer may not
/// flush first.
pub fn install(file: Option<&FileLogSettings>) {
    let target = file.map(|f| (f.directory.clone(), f.file_name.clone()));
    let previous_hook = take_hook();

    std::panic::set_hook(Box::new(move |panic_info: &PanicHookInfo<'_>| {
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let panic_record = format_panic_record(panic_info);

            tracing::error!(target: "inframon::panic", "{panic_record}");

            if cfg!(panic = "abort")
                && let Some((dir, file_name)) = &target
            {
                let _ = append_panic_record(dir, file_name, &panic_record);
            }
        }));

        previous_hook(panic_info);
    }));
}

fn append_panic_record(log_dir: &Path, file_name: &str, record: &str) -> std::io::Result<()> {
    // matches `tracing_appender::rolling::daily` naming
    let filename = format!("{file_name}.{}", Local::now().format("%Y-%m-%d"));
    let path = PathBuf::from(log_dir).join(filename);

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{record}")?;
    file.flush()
}

fn format_panic_record(panic_info: &PanicHookInfo<'_>) -> String {
    let payload = panic_info
        .payload()
        .downcast_ref::<&'static str>()
        .map(|s| (*s).to_string())
        .or_else(|| panic_info.payload().downcast_ref::<String>().cloned())
        .unwrap_or_else(|| panic_info.to_string());
    let location = panic_info
        .location()
        .map_or_else(|| "<unknown>".to_string(), |loc| loc.to_string());
    let current = thread::current();
    let thread_name = current.name().unwrap_or("<unnamed>");

    format!(
        "{} PANIC thread={thread_name} location={location} payload={payload}\nBacktrace:\n{}",
        Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z"),
        Backtrace::force_capture()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_panic_record_uses_daily_name() {
        let dir = tempfile::tempdir().unwrap();
        append_panic_record(dir.path(), "inframon.log", "PANIC payload=boom").unwrap();

        let expected = dir
            .path()
            .join(format!("inframon.log.{}", Local::now().format("%Y-%m-%d")));
        let contents = std::fs::read_to_string(expected).unwrap();
        assert!(contents.contains("payload=boom"));
    }
}
