use std::ffi::OsString;
use std::panic;
use std::path::PathBuf;
use std::sync::OnceLock;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

const LOG_DIR_VAR: &str = "JA_LOG_DIR";
const BACKTRACE_VAR: &str = "JA_LOG_INCLUDE_BACKTRACE";
const DEFAULT_FILTER: &str = "info";

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Logging knobs read from the environment once at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogSettings {
    /// Directory for daily-rotated `<app>.log` files; stdout when unset.
    pub log_dir: Option<PathBuf>,
    /// Also run the default panic hook, which prints a backtrace when
    /// `RUST_BACKTRACE` allows it.
    pub include_backtrace: bool,
}

impl LogSettings {
    pub fn from_env() -> Self {
        Self::from_values(
            std::env::var_os(LOG_DIR_VAR),
            std::env::var(BACKTRACE_VAR).ok(),
        )
    }

    fn from_values(log_dir: Option<OsString>, include_backtrace: Option<String>) -> Self {
        Self {
            log_dir: log_dir.filter(|dir| !dir.is_empty()).map(PathBuf::from),
            include_backtrace: include_backtrace.as_deref().is_some_and(is_truthy),
        }
    }
}

fn is_truthy(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

/// Routes panics through `tracing` with thread and location context. Only the
/// first call installs the hook.
pub fn install_tracing_panic_hook(app_name: &'static str) {
    static INSTALLED: OnceLock<()> = OnceLock::new();

    INSTALLED.get_or_init(|| {
        let include_backtrace = LogSettings::from_env().include_backtrace;
        let default_hook = panic::take_hook();

        panic::set_hook(Box::new(move |info| {
            let thread = std::thread::current();
            let thread_name = thread.name().unwrap_or("unnamed");
            let location = info
                .location()
                .map(|loc| format!("{}:{}", loc.file(), loc.line()));
            let message = info
                .payload()
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| info.payload().downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".into());

            tracing::error!(
                application = app_name,
                %thread_name,
                location = location.as_deref().unwrap_or("unknown"),
                panic_message = %message,
                "panic captured"
            );

            if include_backtrace {
                default_hook(info);
            }
        }));
    });
}

fn rotating_file_writer(app_name: &'static str, dir: PathBuf) -> Option<BoxMakeWriter> {
    if let Err(err) = std::fs::create_dir_all(&dir) {
        eprintln!(
            "cannot create {LOG_DIR_VAR} {}: {err}; logging to stdout",
            dir.display()
        );
        return None;
    }

    let appender = tracing_appender::rolling::daily(dir, format!("{app_name}.log"));
    let (non_blocking, guard) = tracing_appender::non_blocking(appender);
    let _ = LOG_GUARD.set(guard);
    Some(BoxMakeWriter::new(non_blocking))
}

/// Installs the global subscriber. `RUST_LOG` controls filtering (default
/// `info`); `JA_LOG_DIR` switches output to daily-rotated files.
pub fn init_tracing_subscriber(app_name: &'static str) {
    let settings = LogSettings::from_env();
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false);

    let writer = settings
        .log_dir
        .and_then(|dir| rotating_file_writer(app_name, dir));

    match writer {
        Some(writer) => {
            let _ = builder.with_ansi(false).with_writer(writer).try_init();
        }
        None => {
            let _ = builder.try_init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_log_dir_means_stdout() {
        let settings = LogSettings::from_values(Some(OsString::new()), None);
        assert_eq!(settings, LogSettings::default());
    }

    #[test]
    fn backtrace_flag_accepts_one_and_true() {
        assert!(LogSettings::from_values(None, Some("1".into())).include_backtrace);
        assert!(LogSettings::from_values(None, Some("TRUE".into())).include_backtrace);
        assert!(!LogSettings::from_values(None, Some("yes".into())).include_backtrace);
    }

    #[test]
    fn log_dir_is_kept_as_path() {
        let settings = LogSettings::from_values(Some("/var/log/ja".into()), None);
        assert_eq!(settings.log_dir, Some(PathBuf::from("/var/log/ja")));
    }
}
