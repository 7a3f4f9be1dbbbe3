use std::any::Any;

pub const LOG_FILE_BASENAME: &str = "todo-groups";
pub const LOG_FILE_SUFFIX: &str = "log";
pub const LOG_ROTATE_SIZE_BYTES: u64 = 10 * 1024 * 1024;
pub const LOG_ROTATE_KEEP_FILES: usize = 10;
pub const LOG_ENV_VAR: &str = "TODO_GROUPS_LOG";

/// Picks the logger spec: `TODO_GROUPS_LOG`, then `RUST_LOG`, then the build default.
pub fn log_spec(own: Option<String>, rust_log: Option<String>) -> String {
    let default_spec = if cfg!(debug_assertions) {
        "warn,todo_groups_lib=debug"
    } else {
        "warn,todo_groups_lib=info"
    };
    own.filter(|value| !value.trim().is_empty())
        .or_else(|| rust_log.filter(|value| !value.trim().is_empty()))
        .unwrap_or_else(|| default_spec.to_string())
}

/// Text of a panic payload, when it carries one.
pub fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "<non-string panic payload>"
    }
}

/// Starts the file logger. Logs share the app data dir with the store and settings.
#[cfg(all(feature = "app", not(test)))]
pub fn init_logging(app_data_dir: &std::path::Path) -> Result<(), flexi_logger::FlexiLoggerError> {
    use flexi_logger::{
        detailed_format, Cleanup, Criterion, Duplicate, FileSpec, Logger, Naming, WriteMode,
    };

    std::fs::create_dir_all(app_data_dir)?;
    let spec = log_spec(
        std::env::var(LOG_ENV_VAR).ok(),
        std::env::var("RUST_LOG").ok(),
    );
    let mirror = if cfg!(debug_assertions) {
        Duplicate::Info
    } else {
        Duplicate::None
    };
    let files = FileSpec::default()
        .directory(app_data_dir)
        .basename(LOG_FILE_BASENAME)
        .suffix(LOG_FILE_SUFFIX);

    Logger::try_with_str(&spec)?
        .log_to_file(files)
        .write_mode(WriteMode::BufferAndFlush)
        .format_for_files(detailed_format)
        .rotate(
            Criterion::Size(LOG_ROTATE_SIZE_BYTES),
            Naming::Numbers,
            Cleanup::KeepLogFiles(LOG_ROTATE_KEEP_FILES),
        )
        .duplicate_to_stdout(mirror)
        .start()?;

    install_panic_hook();
    log::info!("logging to {} spec={spec}", app_data_dir.display());
    Ok(())
}

#[cfg(all(feature = "app", not(test)))]
fn install_panic_hook() {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info: &std::panic::PanicHookInfo<'_>| {
        let thread = std::thread::current();
        let location = info
            .location()
            .map(ToString::to_string)
            .unwrap_or_else(|| "<unknown>".to_string());
        log::error!(
            "thread {} panicked at {location}: {}",
            thread.name().unwrap_or("<unnamed>"),
            panic_message(info.payload())
        );
        previous(info);
    }));
}
