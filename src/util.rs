use log::LevelFilter;

pub mod format;
pub mod immutable;

pub fn init_logging() { init_logging_with_level(LevelFilter::Info) }

/// Console logging on stderr; `RUST_LOG` overrides `level`.
/// Calling it more than once is harmless.
pub fn init_logging_with_level(level: LevelFilter) {
    let _ = env_logger::builder()
        .format_target(false)
        .format_timestamp_secs()
        .filter_level(level)
        .parse_default_env()
        .try_init();
}

#[cfg(test)]
#[ctor::ctor]
fn init() {
    let _ = env_logger::builder()
        .format_timestamp_secs()
        .filter_level(LevelFilter::Debug)
        .parse_default_env()
        .is_test(true)
        .try_init();
}
