use log::SetLoggerError;

/// The filter used when `RUST_LOG` is not set: collection summaries from this crate only.
pub const DEFAULT_LOG_FILTER: &str = "arenagc=info";

/// Install the built-in `env_logger` unless the host already installed a logger.
/// Without the "builtin_env_logger" feature this is a no-op and the host owns logging.
pub fn try_init() -> Result<(), SetLoggerError> {
    cfg_if::cfg_if! {
        if #[cfg(feature = "builtin_env_logger")] {
            env_logger::Builder::from_env(
                env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, DEFAULT_LOG_FILTER),
            )
            .format_timestamp_millis()
            .try_init()
        } else {
            Ok(())
        }
    }
}
