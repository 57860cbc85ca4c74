use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Default filter when RUST_LOG is not set
pub fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "normcap=debug"
    } else {
        "normcap=info"
    }
}

/// Initialize console + daily rolling file logging.
///
/// Falls back to stdout-only logging when the log directory cannot be
/// created. The returned guard must be kept alive for the file writer to
/// flush; `None` means the fallback was used.
pub fn init_logging(log_dir: Option<&Path>, verbose: bool) -> Option<WorkerGuard> {
    let filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)))
    };

    let file_logging_result = (|| -> anyhow::Result<WorkerGuard> {
        let log_dir = log_dir.ok_or_else(|| anyhow::anyhow!("no log directory available"))?;
        std::fs::create_dir_all(log_dir)?;

        let file_appender = tracing_appender::rolling::daily(log_dir, "normcap.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(non_blocking)
                    .with_filter(filter()),
            )
            .with(
                fmt::layer()
                    .with_target(false)
                    .compact()
                    .with_writer(std::io::stdout)
                    .with_filter(filter()),
            )
            .try_init()?;

        Ok(guard)
    })();

    match file_logging_result {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: Failed to initialize file logging: {}", e);
            eprintln!("Falling back to stdout-only logging");

            let _ = tracing_subscriber::registry()
                .with(
                    fmt::layer()
                        .with_target(false)
                        .compact()
                        .with_writer(std::io::stdout)
                        .with_filter(filter()),
                )
                .try_init();
            None
        }
    }
}

/// Log platform-specific information on startup
pub fn log_platform_info() {
    tracing::info!(
        platform = std::env::consts::OS,
        architecture = std::env::consts::ARCH,
        version = env!("CARGO_PKG_VERSION"),
        "NormCap starting"
    );
}
