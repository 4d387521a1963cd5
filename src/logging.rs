use tracing_subscriber::{fmt, EnvFilter};

pub const LOG_ENV: &str = "MODFORGE_LOG";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
    Debug,
}

impl Verbosity {
    fn directive(self) -> &'static str {
        match self {
            Verbosity::Quiet => "modforge=error",
            Verbosity::Normal => "modforge=warn",
            Verbosity::Verbose => "modforge=info",
            Verbosity::Debug => "modforge=debug",
        }
    }
}

/// Installs the global subscriber. `MODFORGE_LOG` wins over the CLI verbosity.
pub fn init(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(verbosity.directive()));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
