use std::fs;
use std::io;
use std::path::Path;

use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use tracing::error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use psmannotator::{PSMAnnotator, PSMAnnotatorError};

#[cfg(feature = "mimalloc")]
use mimalloc::MiMalloc;

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn default_filter() -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(tracing::Level::INFO.into())
        .from_env_lossy()
}

fn configure_log(log_file: Option<&Path>) -> Result<Option<WorkerGuard>, PSMAnnotatorError> {
    let (file_layer, guard) = match log_file {
        Some(path) => {
            let (writer, guard) = tracing_appender::non_blocking(fs::File::create(path)?);
            let layer = fmt::layer()
                .compact()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(default_filter());
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let subscriber = tracing_subscriber::registry().with(file_layer).with(
        fmt::layer()
            .compact()
            .with_writer(io::stderr)
            .with_filter(default_filter()),
    );
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| PSMAnnotatorError::ConfigurationError(e.to_string()))?;
    tracing_log::LogTracer::init()
        .map_err(|e| PSMAnnotatorError::ConfigurationError(e.to_string()))?;
    Ok(guard)
}

fn load_config(args: PSMAnnotator) -> Result<PSMAnnotator, PSMAnnotatorError> {
    let mut config = Figment::new()
        .merge(Serialized::defaults(&args))
        .merge(Toml::file("psmannotator.toml"));
    if let Some(path) = args.config_file.as_ref() {
        config = config.merge(Toml::file_exact(path));
    }
    let config: PSMAnnotator = config.merge(Env::prefixed("PSMANNOTATOR_")).extract()?;
    Ok(config)
}

fn main() -> Result<(), PSMAnnotatorError> {
    let args = PSMAnnotator::parse();
    let _guard = configure_log(args.log_file.as_deref())?;

    let result = load_config(args).and_then(|driver| driver.main());
    if let Err(e) = result.as_ref() {
        error!("{e}");
    }
    result
}
