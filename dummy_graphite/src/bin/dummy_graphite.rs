use std::{
    env,
    net::SocketAddr,
    num::NonZeroU64,
    path::PathBuf,
    str::FromStr,
};

use clap::Parser;
use dummy_graphite::{
    config::{self, Config, Telemetry},
    generator,
    signals::Shutdown,
};
use jemallocator::Jemalloc;
use metrics::gauge;
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::Lazy;
use regex::Regex;
use rustc_hash::FxHashMap;
use tokio::{
    runtime::Builder,
    signal,
    time::{self, Duration},
};
use tracing::{Instrument, debug, error, info, info_span, warn};
use tracing_subscriber::{EnvFilter, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

#[derive(thiserror::Error, Debug)]
enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] config::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("Generator returned an error: {0}")]
    Generator(#[from] generator::Error),
    #[error("Failed to install prometheus exporter: {0}")]
    Prometheus(#[from] metrics_exporter_prometheus::BuildError),
    #[error("Could not join the generator task: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Labels applied to every internal telemetry metric, given on the command
/// line as `KEY=VALUE,KEY2=VALUE2`.
///
/// Keys follow the Prometheus label name syntax. A key only starts at the
/// beginning of the input or right after a ',', so values may carry ',' or
/// '=' of their own.
#[derive(Debug, Default, Clone)]
struct GlobalLabels {
    inner: FxHashMap<String, String>,
}

impl GlobalLabels {
    #[cfg(test)]
    fn get(&self, key: &str) -> Option<&str> {
        self.inner.get(key).map(String::as_str)
    }
}

impl FromStr for GlobalLabels {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        static LABEL_KEY: Lazy<Regex> = Lazy::new(|| {
            Regex::new(r"(?:^|,)([[:alpha:]_][[:alnum:]_]*)=")
                .expect("Invalid regex pattern provided")
        });

        let mut inner = FxHashMap::default();
        if input.is_empty() {
            return Ok(Self { inner });
        }

        let keys: Vec<(usize, regex::Match<'_>)> = LABEL_KEY
            .captures_iter(input)
            .filter_map(|cap| Some((cap.get(0)?.start(), cap.get(1)?)))
            .collect();
        if keys.first().is_none_or(|(start, _)| *start != 0) {
            return Err(format!("expected KEY=VALUE pairs, got {input:?}"));
        }

        for (idx, (_, key)) in keys.iter().enumerate() {
            let value_start = key.end() + 1;
            let value_end = keys.get(idx + 1).map_or(input.len(), |(start, _)| *start);
            let (key, value) = (key.as_str(), &input[value_start..value_end]);
            if value.is_empty() {
                return Err(format!("label {key:?} has no value"));
            }
            if inner.insert(key.to_string(), value.to_string()).is_some() {
                return Err(format!("label {key:?} given more than once"));
            }
        }

        Ok(Self { inner })
    }
}

#[derive(Parser)]
#[clap(version, about, long_about = None)]
struct Cli {
    /// path on disk to the configuration file, defaults apply if absent
    #[clap(long)]
    config_path: Option<PathBuf>,
    /// address of the graphite endpoint, `host:port`
    #[clap(long)]
    addr: Option<String>,
    /// minimum number of metric name elements
    #[clap(long = "min")]
    min_name_parts: Option<u8>,
    /// maximum number of metric name elements
    #[clap(long = "max")]
    max_name_parts: Option<u8>,
    /// number of metrics to send, unbounded if absent
    #[clap(short = 'n', long)]
    maximum_metrics: Option<NonZeroU64>,
    /// number of different metrics to generate
    #[clap(short = 'm', long)]
    distinct_metrics: Option<usize>,
    /// amplitude of uniform jitter added to every value
    #[clap(long)]
    jitter: Option<f64>,
    /// pause, in milliseconds, between passes over the metric set
    #[clap(long)]
    tick_interval_millis: Option<NonZeroU64>,
    /// address to bind a prometheus exporter for internal telemetry
    #[clap(long)]
    prometheus_addr: Option<SocketAddr>,
    /// additional labels to apply to internal telemetry, format KEY=VAL,KEY2=VAL
    #[clap(long)]
    global_labels: Option<GlobalLabels>,
    /// the maximum time to wait, in seconds, for controlled shutdown
    #[clap(long, default_value_t = 30)]
    max_shutdown_delay: u16,
}

fn load_config(cli: &Cli) -> Result<Config, Error> {
    if let Ok(contents) = env::var("DUMMY_GRAPHITE_CONFIG") {
        debug!("Using config from env var 'DUMMY_GRAPHITE_CONFIG'");
        Ok(Config::from_yaml(&contents)?)
    } else if let Some(path) = &cli.config_path {
        debug!("Attempting to open configuration file at: {}", path.display());
        Config::from_path(path).map_err(|err| {
            error!("Configuration validation failed: {err}");
            Error::from(err)
        })
    } else {
        Ok(Config::default())
    }
}

fn get_config(cli: &Cli, config: Option<Config>) -> Result<Config, Error> {
    let mut config = match config {
        Some(config) => config,
        None => load_config(cli)?,
    };

    let generator = &mut config.generator;
    if let Some(addr) = &cli.addr {
        generator.addr.clone_from(addr);
    }
    if let Some(maximum_metrics) = cli.maximum_metrics {
        generator.maximum_metrics = Some(maximum_metrics);
    }
    if let Some(tick_interval_millis) = cli.tick_interval_millis {
        generator.tick_interval_millis = Some(tick_interval_millis);
    }
    let payload = &mut generator.payload;
    if let Some(min) = cli.min_name_parts {
        payload.min_name_parts = min;
    }
    if let Some(max) = cli.max_name_parts {
        payload.max_name_parts = max;
    }
    if let Some(distinct) = cli.distinct_metrics {
        payload.distinct_metrics = distinct;
    }
    if let Some(jitter) = cli.jitter {
        payload.jitter = jitter;
    }

    let cli_labels = cli.global_labels.clone().unwrap_or_default().inner;
    if let Some(addr) = cli.prometheus_addr {
        config.telemetry = Some(Telemetry::Prometheus {
            addr,
            global_labels: cli_labels,
        });
    } else if let Some(Telemetry::Prometheus {
        ref mut global_labels,
        ..
    }) = config.telemetry
    {
        global_labels.extend(cli_labels);
    }

    Ok(config)
}

async fn inner_main(config: Config) -> Result<(), Error> {
    if let Some(Telemetry::Prometheus {
        addr,
        global_labels,
    }) = config.telemetry
    {
        let mut builder = PrometheusBuilder::new().with_http_listener(addr);
        for (k, v) in global_labels {
            builder = builder.add_global_label(k, v);
        }
        builder.install()?;
        info!("Prometheus exporter listening on {addr}");
    }

    let shutdown = Shutdown::new();
    let server = generator::Server::new(&config.generator, shutdown.clone())?;
    let mut generator_handle =
        tokio::spawn(server.run().instrument(info_span!("generator")));

    let mut interval = time::interval(Duration::from_millis(400));
    loop {
        tokio::select! {
            _ = interval.tick() => {
                gauge!("dummy_graphite.running").set(1.0);
            },
            _ = signal::ctrl_c() => {
                info!("received ctrl-c");
                shutdown.signal();
                return match generator_handle.await? {
                    Ok(()) => Ok(()),
                    Err(err) => {
                        warn!("Generator failed during shutdown: {err}");
                        Err(Error::Generator(err))
                    }
                };
            },
            res = &mut generator_handle => {
                return match res? {
                    Ok(()) => {
                        debug!("Generator shut down successfully");
                        Ok(())
                    }
                    Err(err) => {
                        error!("Generator shut down unexpectedly: {err}");
                        Err(Error::Generator(err))
                    }
                };
            },
        }
    }
}

fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_ansi(false)
        .finish()
        .init();

    let version = env!("CARGO_PKG_VERSION");
    info!("Starting dummy_graphite {version} run.");

    let cli = Cli::parse();
    let config = get_config(&cli, None)?;
    let max_shutdown_delay = Duration::from_secs(cli.max_shutdown_delay.into());

    let runtime = Builder::new_multi_thread()
        .enable_io()
        .enable_time()
        .build()?;
    let res = runtime.block_on(inner_main(config));
    info!(
        "Shutting down runtime with a {} second delay. May leave orphaned tasks.",
        max_shutdown_delay.as_secs(),
    );
    runtime.shutdown_timeout(max_shutdown_delay);
    info!("Bye. :)");
    res
}
