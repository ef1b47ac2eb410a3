//! The TCP protocol speaking generator.
//!
//! ## Metrics
//!
//! `bytes_written`: Bytes sent successfully
//! `lines_sent`: Metric lines sent successfully
//! `ticks_completed`: Ticks written in full or up to the metric limit
//! `request_failure`: Failed writes or failed liveness probes; each occurrence causes a reconnect
//! `connection_failure`: Number of connection failures
//! `distinct_metrics`: Number of metric series rendered per tick
//!

use std::{
    io,
    num::NonZeroU64,
    time::{SystemTime, UNIX_EPOCH},
};

use dummy_graphite_payload::{Graphite, Tick};
use metrics::{counter, gauge};
use rand::{SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};
use tokio::{
    io::AsyncWriteExt,
    net::TcpStream,
    time::{self, Duration, Instant, Interval, MissedTickBehavior},
};
use tracing::{debug, info, trace};

use crate::signals::Shutdown;

fn default_addr() -> String {
    "localhost:2003".to_string()
}

fn default_reconnect_delay_millis() -> u64 {
    1_000
}

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
/// Configuration of this generator.
pub struct Config {
    /// The seed for random operations, fixing the chosen metric names
    #[serde(default)]
    pub seed: [u8; 32],
    /// The address of the endpoint, `host:port`
    #[serde(default = "default_addr")]
    pub addr: String,
    /// The payload configuration
    #[serde(default)]
    pub payload: dummy_graphite_payload::Config,
    /// Total number of metric lines to send, unbounded if absent
    #[serde(default)]
    pub maximum_metrics: Option<NonZeroU64>,
    /// Pause between ticks, none if absent
    #[serde(default)]
    pub tick_interval_millis: Option<NonZeroU64>,
    /// Pause before reconnecting after a failed connection attempt
    #[serde(default = "default_reconnect_delay_millis")]
    pub reconnect_delay_millis: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            seed: [0; 32],
            addr: default_addr(),
            payload: dummy_graphite_payload::Config::default(),
            maximum_metrics: None,
            tick_interval_millis: None,
            reconnect_delay_millis: default_reconnect_delay_millis(),
        }
    }
}

#[derive(thiserror::Error, Debug)]
/// Errors produced by [`Tcp`].
pub enum Error {
    /// Creation or rendering of the payload failed.
    #[error("Payload error: {0}")]
    Payload(#[from] dummy_graphite_payload::Error),
    /// IO error
    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Debug)]
/// The TCP generator.
///
/// This generator is responsible for connecting to the endpoint via TCP and
/// writing one tick of metric lines after another.
pub struct Tcp {
    addr: String,
    graphite: Graphite,
    rng: StdRng,
    maximum_metrics: Option<NonZeroU64>,
    tick_interval: Option<Duration>,
    reconnect_delay: Duration,
    metric_labels: Vec<(String, String)>,
    shutdown: Shutdown,
}

impl Tcp {
    /// Create a new [`Tcp`] instance
    ///
    /// # Errors
    ///
    /// Creation will fail if the payload configuration cannot produce the
    /// requested metric names.
    pub fn new(config: &Config, shutdown: Shutdown) -> Result<Self, Error> {
        let mut rng = StdRng::from_seed(config.seed);
        let graphite = Graphite::new(&mut rng, &config.payload)?;
        let metric_labels = vec![("component".to_string(), "tcp".to_string())];

        gauge!("distinct_metrics", &metric_labels).set(graphite.series().len() as f64);
        info!(
            "Generating {count} distinct metrics for {addr}",
            count = graphite.series().len(),
            addr = config.addr,
        );

        Ok(Self {
            addr: config.addr.clone(),
            graphite,
            rng,
            maximum_metrics: config.maximum_metrics,
            tick_interval: config
                .tick_interval_millis
                .map(|millis| Duration::from_millis(millis.get())),
            reconnect_delay: Duration::from_millis(config.reconnect_delay_millis),
            metric_labels,
            shutdown,
        })
    }

    /// The payload this generator renders on every tick.
    #[must_use]
    pub fn graphite(&self) -> &Graphite {
        &self.graphite
    }

    /// Run [`Tcp`] to completion or until a shutdown signal is received.
    ///
    /// Completion means `maximum_metrics` lines were written. Connection
    /// failures are retried indefinitely, so without a metric limit this
    /// runs until shutdown.
    ///
    /// # Errors
    ///
    /// Function will return an error if a tick cannot be rendered.
    pub async fn spin(mut self) -> Result<(), Error> {
        let mut connection: Option<TcpStream> = None;
        let mut buffer: Vec<u8> = Vec::with_capacity(64 * self.graphite.series().len());
        let mut lines_sent: u64 = 0;
        let mut time_offset: i64 = 0;
        let mut pacing = self.tick_interval.map(pacing_interval);

        let shutdown_wait = self.shutdown.recv();
        tokio::pin!(shutdown_wait);
        loop {
            let max_lines = match self.maximum_metrics {
                Some(maximum) => {
                    let remaining = maximum.get().saturating_sub(lines_sent);
                    if remaining == 0 {
                        info!("Sent {lines_sent} metrics, generator finished");
                        return Ok(());
                    }
                    usize::try_from(remaining).unwrap_or(usize::MAX)
                }
                None => usize::MAX,
            };

            let Some(ref mut stream) = connection else {
                tokio::select! {
                    result = TcpStream::connect(self.addr.as_str()) => {
                        match result {
                            Ok(stream) => {
                                debug!("Connected to {addr}", addr = self.addr);
                                connection = Some(stream);
                            }
                            Err(source) => {
                                trace!(
                                    "Failed to connect to TCP address {addr}: {source}",
                                    addr = self.addr
                                );

                                let mut error_labels = self.metric_labels.clone();
                                error_labels.push(("error".to_string(), source.to_string()));
                                counter!("connection_failure", &error_labels).increment(1);

                                tokio::select! {
                                    () = time::sleep(self.reconnect_delay) => {},
                                    () = &mut shutdown_wait => {
                                        info!("shutdown signal received");
                                        return Ok(());
                                    },
                                }
                            }
                        }
                    }
                    () = &mut shutdown_wait => {
                        info!("shutdown signal received");
                        return Ok(());
                    },
                }
                continue;
            };

            buffer.clear();
            let tick = Tick {
                time_offset,
                timestamp: unix_now().saturating_add(time_offset),
            };
            let lines = self
                .graphite
                .write_tick(&mut self.rng, tick, max_lines, &mut buffer)?;

            tokio::select! {
                result = stream.write_all(&buffer) => {
                    match result {
                        Ok(()) => {
                            lines_sent += lines as u64;
                            counter!("bytes_written", &self.metric_labels).increment(buffer.len() as u64);
                            counter!("lines_sent", &self.metric_labels).increment(lines as u64);
                            counter!("ticks_completed", &self.metric_labels).increment(1);
                        }
                        Err(err) => {
                            trace!("write failed: {}", err);

                            let mut error_labels = self.metric_labels.clone();
                            error_labels.push(("error".to_string(), err.to_string()));
                            counter!("request_failure", &error_labels).increment(1);
                            // The tick is rendered again once reconnected.
                            connection = None;
                            continue;
                        }
                    }
                }
                () = &mut shutdown_wait => {
                    info!("shutdown signal received");
                    return Ok(());
                },
            }

            if let Err(err) = probe(stream) {
                debug!("Connection to {addr} lost: {err}", addr = self.addr);

                let mut error_labels = self.metric_labels.clone();
                error_labels.push(("error".to_string(), err.to_string()));
                counter!("request_failure", &error_labels).increment(1);
                connection = None;
            }

            time_offset += 1;

            if let Some(ref mut pacing) = pacing {
                tokio::select! {
                    _ = pacing.tick() => {},
                    () = &mut shutdown_wait => {
                        info!("shutdown signal received");
                        return Ok(());
                    },
                }
            }
        }
    }
}

/// Interval whose first tick is one full period away.
fn pacing_interval(period: Duration) -> Interval {
    let mut interval = time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

/// Check, without blocking, that the peer has not gone away. Anything the
/// peer sent is read and discarded.
fn probe(stream: &TcpStream) -> io::Result<()> {
    let mut scratch = [0_u8; 512];
    loop {
        match stream.try_read(&mut scratch) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "peer closed the connection",
                ));
            }
            Ok(_) => {}
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => return Ok(()),
            Err(err) => return Err(err),
        }
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| {
            i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX)
        })
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU64;

    use dummy_graphite_payload::graphite::format_value;
    use rand::{SeedableRng, rngs::StdRng};
    use tokio::{
        io::{AsyncBufReadExt, AsyncReadExt, BufReader},
        net::TcpListener,
        time::{Duration, timeout},
    };

    use super::{Config, Tcp, unix_now};
    use crate::signals::Shutdown;

    fn config_for(addr: String) -> Config {
        Config {
            seed: [7; 32],
            addr,
            payload: dummy_graphite_payload::Config {
                distinct_metrics: 10,
                ..dummy_graphite_payload::Config::default()
            },
            reconnect_delay_millis: 10,
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn sends_exactly_maximum_metrics() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let mut config = config_for(listener.local_addr().expect("addr").to_string());
        config.maximum_metrics = NonZeroU64::new(25);

        let before = unix_now();
        let tcp = Tcp::new(&config, Shutdown::new()).expect("generator");
        let series = tcp.graphite().series().to_vec();
        let generator = tokio::spawn(tcp.spin());

        let (mut socket, _) = listener.accept().await.expect("accept");
        let mut received = String::new();
        timeout(Duration::from_secs(10), socket.read_to_string(&mut received))
            .await
            .expect("generator did not finish")
            .expect("read");
        generator
            .await
            .expect("join")
            .expect("generator failed");

        let lines: Vec<&str> = received.lines().collect();
        assert_eq!(lines.len(), 25);

        for (idx, line) in lines.iter().enumerate() {
            let offset = idx / series.len();
            let expected = &series[idx % series.len()];
            let fields: Vec<&str> = line.split(' ').collect();
            assert_eq!(fields.len(), 3, "malformed line {line:?}");
            assert_eq!(fields[0], expected.name());
            assert_eq!(
                fields[1],
                format_value(expected.value(i64::try_from(offset).expect("small")))
            );
            let timestamp: i64 = fields[2].parse().expect("timestamp");
            assert!(timestamp >= before + i64::try_from(offset).expect("small"));
        }
    }

    #[test]
    fn names_follow_the_seed() {
        let config = config_for("127.0.0.1:1".to_string());
        let tcp = Tcp::new(&config, Shutdown::new()).expect("generator");

        let mut rng = StdRng::from_seed(config.seed);
        let expected = dummy_graphite_payload::Graphite::new(&mut rng, &config.payload)
            .expect("payload");
        assert_eq!(tcp.graphite().series(), expected.series());
    }

    #[test]
    fn invalid_payload_is_rejected() {
        let mut config = config_for("127.0.0.1:1".to_string());
        config.payload.min_name_parts = 4;
        config.payload.max_name_parts = 2;
        assert!(Tcp::new(&config, Shutdown::new()).is_err());
    }

    #[tokio::test]
    async fn reconnects_after_peer_closes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let mut config = config_for(listener.local_addr().expect("addr").to_string());
        config.tick_interval_millis = NonZeroU64::new(10);

        let shutdown = Shutdown::new();
        let tcp = Tcp::new(&config, shutdown.clone()).expect("generator");
        let generator = tokio::spawn(tcp.spin());

        let (first, _) = timeout(Duration::from_secs(10), listener.accept())
            .await
            .expect("no first connection")
            .expect("accept");
        let mut reader = BufReader::new(first);
        let mut line = String::new();
        reader.read_line(&mut line).await.expect("read");
        assert!(!line.is_empty());
        drop(reader);

        let (second, _) = timeout(Duration::from_secs(10), listener.accept())
            .await
            .expect("generator did not reconnect")
            .expect("accept");
        let mut reader = BufReader::new(second);
        let mut line = String::new();
        reader.read_line(&mut line).await.expect("read");
        assert_eq!(line.split(' ').count(), 3);

        shutdown.signal();
        timeout(Duration::from_secs(10), generator)
            .await
            .expect("generator ignored shutdown")
            .expect("join")
            .expect("generator failed");
    }

    #[tokio::test]
    async fn shutdown_interrupts_connection_retries() {
        // Bind and release a port so that nothing listens on it.
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
            listener.local_addr().expect("addr")
        };
        let config = config_for(addr.to_string());

        let shutdown = Shutdown::new();
        let tcp = Tcp::new(&config, shutdown.clone()).expect("generator");
        let generator = tokio::spawn(tcp.spin());

        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.signal();
        timeout(Duration::from_secs(10), generator)
            .await
            .expect("generator ignored shutdown")
            .expect("join")
            .expect("generator failed");
    }
}
