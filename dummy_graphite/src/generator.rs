//! dummy-graphite generators
//!
//! The generator is responsible for pushing metrics into the collection
//! endpoint. Metric names are chosen once, at generator start, and then every
//! tick renders one line per name whose value follows that name's noise
//! curve. The only transport is TCP, see [`tcp`].

use tracing::{Instrument, info_span};

use crate::signals::Shutdown;

pub mod tcp;

#[derive(thiserror::Error, Debug)]
/// Errors produced by [`Server`].
pub enum Error {
    /// See [`crate::generator::tcp::Error`] for details.
    #[error(transparent)]
    Tcp(#[from] tcp::Error),
}

#[derive(Debug)]
/// The generator server.
pub struct Server {
    inner: tcp::Tcp,
}

impl Server {
    /// Create a new [`Server`] instance
    ///
    /// # Errors
    ///
    /// Function will return an error if the underlying generator cannot be
    /// constructed, typically because its payload configuration is invalid.
    pub fn new(config: &tcp::Config, shutdown: Shutdown) -> Result<Self, Error> {
        let inner = tcp::Tcp::new(config, shutdown)?;
        Ok(Self { inner })
    }

    /// Run this [`Server`] to completion
    ///
    /// The generator runs until it has sent its configured number of metrics
    /// or a shutdown signal is received.
    ///
    /// # Errors
    ///
    /// Function will return an error if the underlying generator fails.
    pub async fn run(self) -> Result<(), Error> {
        self.inner
            .spin()
            .instrument(info_span!("tcp_generator"))
            .await?;
        Ok(())
    }
}
