//! The dummy-graphite payloads
//!
//! This library supports payload generation for the dummy-graphite project:
//! synthetic Graphite plaintext metrics whose values follow one-dimensional
//! Perlin noise.

#![deny(clippy::all)]
#![deny(clippy::cargo)]
#![deny(clippy::pedantic)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]
#![deny(clippy::dbg_macro)]
#![deny(unused_extern_crates)]
#![deny(unused_allocation)]
#![deny(unused_assignments)]
#![deny(unused_comparisons)]
#![deny(unreachable_pub)]
#![deny(missing_docs)]
#![deny(missing_debug_implementations)]
#![allow(clippy::multiple_crate_versions)]

use std::io;

use serde::{Deserialize, Serialize};

pub use graphite::{Graphite, Series, Tick};
pub use noise::perlin_noise_1d;

pub mod fnv;
pub mod graphite;
pub mod name;
pub mod noise;

/// Errors related to payload construction and serialization
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// See [`name::Error`]
    #[error(transparent)]
    Name(#[from] name::Error),
    /// Jitter must be a finite, non-negative amplitude
    #[error("Jitter must be finite and non-negative, got {0}")]
    InvalidJitter(f64),
    /// IO operation failed
    #[error("IO operation failed: {0}")]
    Io(#[from] io::Error),
}

fn default_min_name_parts() -> u8 {
    2
}

fn default_max_name_parts() -> u8 {
    3
}

fn default_distinct_metrics() -> usize {
    100
}

fn default_name_parts() -> Vec<String> {
    ["foo", "bar", "baz", "qux", "frob"]
        .iter()
        .map(|part| (*part).to_string())
        .collect()
}

/// Configuration for [`Graphite`]
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Minimum number of dotted elements in a metric name. Zero is treated
    /// as one.
    #[serde(default = "default_min_name_parts")]
    pub min_name_parts: u8,
    /// Maximum number of dotted elements in a metric name
    #[serde(default = "default_max_name_parts")]
    pub max_name_parts: u8,
    /// Number of distinct metric names to generate
    #[serde(default = "default_distinct_metrics")]
    pub distinct_metrics: usize,
    /// Vocabulary metric name elements are drawn from
    #[serde(default = "default_name_parts")]
    pub name_parts: Vec<String>,
    /// Amplitude of uniform jitter added to every value, zero for none
    #[serde(default)]
    pub jitter: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            min_name_parts: default_min_name_parts(),
            max_name_parts: default_max_name_parts(),
            distinct_metrics: default_distinct_metrics(),
            name_parts: default_name_parts(),
            jitter: 0.0,
        }
    }
}
