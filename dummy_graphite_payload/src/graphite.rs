//! Graphite plaintext payload.
//!
//! Each tick renders one line per metric series in the form
//!
//! ```text
//! <dotted.metric.name> <value> <unix-timestamp>\n
//! ```
//!
//! A series' value is Perlin noise sampled at the series' name hash plus the
//! tick's time offset, lifted by a per-series baseline derived from the same
//! hash. Consecutive ticks therefore trace a smooth curve per series while
//! different series sit at different levels.

use std::{fmt::Write as _, io::Write};

use rand::Rng;

use crate::{Config, Error, fnv, name::Names, noise};

/// Significant digits kept by [`format_value`].
const SIGNIFICANT_DIGITS: usize = 5;

/// A single metric series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Series {
    name: String,
    hash: u32,
}

impl Series {
    /// Create a new [`Series`], hashing its name.
    #[must_use]
    pub fn new(name: String) -> Self {
        let hash = fnv::fnv1_32(name.as_bytes());
        Self { name, hash }
    }

    /// The dotted metric name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// FNV-1 hash of the name.
    #[must_use]
    pub fn hash(&self) -> u32 {
        self.hash
    }

    /// Noise coordinate of this series at `time_offset`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn coordinate(&self, time_offset: i64) -> f64 {
        i64::from(self.hash).wrapping_add(time_offset) as f64
    }

    /// Per-series level in `[-5, 4]`.
    #[must_use]
    pub fn baseline(&self) -> f64 {
        f64::from(self.hash % 10) - 5.0
    }

    /// Value of this series at `time_offset`, before jitter.
    #[must_use]
    pub fn value(&self, time_offset: i64) -> f64 {
        noise::perlin_noise_1d(self.coordinate(time_offset)) + self.baseline()
    }
}

/// The position of one pass over every series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    /// Number of passes completed before this one.
    pub time_offset: i64,
    /// Unix timestamp, in seconds, stamped on every line of the pass.
    pub timestamp: i64,
}

/// Graphite plaintext payload.
#[derive(Debug, Clone)]
pub struct Graphite {
    series: Vec<Series>,
    jitter: f64,
}

impl Graphite {
    /// Create a new [`Graphite`], sampling metric names from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the name configuration cannot produce
    /// `distinct_metrics` names or if `jitter` is negative or not finite.
    pub fn new<R>(rng: &mut R, config: &Config) -> Result<Self, Error>
    where
        R: Rng + ?Sized,
    {
        let names = Names::new(
            config.name_parts.clone(),
            config.min_name_parts,
            config.max_name_parts,
        )?;
        let names = names.sample(rng, config.distinct_metrics)?;

        Self::with_names(names, config.jitter)
    }

    /// Create a new [`Graphite`] over an explicit set of metric names.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidJitter`] if `jitter` is negative or not finite.
    pub fn with_names<I>(names: I, jitter: f64) -> Result<Self, Error>
    where
        I: IntoIterator<Item = String>,
    {
        if !jitter.is_finite() || jitter < 0.0 {
            return Err(Error::InvalidJitter(jitter));
        }
        Ok(Self {
            series: names.into_iter().map(Series::new).collect(),
            jitter,
        })
    }

    /// The series rendered on every tick, in rendering order.
    #[must_use]
    pub fn series(&self) -> &[Series] {
        &self.series
    }

    /// Write up to `max_lines` lines for `tick` into `writer`, returning the
    /// number of lines written.
    ///
    /// # Errors
    ///
    /// Returns an error if `writer` fails.
    pub fn write_tick<R, W>(
        &self,
        rng: &mut R,
        tick: Tick,
        max_lines: usize,
        writer: &mut W,
    ) -> Result<usize, Error>
    where
        R: Rng + ?Sized,
        W: Write,
    {
        let mut line = String::with_capacity(64);
        let mut written = 0;
        for series in self.series.iter().take(max_lines) {
            let mut value = series.value(tick.time_offset);
            if self.jitter > 0.0 {
                value += rng.random_range(-self.jitter..=self.jitter);
            }

            line.clear();
            // Writing into a String cannot fail.
            let _ = writeln!(
                line,
                "{name} {value} {timestamp}",
                name = series.name,
                value = format_value(value),
                timestamp = tick.timestamp,
            );
            tracing::trace!("{}", line.trim_end());
            writer.write_all(line.as_bytes())?;
            written += 1;
        }
        Ok(written)
    }
}

/// Format `value` with five significant digits, `%g` style.
///
/// Trailing zeros are dropped. Exponent notation, `1.2346e+05`, is used when
/// the decimal exponent is below -4 or at least the number of significant
/// digits. Non-finite values render as `NaN`, `+Inf` and `-Inf`.
#[must_use]
pub fn format_value(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "+Inf" } else { "-Inf" }.to_string();
    }
    if value == 0.0 {
        return if value.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    // Scientific rendering rounds to the requested significant digits,
    // e.g. "1.2346e4". Split it into digits and decimal exponent.
    let scientific = format!("{:.*e}", SIGNIFICANT_DIGITS - 1, value.abs());
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return scientific;
    };
    let Ok(exponent) = exponent.parse::<i32>() else {
        return scientific;
    };
    let digits: Vec<u8> = mantissa
        .bytes()
        .filter(u8::is_ascii_digit)
        .collect();
    let significant = digits
        .iter()
        .rposition(|d| *d != b'0')
        .map_or(1, |last| last + 1);
    let digits = &digits[..significant];

    let mut out = String::with_capacity(16);
    if value.is_sign_negative() {
        out.push('-');
    }

    #[allow(clippy::cast_possible_wrap, clippy::cast_possible_truncation)]
    let precision = SIGNIFICANT_DIGITS as i32;
    if exponent < -4 || exponent >= precision {
        out.push(char::from(digits[0]));
        if digits.len() > 1 {
            out.push('.');
            out.extend(digits[1..].iter().map(|d| char::from(*d)));
        }
        let sign = if exponent < 0 { '-' } else { '+' };
        let _ = write!(out, "e{sign}{:02}", exponent.unsigned_abs());
    } else {
        // Position of the decimal point relative to the first digit.
        let point = exponent + 1;
        if point <= 0 {
            out.push_str("0.");
            for _ in 0..point.unsigned_abs() {
                out.push('0');
            }
            out.extend(digits.iter().map(|d| char::from(*d)));
        } else {
            #[allow(clippy::cast_sign_loss)]
            let point = point as usize;
            for idx in 0..point {
                out.push(digits.get(idx).map_or('0', |d| char::from(*d)));
            }
            if digits.len() > point {
                out.push('.');
                out.extend(digits[point..].iter().map(|d| char::from(*d)));
            }
        }
    }
    out
}
