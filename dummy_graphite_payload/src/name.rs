//! Metric name combinatorics.
//!
//! A metric name is a dot-joined sequence of elements drawn, with
//! repetition, from a small vocabulary. With `P` vocabulary entries and
//! lengths from `min` to `max` inclusive there are `sum(P^k)` possible names.
//! Every name in that space has an index: shorter names come first, and
//! within a length the index is read as a base-`P` number whose least
//! significant digit picks the first element.

use rand::{Rng, seq::index};

/// Errors produced by [`Names`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The vocabulary is empty.
    #[error("At least one metric name part is required")]
    NoNameParts,
    /// A vocabulary entry cannot appear in a dotted plaintext name.
    #[error("Metric name part {0:?} must be non-empty and contain no dots or whitespace")]
    InvalidNamePart(String),
    /// A vocabulary entry appears more than once.
    #[error("Metric name part {0:?} is listed more than once")]
    DuplicateNamePart(String),
    /// Minimum length is above maximum length.
    #[error("Minimum name parts ({min}) should not exceed maximum name parts ({max})")]
    MinExceedsMax {
        /// Configured minimum
        min: u8,
        /// Configured maximum
        max: u8,
    },
    /// The size of the name space does not fit in `usize`.
    #[error("Metric name space is too large to enumerate")]
    CapacityOverflow,
    /// Zero distinct names were requested.
    #[error("At least one distinct metric must be requested")]
    ZeroDistinct,
    /// The name space is smaller than the requested number of names.
    #[error("Can only generate {capacity} combinations, asked to do {requested}")]
    InsufficientCombinations {
        /// Number of distinct names available
        capacity: usize,
        /// Number of distinct names requested
        requested: usize,
    },
}

/// The space of metric names over a vocabulary and a length range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Names {
    parts: Vec<String>,
    min: u8,
    max: u8,
}

impl Names {
    /// Create a new [`Names`]. A `min` of zero is raised to one.
    ///
    /// # Errors
    ///
    /// Returns an error if `parts` is empty, holds duplicates or entries that
    /// are not valid name elements, or if `min` exceeds `max`.
    pub fn new(parts: Vec<String>, min: u8, max: u8) -> Result<Self, Error> {
        let min = min.max(1);
        if parts.is_empty() {
            return Err(Error::NoNameParts);
        }
        for (idx, part) in parts.iter().enumerate() {
            if part.is_empty() || part.contains('.') || part.contains(char::is_whitespace) {
                return Err(Error::InvalidNamePart(part.clone()));
            }
            if parts[..idx].contains(part) {
                return Err(Error::DuplicateNamePart(part.clone()));
            }
        }
        if min > max {
            return Err(Error::MinExceedsMax { min, max });
        }

        Ok(Self { parts, min, max })
    }

    /// Total number of distinct names in this space.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CapacityOverflow`] if the total exceeds `usize`.
    pub fn capacity(&self) -> Result<usize, Error> {
        (self.min..=self.max)
            .try_fold(0_usize, |total, len| {
                self.parts
                    .len()
                    .checked_pow(u32::from(len))
                    .and_then(|count| total.checked_add(count))
            })
            .ok_or(Error::CapacityOverflow)
    }

    /// The name at `index`, or `None` if `index` is outside the space.
    #[must_use]
    pub fn name_at(&self, mut index: usize) -> Option<String> {
        for len in self.min..=self.max {
            match self.parts.len().checked_pow(u32::from(len)) {
                Some(count) if index >= count => index -= count,
                // A count that overflows is necessarily above any index.
                _ => return Some(self.decode(index, len)),
            }
        }
        None
    }

    fn decode(&self, mut index: usize, len: u8) -> String {
        let base = self.parts.len();
        let mut elements = Vec::with_capacity(usize::from(len));
        for _ in 0..len {
            elements.push(self.parts[index % base].as_str());
            index /= base;
        }
        elements.join(".")
    }

    /// Draw `distinct` unique names uniformly from the whole space.
    ///
    /// # Errors
    ///
    /// Returns an error if `distinct` is zero or larger than
    /// [`Names::capacity`].
    pub fn sample<R>(&self, rng: &mut R, distinct: usize) -> Result<Vec<String>, Error>
    where
        R: Rng + ?Sized,
    {
        if distinct == 0 {
            return Err(Error::ZeroDistinct);
        }
        let capacity = self.capacity()?;
        if capacity < distinct {
            return Err(Error::InsufficientCombinations {
                capacity,
                requested: distinct,
            });
        }

        Ok(index::sample(rng, capacity, distinct)
            .into_iter()
            .filter_map(|idx| self.name_at(idx))
            .collect())
    }
}
