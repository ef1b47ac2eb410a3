//! One-dimensional Perlin noise.
//!
//! Metric values should wander smoothly over time instead of jumping from
//! sample to sample. The functions in this module build that signal in
//! layers: an integer hash, base noise over reals, a 3-tap smoothing kernel,
//! cosine interpolation between integer lattice points and finally a sum of
//! octaves in [`perlin_noise_1d`]. Every function is a pure mapping. The same
//! coordinate always produces the same sample, there is no seed and no
//! hidden state.
//!
//! ## Integer width
//!
//! The hash is computed with 32-bit signed wraparound arithmetic. Only the
//! low 31 bits survive the final mask and every step of the hash carries
//! upward only, so the result is identical to what 64-bit wraparound
//! arithmetic would produce. A consequence is that the hash repeats every
//! 2^31 integers.

use std::f64::consts::PI;

/// Amplitude multiplier applied to each successive octave.
pub const PERSISTENCE: f64 = 0.25;
/// Number of octaves summed by [`perlin_noise_1d`], indices `0..OCTAVES`.
pub const OCTAVES: i32 = 3;

/// Divisor normalizing [`int_hash`] output into [`int_noise`] output, 2^30.
const HASH_SCALE: f64 = 1_073_741_824.0;

/// Mix `x` into a pseudo-random integer in `0..=0x7fff_ffff`.
#[must_use]
#[allow(clippy::cast_sign_loss)]
pub fn int_hash(x: i32) -> u32 {
    let x = (x << 13) ^ x;
    let inner = x.wrapping_mul(x).wrapping_mul(15_731).wrapping_add(789_221);
    let mixed = x.wrapping_mul(inner).wrapping_add(1_376_312_589);
    (mixed as u32) & 0x7fff_ffff
}

/// Pseudo-random value for an integer coordinate, in `(-1.0, 1.0]`.
#[must_use]
pub fn int_noise(x: i32) -> f64 {
    1.0 - f64::from(int_hash(x)) / HASH_SCALE
}

/// Base noise for a real coordinate.
///
/// The coordinate is truncated toward zero, saturating into `i64`, and then
/// wrapped to the hash width. NaN truncates to zero.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn noise(x: f64) -> f64 {
    int_noise(x as i64 as i32)
}

/// Base noise averaged with its immediate integer neighbours, weighted
/// one half for the center and one quarter for each side.
#[must_use]
pub fn smoothed_noise(x: f64) -> f64 {
    noise(x) / 2.0 + noise(x - 1.0) / 4.0 + noise(x + 1.0) / 4.0
}

/// Blend `a` into `b` at position `x` in `[0, 1]` along a cosine curve.
///
/// The curve has zero slope at both ends, so adjacent interpolation segments
/// meet without a kink.
#[must_use]
pub fn interpolate(a: f64, b: f64, x: f64) -> f64 {
    let f = (1.0 - (x * PI).cos()) * 0.5;
    a * (1.0 - f) + b * f
}

/// Continuous noise: smoothed noise at the two surrounding integers,
/// interpolated by the fractional part of `x`.
#[must_use]
pub fn interpolated_noise(x: f64) -> f64 {
    let whole = x.floor();
    let fractional = x - whole;

    let v1 = smoothed_noise(whole);
    let v2 = smoothed_noise(whole + 1.0);

    interpolate(v1, v2, fractional)
}

/// Sum [`OCTAVES`] octaves of [`interpolated_noise`]. Octave `i` samples at
/// frequency `2^i` and is weighted by `PERSISTENCE^i`.
///
/// Finite input always gives a finite result, bounded in magnitude by
/// `1 + 0.25 + 0.0625`. Non-finite input, NaN or either infinity, yields NaN:
/// the fractional part of an infinite coordinate is undefined and the NaN
/// propagates through the cosine.
#[must_use]
pub fn perlin_noise_1d(x: f64) -> f64 {
    let mut total = 0.0;
    for octave in 0..OCTAVES {
        let frequency = 2.0_f64.powi(octave);
        let amplitude = PERSISTENCE.powi(octave);

        total += interpolated_noise(x * frequency) * amplitude;
    }
    total
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use proptest::prelude::*;

    use super::*;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-12,
            "expected {expected}, got {actual}"
        );
    }

    // Same hash computed in 64-bit wraparound arithmetic.
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    fn int_hash_wide(x: i64) -> u32 {
        let x = x.wrapping_shl(13) ^ x;
        let inner = x.wrapping_mul(x).wrapping_mul(15_731).wrapping_add(789_221);
        let mixed = x.wrapping_mul(inner).wrapping_add(1_376_312_589);
        (mixed & 0x7fff_ffff) as u32
    }

    #[test]
    fn int_hash_reference_vectors() {
        assert_eq!(int_hash(0), 1_376_312_589);
        assert_eq!(int_hash(1), 1_316_808_037);
        assert_eq!(int_hash(-5), 1_156_343_149);
        assert_eq!(int_hash(-1), 107_238_581);
        assert_eq!(int_hash(2), 758_455_919);
        assert_eq!(int_hash(7), 941_604_453);
    }

    #[test]
    fn int_noise_reference_vectors() {
        assert_eq!(int_noise(0), -0.281_790_983_863_174_9);
        assert_eq!(int_noise(1), -0.226_373_051_293_194_3);
        assert_eq!(int_noise(-5), -0.076_928_478_665_649_89);
        assert_eq!(int_noise(-1), 0.900_126_288_644_969_5);
    }

    #[test]
    fn int_hash_extremes() {
        assert_eq!(int_hash(i32::MAX), int_hash(-1));
        assert_eq!(int_hash(i32::MIN), int_hash(0));
    }

    #[test]
    fn int_noise_dispersion() {
        let distinct: HashSet<u64> = (0..1_000).map(|x| int_noise(x).to_bits()).collect();
        assert!(distinct.len() > 990, "only {} distinct values", distinct.len());

        let positive = (0..1_000).filter(|x| int_noise(*x) > 0.0).count();
        assert!((300..700).contains(&positive), "{positive} positive values");
    }

    #[test]
    fn noise_truncates_toward_zero() {
        assert_eq!(noise(2.9), int_noise(2));
        assert_eq!(noise(-2.9), int_noise(-2));
        assert_eq!(noise(-0.5), int_noise(0));
        // 2^32 + 7 wraps onto 7.
        assert_eq!(noise(4_294_967_303.5), int_noise(7));
        assert_eq!(noise(f64::NAN), int_noise(0));
    }

    #[test]
    fn smoothed_noise_kernel() {
        let expected = int_noise(4) / 2.0 + int_noise(3) / 4.0 + int_noise(5) / 4.0;
        assert_eq!(smoothed_noise(4.0), expected);
        assert_close(smoothed_noise(4.0), 0.050_348_741_002_380_85);
    }

    #[test]
    fn interpolate_endpoints_and_midpoint() {
        assert_eq!(interpolate(-0.5, 0.75, 0.0), -0.5);
        assert_close(interpolate(-0.5, 0.75, 1.0), 0.75);
        assert_close(interpolate(-0.5, 0.75, 0.5), 0.125);
        assert_close(interpolate(0.3, 0.3, 0.42), 0.3);
    }

    #[test]
    fn interpolate_is_flat_at_endpoints() {
        let h = 1e-6;
        let slope_start = (interpolate(0.0, 1.0, h) - interpolate(0.0, 1.0, 0.0)) / h;
        let slope_end = (interpolate(0.0, 1.0, 1.0) - interpolate(0.0, 1.0, 1.0 - h)) / h;
        assert!(slope_start.abs() < 1e-4, "{slope_start}");
        assert!(slope_end.abs() < 1e-4, "{slope_end}");
    }

    #[test]
    fn interpolated_noise_hits_lattice() {
        for k in -10..10 {
            let x = f64::from(k);
            assert_eq!(interpolated_noise(x), smoothed_noise(x));
        }
    }

    #[test]
    fn perlin_at_origin_is_sum_of_smoothed_origin() {
        let s = smoothed_noise(0.0);
        let expected = 0.0 + s + s * 0.25 + s * 0.0625;
        assert_eq!(perlin_noise_1d(0.0), expected);
        assert_close(perlin_noise_1d(0.0), 0.036_149_947_845_842_69);
    }

    #[test]
    fn perlin_sums_exactly_three_octaves() {
        let x = 0.5;
        let three = 0.0
            + interpolated_noise(x)
            + interpolated_noise(x * 2.0) * 0.25
            + interpolated_noise(x * 4.0) * 0.0625;
        let four = three + interpolated_noise(x * 8.0) * 0.015_625;

        assert_eq!(perlin_noise_1d(x), three);
        assert_ne!(perlin_noise_1d(x), four);
    }

    #[test]
    fn perlin_reference_vectors() {
        assert_close(perlin_noise_1d(0.5), -0.067_277_699_825_353_92);
        assert_close(perlin_noise_1d(1.0), -0.100_597_534_968_983_38);
        assert_close(perlin_noise_1d(2.75), 0.085_859_091_634_588);
        assert_close(perlin_noise_1d(-3.25), -0.032_581_447_691_938_74);
        assert_close(perlin_noise_1d(1234.5678), 0.103_345_926_442_310_79);
        assert_close(perlin_noise_1d(3_000_000_000.25), -0.027_879_485_457_370_193);
    }

    #[test]
    fn perlin_continuous_at_integers() {
        let eps = 1e-9;
        for k in [-7.0, 1.0, 2.0, 10.0, 1_000.0, 2_166_136_261.0] {
            let left = perlin_noise_1d(k - eps);
            let right = perlin_noise_1d(k + eps);
            assert!(
                (left - right).abs() < 1e-6,
                "jump at {k}: {left} vs {right}"
            );
        }
    }

    #[test]
    fn perlin_non_finite_is_nan() {
        assert!(perlin_noise_1d(f64::NAN).is_nan());
        assert!(perlin_noise_1d(f64::INFINITY).is_nan());
        assert!(perlin_noise_1d(f64::NEG_INFINITY).is_nan());
    }

    proptest! {
        #[test]
        fn int_hash_matches_wide_arithmetic(x: i32) {
            prop_assert_eq!(int_hash(x), int_hash_wide(i64::from(x)));
        }

        #[test]
        fn int_hash_period(x: i32) {
            prop_assert_eq!(int_hash(x), int_hash(x.wrapping_add(i32::MIN)));
        }

        #[test]
        fn int_noise_in_range(x: i32) {
            let v = int_noise(x);
            prop_assert!(v > -1.0 && v <= 1.0);
        }

        #[test]
        fn perlin_is_deterministic(x in -1.0e12_f64..1.0e12_f64) {
            prop_assert_eq!(perlin_noise_1d(x).to_bits(), perlin_noise_1d(x).to_bits());
        }

        #[test]
        fn perlin_is_bounded(x in -1.0e12_f64..1.0e12_f64) {
            let v = perlin_noise_1d(x);
            prop_assert!(v.is_finite());
            prop_assert!(v.abs() <= 1.3125, "{} out of range", v);
        }
    }
}
