/// Absolute distance within which a value snaps to a grid point.
const GRID_TOLERANCE: f64 = 1e-4;

/// Snap a beat or duration value to the nearest canonical fraction.
///
/// Grids are tried coarsest first: whole beats, then halves, then quarters.
/// A value close to none of them is returned unchanged, so irregular
/// divisions (triplets etc.) survive serialization. Idempotent: a grid point
/// snaps to itself.
pub fn quantize_beat(value: f64) -> f64 {
    let whole = value.round();
    if (value - whole).abs() < GRID_TOLERANCE {
        return whole;
    }
    let half = (value * 2.0).round() / 2.0;
    if (value - half).abs() < GRID_TOLERANCE {
        return half;
    }
    let quarter = (value * 4.0).round() / 4.0;
    if (value - quarter).abs() < GRID_TOLERANCE {
        return quarter;
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snaps_accumulated_float_error() {
        assert_eq!(quantize_beat(0.999_999_99), 1.0);
        assert_eq!(quantize_beat(2.000_000_3), 2.0);
        assert_eq!(quantize_beat(1.499_999_9), 1.5);
        assert_eq!(quantize_beat(0.750_000_04), 0.75);
    }

    #[test]
    fn exact_grid_points_are_unchanged() {
        for value in [0.0, 0.25, 0.5, 0.75, 1.0, 3.5, 17.25] {
            assert_eq!(quantize_beat(value), value);
        }
    }

    #[test]
    fn off_grid_values_pass_through() {
        // a triplet eighth is none of whole/half/quarter
        let triplet = 1.0 / 3.0;
        assert_eq!(quantize_beat(triplet), triplet);
        assert_eq!(quantize_beat(0.123), 0.123);
    }

    #[test]
    fn idempotent() {
        for value in [0.0, 1.0 / 3.0, 0.499_999_99, 0.75, 1.000_05, 12.249_999_9] {
            let once = quantize_beat(value);
            assert_eq!(quantize_beat(once), once);
        }
    }

    #[test]
    fn coarser_grid_wins() {
        // within tolerance of a whole beat, not just of a quarter
        assert_eq!(quantize_beat(3.000_09), 3.0);
    }
}
