//! Grid point type for cell positions and object sizes.

use nalgebra::Vector2;

/// 2D point in grid-cell units.
///
/// A plain alias for `nalgebra::Vector2<f64>`. Cell positions always hold whole
/// numbers, so exact equality is meaningful for adjacency tests.
pub type Point = Vector2<f64>;

/// Integer key for hashing a grid position.
///
/// Positions are rounded so that values produced by float arithmetic on whole
/// numbers land on the same key.
#[inline]
#[must_use]
pub fn grid_key(p: &Point) -> (i64, i64) {
    (p.x.round() as i64, p.y.round() as i64)
}

/// Round both coordinates to the nearest grid position
#[inline]
#[must_use]
pub fn snap_to_grid(p: &Point) -> Point {
    p.map(f64::round)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_key_rounds() {
        assert_eq!(grid_key(&Point::new(2.0, -3.0)), (2, -3));
        assert_eq!(grid_key(&Point::new(1.999_999_9, 0.000_000_1)), (2, 0));
    }

    #[test]
    fn test_snap_to_grid() {
        assert_eq!(snap_to_grid(&Point::new(2.4, -0.6)), Point::new(2.0, -1.0));
        assert_eq!(snap_to_grid(&Point::new(3.0, 7.0)), Point::new(3.0, 7.0));
    }
}
