//! Semantic unit types for temperature and energy
//!
//! Newtype wrappers keep absolute temperatures and energies from being mixed with
//! other plain `f64` quantities in public signatures.
//!
//! # Design
//! - Both types wrap `f64` (Stefan-Boltzmann works on `T^4`)
//! - `Deref` to the inner value for arithmetic-heavy physics code
//! - Total ordering via `total_cmp` so temperatures can be min/max-ed directly
//!
//! # Usage
//! ```
//! use thedyx_core::core_types::units::Kelvin;
//!
//! let t = Kelvin::new(273.15);
//! assert!((t.to_celsius() - 0.0).abs() < 1e-9);
//! assert_eq!(Kelvin::new(10.0).max(Kelvin::new(20.0)), Kelvin::new(20.0));
//! ```

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, AddAssign, Deref, Sub};

/// Celsius to Kelvin offset (0°C = 273.15 K)
const CELSIUS_KELVIN_OFFSET: f64 = 273.15;

/// Absolute temperature
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Kelvin(f64);

impl Eq for Kelvin {}

impl PartialOrd for Kelvin {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Kelvin {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl Deref for Kelvin {
    type Target = f64;
    #[inline]
    fn deref(&self) -> &f64 {
        &self.0
    }
}

impl Kelvin {
    /// Absolute zero
    pub const ABSOLUTE_ZERO: Kelvin = Kelvin(0.0);

    /// Create a new temperature. Asserts value >= absolute zero.
    #[inline]
    #[must_use]
    #[track_caller]
    pub const fn new(value: f64) -> Self {
        assert!(value >= 0.0, "Kelvin::new: value is below absolute zero (0 K)");
        Kelvin(value)
    }

    /// Create a temperature, flooring anything below absolute zero (and NaN) at 0 K
    #[inline]
    #[must_use]
    pub fn clamped(value: f64) -> Self {
        if value > 0.0 {
            Kelvin(value)
        } else {
            Kelvin(0.0)
        }
    }

    /// Create from degrees Celsius
    #[inline]
    #[must_use]
    pub fn from_celsius(celsius: f64) -> Self {
        Kelvin::clamped(celsius + CELSIUS_KELVIN_OFFSET)
    }

    /// Convert to degrees Celsius
    #[inline]
    #[must_use]
    pub fn to_celsius(self) -> f64 {
        self.0 - CELSIUS_KELVIN_OFFSET
    }

    /// Raw value in Kelvin
    #[inline]
    #[must_use]
    pub const fn value(self) -> f64 {
        self.0
    }
}

impl From<Kelvin> for f64 {
    fn from(k: Kelvin) -> f64 {
        k.0
    }
}

impl Sub for Kelvin {
    type Output = f64;
    fn sub(self, rhs: Kelvin) -> f64 {
        self.0 - rhs.0
    }
}

impl fmt::Display for Kelvin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} K", self.0)
    }
}

/// Energy in joules, signed (positive = absorbed)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Joules(f64);

impl Deref for Joules {
    type Target = f64;
    #[inline]
    fn deref(&self) -> &f64 {
        &self.0
    }
}

impl Joules {
    pub const ZERO: Joules = Joules(0.0);

    #[inline]
    #[must_use]
    pub const fn new(value: f64) -> Self {
        Joules(value)
    }
}

impl Add for Joules {
    type Output = Joules;
    fn add(self, rhs: Joules) -> Joules {
        Joules(self.0 + rhs.0)
    }
}

impl AddAssign for Joules {
    fn add_assign(&mut self, rhs: Joules) {
        self.0 += rhs.0;
    }
}

impl fmt::Display for Joules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3} J", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_celsius_round_trip() {
        let t = Kelvin::from_celsius(100.0);
        assert!((*t - 373.15).abs() < 1e-9);
        assert!((t.to_celsius() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_clamped_floors_at_zero() {
        assert_eq!(Kelvin::clamped(-5.0), Kelvin::ABSOLUTE_ZERO);
        assert_eq!(Kelvin::clamped(f64::NAN), Kelvin::ABSOLUTE_ZERO);
        assert_eq!(Kelvin::clamped(12.5).value(), 12.5);
    }

    #[test]
    #[should_panic(expected = "below absolute zero")]
    fn test_new_rejects_negative() {
        let _ = Kelvin::new(-1.0);
    }

    #[test]
    fn test_joules_accumulate() {
        let mut e = Joules::ZERO;
        e += Joules::new(2.5);
        e += Joules::new(-1.0);
        assert_eq!(*e, 1.5);
    }
}
