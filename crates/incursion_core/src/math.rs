//! Fixed-point math utilities for deterministic simulation.
//!
//! Every fractional quantity in an invasion (roll sources, reward
//! multipliers, capture and conversion chances) is fixed-point so replays
//! agree bit-for-bit across platforms.

use fixed::types::I32F32;

/// Fixed-point number type for all simulation math.
///
/// Uses 32 bits for integer part and 32 bits for fractional part.
/// Range: approximately -2,147,483,648 to 2,147,483,647
/// Precision: approximately 0.00000000023
pub type Fixed = I32F32;

/// Serde support for fixed-point numbers.
///
/// Serializes fixed-point numbers as their raw bit representation (i64)
/// to preserve exact precision across serialization boundaries.
pub mod fixed_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a fixed-point number as its raw bit representation.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.to_bits().serialize(serializer)
    }

    /// Deserialize a fixed-point number from its raw bit representation.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = i64::deserialize(deserializer)?;
        Ok(Fixed::from_bits(bits))
    }
}

/// Serde support for fixed-point numbers written as whole percentages.
///
/// Catalog and tuning files are hand-edited, so chances are stored as
/// `30` rather than raw bits and converted to `0.30` on load.
pub mod percent_serde {
    use super::{from_percent, to_percent, Fixed};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a fraction as a whole percentage.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        to_percent(*value).serialize(serializer)
    }

    /// Deserialize a whole percentage into a fraction.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let percent = u32::deserialize(deserializer)?;
        Ok(from_percent(percent))
    }
}

/// Convert a whole percentage into a fraction (`25` becomes `0.25`).
#[must_use]
pub fn from_percent(percent: u32) -> Fixed {
    Fixed::from_num(percent) / Fixed::from_num(100)
}

/// Convert a fraction into a whole percentage, rounding to nearest.
#[must_use]
pub fn to_percent(value: Fixed) -> u32 {
    (value * Fixed::from_num(100)).round().to_num::<i64>().max(0) as u32
}

/// Round a value to two decimal places.
#[must_use]
pub fn round_hundredths(value: Fixed) -> Fixed {
    let hundred = Fixed::from_num(100);
    (value * hundred).round() / hundred
}

/// Scale an integer amount by a fixed-point factor, rounding to nearest.
#[must_use]
pub fn scale_amount(amount: i64, factor: Fixed) -> i64 {
    (Fixed::from_num(amount) * factor).round().to_num::<i64>()
}

/// Integer percentage of `part` over `whole`, clamped to `0..=100`.
///
/// A zero `whole` yields zero rather than dividing.
#[must_use]
pub fn ratio_percent(part: i64, whole: i64) -> i32 {
    if whole <= 0 {
        return 0;
    }
    ((part.max(0) * 100) / whole).clamp(0, 100) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_conversion() {
        assert_eq!(from_percent(25), Fixed::from_num(0.25));
        assert_eq!(from_percent(100), Fixed::ONE);
        assert_eq!(to_percent(from_percent(30)), 30);
        assert_eq!(to_percent(Fixed::ZERO), 0);
    }

    #[test]
    fn test_round_hundredths() {
        assert_eq!(round_hundredths(Fixed::from_num(1.25)), Fixed::from_num(1.25));
        assert_eq!(round_hundredths(Fixed::from_num(0.5)), Fixed::from_num(0.5));
        let third = Fixed::ONE / Fixed::from_num(3);
        assert_eq!(to_percent(round_hundredths(third)), 33);
    }

    #[test]
    fn test_scale_amount() {
        assert_eq!(scale_amount(100, Fixed::from_num(1.25)), 125);
        assert_eq!(scale_amount(40, Fixed::from_num(0.5)), 20);
        assert_eq!(scale_amount(17, Fixed::ZERO), 0);
    }

    #[test]
    fn test_ratio_percent() {
        assert_eq!(ratio_percent(1, 2), 50);
        assert_eq!(ratio_percent(5, 0), 0);
        assert_eq!(ratio_percent(300, 100), 100);
        assert_eq!(ratio_percent(-5, 100), 0);
    }
}
