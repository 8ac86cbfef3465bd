//! Conversions between the normalized levels used by the master (`0.0..=1.0`)
//! and the integer scales presentation layers usually work with.

/// Typical brightness scale of lighting frontends.
pub const BRIGHTNESS_MAX: u32 = 255;
/// Percent scale used for blind positions.
pub const POSITION_MAX: u32 = 100;

/// Clamps a level into `0.0..=1.0`. NaN and infinities collapse to `0.0`.
pub fn clamp_unit(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}

/// Converts `value` on a `0..=max` scale into a normalized level.
pub fn to_unit(value: u32, max: u32) -> f64 {
    if max == 0 {
        return 0.0;
    }
    clamp_unit(f64::from(value) / f64::from(max))
}

/// Converts a normalized level onto a `0..=max` scale, truncating like the
/// controller firmware does (0.5 on 255 is 127).
pub fn from_unit(unit: f64, max: u32) -> u32 {
    (clamp_unit(unit) * f64::from(max)) as u32
}
