//! Unit conversions for upstream readings.

/// Convert a Fahrenheit temperature to Celsius.
#[must_use]
pub fn fahrenheit_to_celsius(fahrenheit: f64) -> f64 {
    (fahrenheit - 32.0) * 5.0 / 9.0
}
