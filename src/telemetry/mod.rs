//! Telemetry provider access: token session, readings and unit conversion.

pub mod session;
pub mod types;
pub mod units;

pub use session::TelemetrySession;
pub use types::{Credential, TelemetryReading, TelemetryWindow};
pub use units::fahrenheit_to_celsius;
