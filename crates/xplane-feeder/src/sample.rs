/// Telemetry sample types and the raw-to-wire conversion.
use chrono::{DateTime, Utc};

/// Exact international foot, in meters.
pub const FEET_TO_METERS: f64 = 0.3048;

/// Unused: no behaviour is attached to this threshold, and samples on either side convert
/// identically. Kept pending product-owner clarification of whether gear or flap state should
/// key off it. As historically applied the comparison was against the converted meters value,
/// not feet, so the unit must be settled along with the rule.
pub const HIGH_ALTITUDE_FT: f64 = 1000.0;

//  _____
// |_   _|   _ _ __   ___  ___
//   | || | | | '_ \ / _ \/ __|
//   | || |_| | |_) |  __/\__ \
//   |_| \__, | .__/ \___||___/
//       |___/|_|

/// Most recent point recorded for a flight, as returned by a
/// [`TelemetrySource`](crate::source::TelemetrySource). Every numeric field has already been
/// coerced by the source; a record that can't be coerced never becomes a `RawSample`.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSample {
    /// Store timestamp of the point, when the store reports one. Diagnostics only.
    pub time: Option<DateTime<Utc>>,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude_ft: f64,
    pub heading_deg: f64,
}

/// A sample in the units and numeric widths of the wire packet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConvertedSample {
    pub vehicle_id: i32,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude_m: f64,
    pub heading: f32,
}

/// Convert a raw sample for `vehicle_id`.
///
/// Altitude goes from feet to meters with a single multiply. Heading is narrowed to `f32` and
/// otherwise untouched: no wraparound into `[0, 360)`, out-of-range values pass through.
pub fn convert(vehicle_id: i32, raw: &RawSample) -> ConvertedSample {
    ConvertedSample {
        vehicle_id,
        latitude: raw.latitude,
        longitude: raw.longitude,
        altitude_m: raw.altitude_ft * FEET_TO_METERS,
        heading: raw.heading_deg as f32,
    }
}
