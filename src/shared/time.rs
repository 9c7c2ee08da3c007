use chrono::{SecondsFormat, Utc};

/// Wall-clock seconds since the epoch with sub-second precision.
pub fn now_wall_secs() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
