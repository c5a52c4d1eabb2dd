//! Telemetry record layout.

use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::imu::protocol::ImuSample;
use crate::tasks::control::ControlStatus;

/// One JSONL line.
///
/// `control` is `null` until the control task has completed its first tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TelemetryRecord {
    /// Wall-clock time, RFC 3339 with milliseconds
    #[serde(serialize_with = "serialize_timestamp")]
    pub timestamp: chrono::DateTime<Utc>,
    pub control: Option<ControlStatus>,
    pub imu: ImuSample,
}

impl TelemetryRecord {
    /// Stamps a record with the current wall-clock time.
    #[must_use]
    pub fn now(control: Option<ControlStatus>, imu: ImuSample) -> Self {
        Self {
            timestamp: Utc::now(),
            control,
            imu,
        }
    }
}

fn serialize_timestamp<S>(ts: &chrono::DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Millis, true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GaitConfig;
    use crate::gait::GaitController;
    use crate::tasks::link::LinkStatus;
    use chrono::TimeZone;

    #[test]
    fn test_record_json_layout() {
        let gait = GaitController::new(GaitConfig::default());
        let record = TelemetryRecord {
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            control: Some(ControlStatus {
                uptime_ms: 42,
                link: LinkStatus::Up,
                gait: gait.snapshot(),
                body_pulse: 157,
                tail_pulse: 150,
            }),
            imu: ImuSample::default(),
        };

        let json: serde_json::Value = serde_json::to_value(record).unwrap();
        assert_eq!(json["timestamp"], "2024-05-01T12:00:00.000Z");
        assert_eq!(json["control"]["link"], "up");
        assert_eq!(json["control"]["gait"]["mode"], "stop");
        assert_eq!(json["control"]["gait"]["phase"], serde_json::Value::Null);
        assert_eq!(json["control"]["gait"]["command"]["action"], "stop");
        assert_eq!(json["control"]["body_pulse"], 157);
        assert_eq!(json["imu"]["quaternion"].as_array().unwrap().len(), 4);
    }

    #[test]
    fn test_record_without_control() {
        let record = TelemetryRecord::now(None, ImuSample::default());
        let line = serde_json::to_string(&record).unwrap();
        assert!(line.contains("\"control\":null"));
        assert!(!line.contains('\n'));
    }
}
