//! A single navigation solution from the receiver.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Legacy logs stored ground speed in mm/s; anything above this is rescaled.
const LEGACY_SPEED_THRESHOLD: f64 = 1000.0;

/// One satellite in view, from GSV.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SatelliteInfo {
    /// Talker of the sentence that reported it (GP, GL, GA, GB...).
    pub system: String,
    pub prn: u16,
    pub elevation: Option<u8>,
    pub azimuth: Option<u16>,
    /// Carrier to noise density in dB-Hz, `None` when not tracked.
    pub snr: Option<u8>,
}

/// Position, velocity and quality fields.
///
/// Field names on the wire follow the u-blox NAV-PVT naming so that JSONL
/// logs stay readable by other tools. Missing values are NaN in memory and
/// `null` in JSON. Ground speed is always metres per second.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpsFix {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<Utc>>,
    #[serde(with = "nullable", default = "nan")]
    pub lat: f64,
    #[serde(with = "nullable", default = "nan")]
    pub lon: f64,
    /// Height above mean sea level, metres.
    #[serde(rename = "hMSL", with = "nullable", default = "nan")]
    pub height_msl: f64,
    /// Ground speed, m/s.
    #[serde(rename = "gSpeed", with = "nullable", default = "nan")]
    pub ground_speed: f64,
    /// Heading of motion, degrees.
    #[serde(rename = "headMot", with = "nullable", default = "nan")]
    pub heading: f64,
    #[serde(rename = "numSV", default)]
    pub num_sv: u32,
    /// 0 no fix, 2 2D, 3 3D.
    #[serde(rename = "fixType", default)]
    pub fix_type: u8,
    /// 0 none, 1 RTK float, 2 RTK fixed.
    #[serde(rename = "carrSoln", default)]
    pub carrier_solution: u8,
    #[serde(rename = "hAcc", with = "nullable", default = "nan")]
    pub h_acc: f64,
    #[serde(rename = "vAcc", with = "nullable", default = "nan")]
    pub v_acc: f64,
    #[serde(rename = "pDOP", with = "nullable", default = "nan")]
    pub pdop: f64,
    #[serde(rename = "hDOP", with = "nullable", default = "nan")]
    pub hdop: f64,
    #[serde(rename = "vDOP", with = "nullable", default = "nan")]
    pub vdop: f64,
    /// Age of differential corrections, seconds.
    #[serde(rename = "diffAge", with = "nullable", default = "nan")]
    pub diff_age: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub satellites: Vec<SatelliteInfo>,
}

impl Default for GpsFix {
    fn default() -> Self {
        Self {
            time: None,
            lat: f64::NAN,
            lon: f64::NAN,
            height_msl: f64::NAN,
            ground_speed: f64::NAN,
            heading: f64::NAN,
            num_sv: 0,
            fix_type: 0,
            carrier_solution: 0,
            h_acc: f64::NAN,
            v_acc: f64::NAN,
            pdop: f64::NAN,
            hdop: f64::NAN,
            vdop: f64::NAN,
            diff_age: f64::NAN,
            satellites: Vec::new(),
        }
    }
}

impl GpsFix {
    /// True when both coordinates are present.
    pub fn has_position(&self) -> bool {
        self.lat.is_finite() && self.lon.is_finite()
    }

    pub fn fix_type_label(&self) -> &'static str {
        match self.fix_type {
            0 => "No Fix",
            1 => "Dead Reckoning",
            2 => "2D Fix",
            3 => "3D Fix",
            4 => "GNSS + DR",
            5 => "Time Only",
            _ => "Unknown",
        }
    }

    pub fn carrier_solution_label(&self) -> &'static str {
        match self.carrier_solution {
            1 => "RTK Float",
            2 => "RTK Fixed",
            _ => "None",
        }
    }

    /// Rescale a ground speed recorded in mm/s by older loggers.
    pub fn normalize_legacy_speed(&mut self) {
        if self.ground_speed.is_finite() && self.ground_speed > LEGACY_SPEED_THRESHOLD {
            self.ground_speed /= 1000.0;
        }
    }
}

fn nan() -> f64 {
    f64::NAN
}

/// NaN <-> `null`.
mod nullable {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else {
            serializer.serialize_none()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nan_fields_serialize_as_null() {
        let fix = GpsFix {
            lat: 40.0,
            lon: -105.0,
            ..GpsFix::default()
        };
        let json = serde_json::to_value(&fix).unwrap();
        assert_eq!(json["lat"], 40.0);
        assert!(json["hMSL"].is_null());
        assert!(json.get("satellites").is_none());
    }

    #[test]
    fn test_deserialize_partial_record() {
        let fix: GpsFix =
            serde_json::from_str(r#"{"lat": 1.5, "lon": 2.5, "gSpeed": null, "numSV": 7}"#).unwrap();
        assert!(fix.has_position());
        assert!(fix.ground_speed.is_nan());
        assert!(fix.pdop.is_nan());
        assert_eq!(fix.num_sv, 7);
    }

    #[test]
    fn test_legacy_speed_rescaled() {
        let mut fix = GpsFix {
            ground_speed: 12_500.0,
            ..GpsFix::default()
        };
        fix.normalize_legacy_speed();
        assert_eq!(fix.ground_speed, 12.5);

        let mut fix = GpsFix {
            ground_speed: 30.0,
            ..GpsFix::default()
        };
        fix.normalize_legacy_speed();
        assert_eq!(fix.ground_speed, 30.0);
    }
}
