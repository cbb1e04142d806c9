//! NMEA 0183 sentence parsing.
//!
//! Only the sentences needed for a navigation fix are decoded: RMC, GGA,
//! GSA, GSV and GST, from any talker (GP, GN, GL, GA, GB). Everything else
//! parses to [`Sentence::Other`] once its checksum is verified.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};

use super::fix::{GpsFix, SatelliteInfo};
use crate::error::NmeaError;

const KNOTS_TO_MPS: f64 = 0.514444;

#[derive(Debug, Clone, PartialEq)]
pub struct Rmc {
    pub time: Option<NaiveTime>,
    pub date: Option<NaiveDate>,
    pub valid: bool,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub speed_mps: Option<f64>,
    pub course: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Gga {
    pub time: Option<NaiveTime>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    /// 0 invalid, 1 GPS, 2 DGPS, 4 RTK fixed, 5 RTK float.
    pub quality: u8,
    pub num_sv: u32,
    pub hdop: Option<f64>,
    pub altitude: Option<f64>,
    pub diff_age: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Gsa {
    /// 1 no fix, 2 2D, 3 3D.
    pub mode: u8,
    pub pdop: Option<f64>,
    pub hdop: Option<f64>,
    pub vdop: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Gsv {
    pub talker: String,
    pub total_messages: u8,
    pub message_number: u8,
    pub satellites: Vec<SatelliteInfo>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Gst {
    pub lat_sigma: Option<f64>,
    pub lon_sigma: Option<f64>,
    pub alt_sigma: Option<f64>,
}

/// A checksum-verified sentence.
#[derive(Debug, Clone, PartialEq)]
pub enum Sentence {
    Rmc(Rmc),
    Gga(Gga),
    Gsa(Gsa),
    Gsv(Gsv),
    Gst(Gst),
    /// Any other sentence type, by its three letter code.
    Other(String),
}

/// XOR of every byte between `$` and `*`.
pub fn checksum(body: &str) -> u8 {
    body.bytes().fold(0u8, |acc, b| acc ^ b)
}

/// Parse one line such as `$GNGGA,...*5C`.
pub fn parse_sentence(line: &str) -> Result<Sentence, NmeaError> {
    let line = line.trim();
    let rest = line.strip_prefix('$').ok_or(NmeaError::MissingStart)?;
    let (body, sum) = rest
        .split_once('*')
        .ok_or_else(|| NmeaError::Malformed("missing checksum".to_string()))?;

    let expected = u8::from_str_radix(sum.trim(), 16)
        .map_err(|_| NmeaError::Malformed(format!("bad checksum field '{}'", sum)))?;
    let computed = checksum(body);
    if expected != computed {
        return Err(NmeaError::Checksum { expected, computed });
    }

    let fields: Vec<&str> = body.split(',').collect();
    let address = fields[0];
    if address.len() < 5 || !address.is_ascii() {
        return Err(NmeaError::Malformed(format!("bad address '{}'", address)));
    }
    let talker = &address[..2];
    let kind = &address[address.len() - 3..];

    let sentence = match kind {
        "RMC" => Sentence::Rmc(parse_rmc(&fields)?),
        "GGA" => Sentence::Gga(parse_gga(&fields)?),
        "GSA" => Sentence::Gsa(parse_gsa(&fields)?),
        "GSV" => Sentence::Gsv(parse_gsv(talker, &fields)?),
        "GST" => Sentence::Gst(parse_gst(&fields)?),
        other => Sentence::Other(other.to_string()),
    };
    Ok(sentence)
}

fn require(fields: &[&str], count: usize, kind: &str) -> Result<(), NmeaError> {
    if fields.len() < count {
        return Err(NmeaError::Malformed(format!(
            "{} has {} fields, expected at least {}",
            kind,
            fields.len(),
            count
        )));
    }
    Ok(())
}

fn parse_rmc(f: &[&str]) -> Result<Rmc, NmeaError> {
    require(f, 10, "RMC")?;
    Ok(Rmc {
        time: parse_time(f[1]),
        valid: f[2] == "A",
        lat: parse_coordinate(f[3], f[4]),
        lon: parse_coordinate(f[5], f[6]),
        speed_mps: parse_f64(f[7]).map(|knots| knots * KNOTS_TO_MPS),
        course: parse_f64(f[8]),
        date: parse_date(f[9]),
    })
}

fn parse_gga(f: &[&str]) -> Result<Gga, NmeaError> {
    require(f, 10, "GGA")?;
    Ok(Gga {
        time: parse_time(f[1]),
        lat: parse_coordinate(f[2], f[3]),
        lon: parse_coordinate(f[4], f[5]),
        quality: f[6].parse().unwrap_or(0),
        num_sv: f[7].parse().unwrap_or(0),
        hdop: parse_f64(f[8]),
        altitude: parse_f64(f[9]),
        diff_age: f.get(13).and_then(|s| parse_f64(s)),
    })
}

fn parse_gsa(f: &[&str]) -> Result<Gsa, NmeaError> {
    require(f, 18, "GSA")?;
    Ok(Gsa {
        mode: f[2].parse().unwrap_or(1),
        pdop: parse_f64(f[15]),
        hdop: parse_f64(f[16]),
        vdop: parse_f64(f[17]),
    })
}

fn parse_gsv(talker: &str, f: &[&str]) -> Result<Gsv, NmeaError> {
    require(f, 4, "GSV")?;
    let total_messages = f[1]
        .parse()
        .map_err(|_| NmeaError::Malformed("GSV message count".to_string()))?;
    let message_number = f[2]
        .parse()
        .map_err(|_| NmeaError::Malformed("GSV message number".to_string()))?;

    // Groups of four after the header; NMEA 4.10 appends a lone signal id
    let satellites = f[4..]
        .chunks_exact(4)
        .filter_map(|sat| {
            let prn = sat[0].parse().ok()?;
            Some(SatelliteInfo {
                system: talker.to_string(),
                prn,
                elevation: sat[1].parse().ok(),
                azimuth: sat[2].parse().ok(),
                snr: sat[3].parse().ok(),
            })
        })
        .collect();

    Ok(Gsv {
        talker: talker.to_string(),
        total_messages,
        message_number,
        satellites,
    })
}

fn parse_gst(f: &[&str]) -> Result<Gst, NmeaError> {
    require(f, 9, "GST")?;
    Ok(Gst {
        lat_sigma: parse_f64(f[6]),
        lon_sigma: parse_f64(f[7]),
        alt_sigma: parse_f64(f[8]),
    })
}

fn parse_f64(s: &str) -> Option<f64> {
    if s.is_empty() {
        None
    } else {
        s.parse().ok()
    }
}

/// `ddmm.mmmm` / `dddmm.mmmm` plus hemisphere to signed decimal degrees.
pub fn parse_coordinate(value: &str, hemisphere: &str) -> Option<f64> {
    let raw = parse_f64(value)?;
    let degrees = (raw / 100.0).trunc();
    let minutes = raw - degrees * 100.0;
    let decimal = degrees + minutes / 60.0;
    match hemisphere {
        "N" | "E" => Some(decimal),
        "S" | "W" => Some(-decimal),
        _ => None,
    }
}

fn parse_time(s: &str) -> Option<NaiveTime> {
    if s.len() < 6 {
        return None;
    }
    let hour = s.get(0..2)?.parse().ok()?;
    let minute = s.get(2..4)?.parse().ok()?;
    let seconds: f64 = s.get(4..)?.parse().ok()?;
    let whole = seconds.trunc() as u32;
    let millis = ((seconds - seconds.trunc()) * 1000.0).round() as u32;
    NaiveTime::from_hms_milli_opt(hour, minute, whole, millis)
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    if s.len() != 6 {
        return None;
    }
    let day = s.get(0..2)?.parse().ok()?;
    let month = s.get(2..4)?.parse().ok()?;
    let year: i32 = s.get(4..6)?.parse().ok()?;
    let century = if year >= 80 { 1900 } else { 2000 };
    NaiveDate::from_ymd_opt(century + year, month, day)
}

/// Folds the sentences of one epoch into a [`GpsFix`].
///
/// A fix is emitted once both RMC and GGA for the same UTC time have been
/// seen; the other sentences update whatever fix is in progress.
#[derive(Debug, Default)]
pub struct NmeaAccumulator {
    current: GpsFix,
    date: Option<NaiveDate>,
    rmc_time: Option<NaiveTime>,
    gga_time: Option<NaiveTime>,
    emitted_time: Option<NaiveTime>,
    satellites: BTreeMap<String, Vec<SatelliteInfo>>,
    pending_satellites: BTreeMap<String, Vec<SatelliteInfo>>,
}

impl NmeaAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and apply one line.
    pub fn push_line(&mut self, line: &str) -> Result<Option<GpsFix>, NmeaError> {
        let sentence = parse_sentence(line)?;
        Ok(self.push(sentence))
    }

    /// Apply a sentence, returning a fix when an epoch completes.
    pub fn push(&mut self, sentence: Sentence) -> Option<GpsFix> {
        match sentence {
            Sentence::Rmc(rmc) => {
                if rmc.date.is_some() {
                    self.date = rmc.date;
                }
                if rmc.valid {
                    self.current.lat = rmc.lat.unwrap_or(f64::NAN);
                    self.current.lon = rmc.lon.unwrap_or(f64::NAN);
                    self.current.ground_speed = rmc.speed_mps.unwrap_or(f64::NAN);
                    self.current.heading = rmc.course.unwrap_or(f64::NAN);
                } else {
                    self.current.lat = f64::NAN;
                    self.current.lon = f64::NAN;
                    self.current.ground_speed = f64::NAN;
                    self.current.heading = f64::NAN;
                    self.current.fix_type = 0;
                }
                self.rmc_time = rmc.time;
                self.set_time(rmc.time);
                self.maybe_emit()
            }
            Sentence::Gga(gga) => {
                if gga.quality == 0 {
                    self.current.fix_type = 0;
                    self.current.height_msl = f64::NAN;
                } else {
                    self.current.height_msl = gga.altitude.unwrap_or(f64::NAN);
                    if let (Some(lat), Some(lon)) = (gga.lat, gga.lon) {
                        self.current.lat = lat;
                        self.current.lon = lon;
                    }
                }
                self.current.num_sv = gga.num_sv;
                self.current.hdop = gga.hdop.unwrap_or(f64::NAN);
                self.current.diff_age = gga.diff_age.unwrap_or(f64::NAN);
                self.current.carrier_solution = match gga.quality {
                    4 => 2,
                    5 => 1,
                    _ => 0,
                };
                self.gga_time = gga.time;
                self.set_time(gga.time);
                self.maybe_emit()
            }
            Sentence::Gsa(gsa) => {
                self.current.fix_type = if gsa.mode >= 2 { gsa.mode } else { 0 };
                self.current.pdop = gsa.pdop.unwrap_or(f64::NAN);
                self.current.hdop = gsa.hdop.unwrap_or(self.current.hdop);
                self.current.vdop = gsa.vdop.unwrap_or(f64::NAN);
                None
            }
            Sentence::Gsv(gsv) => {
                if gsv.message_number <= 1 {
                    self.pending_satellites.insert(gsv.talker.clone(), Vec::new());
                }
                let pending = self.pending_satellites.entry(gsv.talker.clone()).or_default();
                pending.extend(gsv.satellites);
                if gsv.message_number >= gsv.total_messages {
                    if let Some(done) = self.pending_satellites.remove(&gsv.talker) {
                        self.satellites.insert(gsv.talker, done);
                    }
                }
                None
            }
            Sentence::Gst(gst) => {
                if let (Some(lat), Some(lon)) = (gst.lat_sigma, gst.lon_sigma) {
                    self.current.h_acc = (lat * lat + lon * lon).sqrt();
                }
                self.current.v_acc = gst.alt_sigma.unwrap_or(f64::NAN);
                None
            }
            Sentence::Other(_) => None,
        }
    }

    fn set_time(&mut self, time: Option<NaiveTime>) {
        if let (Some(date), Some(time)) = (self.date, time) {
            self.current.time = Some(Utc.from_utc_datetime(&date.and_time(time)));
        }
    }

    fn maybe_emit(&mut self) -> Option<GpsFix> {
        let time = self.rmc_time?;
        if self.gga_time != Some(time) || self.emitted_time == Some(time) {
            return None;
        }
        self.emitted_time = Some(time);
        let mut fix = self.current.clone();
        fix.satellites = self.satellites.values().flatten().cloned().collect();
        Some(fix)
    }
}
