//! NMEA 0183 decoding for recorded GPS logs.
//!
//! Only two sentence types carry data the classifiers need: `RMC` (position,
//! speed over ground, true course) and `GGA` (position, altitude). Every other
//! well-formed sentence is ignored. Lines that fail to decode are recorded in a
//! [`DecodeReport`] instead of aborting the whole log.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("not an NMEA sentence")]
    BadFrame,
    #[error("checksum mismatch: computed {computed:02X}, sentence says {stated}")]
    Checksum { computed: u8, stated: String },
    #[error("missing field: {0}")]
    MissingField(&'static str),
    #[error("invalid {field}: {value:?}")]
    InvalidField { field: &'static str, value: String },
}

/// Position, speed and heading from an `RMC` sentence.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct KinematicFix {
    pub timestamp: NaiveTime,
    pub longitude: f64,
    pub latitude: f64,
    /// Speed over ground, knots.
    pub speed_over_ground: f64,
    /// True course, degrees.
    pub true_course: f64,
}

/// Position and altitude from a `GGA` sentence.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ElevationFix {
    pub timestamp: NaiveTime,
    pub longitude: f64,
    pub latitude: f64,
    pub altitude: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Fix {
    Kinematic(KinematicFix),
    Elevation(ElevationFix),
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SkippedLine {
    pub line: usize,
    pub reason: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DecodeReport {
    pub lines: usize,
    pub kinematic: usize,
    pub elevation: usize,
    pub ignored: usize,
    pub skipped: Vec<SkippedLine>,
}

#[derive(Clone, Debug, Default)]
pub struct DecodedLog {
    pub kinematic: Vec<KinematicFix>,
    pub elevation: Vec<ElevationFix>,
    pub report: DecodeReport,
}

/// Decode a whole log, partitioning fixes by kind in input order.
pub fn decode_log(text: &str) -> DecodedLog {
    let mut out = DecodedLog::default();
    for (idx, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        out.report.lines += 1;
        match decode_sentence(line) {
            Ok(Some(Fix::Kinematic(fix))) => {
                out.report.kinematic += 1;
                out.kinematic.push(fix);
            }
            Ok(Some(Fix::Elevation(fix))) => {
                out.report.elevation += 1;
                out.elevation.push(fix);
            }
            Ok(None) => out.report.ignored += 1,
            Err(err) => out.report.skipped.push(SkippedLine {
                line: idx + 1,
                reason: err.to_string(),
            }),
        }
    }
    out
}

/// Decode a single sentence. Well-formed sentences other than RMC/GGA yield `Ok(None)`.
pub fn decode_sentence(line: &str) -> Result<Option<Fix>, DecodeError> {
    let line = line.trim();
    let body = line.strip_prefix('$').unwrap_or(line);

    let body = match body.split_once('*') {
        Some((payload, stated)) => {
            let computed = checksum(payload);
            let stated = stated.trim();
            match u8::from_str_radix(stated, 16) {
                Ok(value) if value == computed => payload,
                _ => {
                    return Err(DecodeError::Checksum {
                        computed,
                        stated: stated.to_string(),
                    })
                }
            }
        }
        None => body,
    };

    let fields: Vec<&str> = body.split(',').collect();
    let address = fields[0];
    if address.len() != 5 || !address.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return Err(DecodeError::BadFrame);
    }

    match &address[2..] {
        "RMC" => parse_rmc(&fields).map(|fix| Some(Fix::Kinematic(fix))),
        "GGA" => parse_gga(&fields).map(|fix| Some(Fix::Elevation(fix))),
        _ => Ok(None),
    }
}

fn checksum(payload: &str) -> u8 {
    payload.bytes().fold(0u8, |acc, b| acc ^ b)
}

fn parse_rmc(fields: &[&str]) -> Result<KinematicFix, DecodeError> {
    // $--RMC,hhmmss.ss,A,llll.ll,a,yyyyy.yy,a,x.x,x.x,ddmmyy,...
    let timestamp = parse_time(field(fields, 1, "timestamp")?)?;
    let latitude = parse_coordinate(
        field(fields, 3, "latitude")?,
        field(fields, 4, "latitude hemisphere")?,
        "latitude",
    )?;
    let longitude = parse_coordinate(
        field(fields, 5, "longitude")?,
        field(fields, 6, "longitude hemisphere")?,
        "longitude",
    )?;
    let speed_over_ground = parse_number(field(fields, 7, "speed over ground")?, "speed over ground")?;
    // Receivers commonly leave the course blank while stationary.
    let true_course = match fields.get(8).map(|f| f.trim()) {
        Some("") | None if speed_over_ground == 0.0 => 0.0,
        _ => parse_number(field(fields, 8, "true course")?, "true course")?,
    };
    Ok(KinematicFix {
        timestamp,
        longitude,
        latitude,
        speed_over_ground,
        true_course,
    })
}

fn parse_gga(fields: &[&str]) -> Result<ElevationFix, DecodeError> {
    // $--GGA,hhmmss.ss,llll.ll,a,yyyyy.yy,a,q,nn,h.h,alt,M,...
    let timestamp = parse_time(field(fields, 1, "timestamp")?)?;
    let latitude = parse_coordinate(
        field(fields, 2, "latitude")?,
        field(fields, 3, "latitude hemisphere")?,
        "latitude",
    )?;
    let longitude = parse_coordinate(
        field(fields, 4, "longitude")?,
        field(fields, 5, "longitude hemisphere")?,
        "longitude",
    )?;
    let altitude = parse_number(field(fields, 9, "altitude")?, "altitude")?;
    Ok(ElevationFix {
        timestamp,
        longitude,
        latitude,
        altitude,
    })
}

fn field<'a>(fields: &[&'a str], idx: usize, name: &'static str) -> Result<&'a str, DecodeError> {
    match fields.get(idx).map(|f| f.trim()) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(DecodeError::MissingField(name)),
    }
}

fn parse_number(value: &str, name: &'static str) -> Result<f64, DecodeError> {
    value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| DecodeError::InvalidField {
            field: name,
            value: value.to_string(),
        })
}

/// Parse an NMEA coordinate (`ddmm.mmmm` / `dddmm.mmmm`) into signed decimal degrees.
fn parse_coordinate(value: &str, hemisphere: &str, name: &'static str) -> Result<f64, DecodeError> {
    let invalid = || DecodeError::InvalidField {
        field: name,
        value: format!("{value},{hemisphere}"),
    };
    let raw = value.parse::<f64>().map_err(|_| invalid())?;
    if !raw.is_finite() || raw < 0.0 {
        return Err(invalid());
    }
    let degrees = (raw / 100.0).floor();
    let minutes = raw - degrees * 100.0;
    let decimal = degrees + minutes / 60.0;
    match hemisphere {
        "N" | "E" => Ok(decimal),
        "S" | "W" => Ok(-decimal),
        _ => Err(invalid()),
    }
}

/// Parse an NMEA time of day (`hhmmss` with optional fractional seconds).
fn parse_time(value: &str) -> Result<NaiveTime, DecodeError> {
    let invalid = || DecodeError::InvalidField {
        field: "timestamp",
        value: value.to_string(),
    };
    if value.len() < 6 || !value.as_bytes()[..6].iter().all(u8::is_ascii_digit) {
        return Err(invalid());
    }
    let (hms, frac) = value.split_at(6);
    let digits = |range: std::ops::Range<usize>| hms[range].parse::<u32>().map_err(|_| invalid());
    let hour = digits(0..2)?;
    let minute = digits(2..4)?;
    let second = digits(4..6)?;

    let micros = if frac.is_empty() {
        0
    } else {
        let fraction = frac.strip_prefix('.').ok_or_else(invalid)?;
        if fraction.is_empty() || !fraction.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        // Pad or truncate to six digits of microseconds.
        let mut padded: String = fraction.chars().take(6).collect();
        while padded.len() < 6 {
            padded.push('0');
        }
        padded.parse::<u32>().map_err(|_| invalid())?
    };

    NaiveTime::from_hms_micro_opt(hour, minute, second, micros).ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RMC: &str = "$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*6A";
    const GGA: &str = "$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47";

    #[test]
    fn test_decode_rmc() {
        let fix = match decode_sentence(RMC).unwrap() {
            Some(Fix::Kinematic(fix)) => fix,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(fix.timestamp, NaiveTime::from_hms_opt(12, 35, 19).unwrap());
        assert!((fix.latitude - 48.1173).abs() < 1e-9);
        assert!((fix.longitude - 11.516_666_666_666_667).abs() < 1e-9);
        assert_eq!(fix.speed_over_ground, 22.4);
        assert_eq!(fix.true_course, 84.4);
    }

    #[test]
    fn test_decode_gga() {
        let fix = match decode_sentence(GGA).unwrap() {
            Some(Fix::Elevation(fix)) => fix,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(fix.altitude, 545.4);
        assert!((fix.latitude - 48.1173).abs() < 1e-9);
    }

    #[test]
    fn test_checksum_mismatch() {
        let corrupted = RMC.replace("022.4", "023.4");
        assert!(matches!(
            decode_sentence(&corrupted),
            Err(DecodeError::Checksum { .. })
        ));
    }

    #[test]
    fn test_checksum_optional() {
        let bare = "$GNRMC,000001.50,A,3723.2475,S,12158.3416,W,0.0,0.0,010100,,";
        let fix = match decode_sentence(bare).unwrap() {
            Some(Fix::Kinematic(fix)) => fix,
            other => panic!("unexpected {:?}", other),
        };
        assert!((fix.latitude + 37.387458333333336).abs() < 1e-12);
        assert!((fix.longitude + 121.97236).abs() < 1e-12);
        assert_eq!(
            fix.timestamp,
            NaiveTime::from_hms_micro_opt(0, 0, 1, 500_000).unwrap()
        );
    }

    #[test]
    fn test_other_sentences_ignored() {
        let gsv = "$GPGSV,1,1,00";
        assert_eq!(decode_sentence(gsv), Ok(None));
    }

    #[test]
    fn test_missing_course_rejected() {
        let line = "$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,,230394,,";
        assert_eq!(
            decode_sentence(line),
            Err(DecodeError::MissingField("true course"))
        );
    }

    #[test]
    fn test_stationary_blank_course_defaults_to_zero() {
        let line = "$GPRMC,123519,A,4807.038,N,01131.000,E,0.0,,230394,,";
        let fix = match decode_sentence(line).unwrap() {
            Some(Fix::Kinematic(fix)) => fix,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(fix.speed_over_ground, 0.0);
        assert_eq!(fix.true_course, 0.0);
    }

    #[test]
    fn test_non_ascii_time_is_skipped() {
        let line = "$GPRMC,1\u{e9}345,A,4807.038,N,01131.000,E,022.4,084.4,230394,,";
        assert!(matches!(
            decode_sentence(line),
            Err(DecodeError::InvalidField { field: "timestamp", .. })
        ));
        let log = decode_log(&format!("{line}\n{RMC}"));
        assert_eq!(log.kinematic.len(), 1);
        assert_eq!(log.report.skipped.len(), 1);
        assert_eq!(log.report.skipped[0].line, 1);
    }

    #[test]
    fn test_parse_time() {
        assert_eq!(
            parse_time("235959.123").unwrap(),
            NaiveTime::from_hms_micro_opt(23, 59, 59, 123_000).unwrap()
        );
        assert!(parse_time("12").is_err());
        assert!(parse_time("256000").is_err());
        assert!(parse_time("12\u{e9}456").is_err());
        assert!(parse_time("1234 6").is_err());
    }

    #[test]
    fn test_decode_log_report() {
        let text = format!("{RMC}\n\ngarbage line\n{GGA}\n$GPGSV,1,1,00\n{RMC}\n");
        let log = decode_log(&text);
        assert_eq!(log.kinematic.len(), 2);
        assert_eq!(log.elevation.len(), 1);
        assert_eq!(log.report.lines, 5);
        assert_eq!(log.report.ignored, 1);
        assert_eq!(log.report.skipped.len(), 1);
        assert_eq!(log.report.skipped[0].line, 3);
    }
}
