//! Point model and track construction.
//!
//! A track is a time-ordered `Vec<Point<M>>`. The measurement type `M` decides
//! which attributes a point carries and which categories a classifier may
//! assign to it, so a speed point can never be asked for an altitude.

use std::fmt::Debug;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::nmea::{ElevationFix, KinematicFix};
use crate::{ClassifyError, Params};

const MICROS_PER_DAY: i64 = 86_400_000_000;

/// Classification tag assigned to a point.
pub trait Category: Copy + Debug + Default + PartialEq + Serialize {
    fn label(&self) -> &'static str;

    fn is_classified(&self) -> bool {
        *self != Self::default()
    }
}

/// Capability implemented by the per-track measurements.
pub trait Measurement: Clone + Debug + Serialize {
    type Category: Category;

    /// The quantity plotted against time for this track.
    fn value(&self) -> f64;
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum StopCategory {
    #[default]
    Unclassified,
    ErrandStop,
    RollingStop,
}

impl Category for StopCategory {
    fn label(&self) -> &'static str {
        match self {
            StopCategory::Unclassified => "unclassified",
            StopCategory::ErrandStop => "errand-stop",
            StopCategory::RollingStop => "rolling-stop",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum TerrainCategory {
    #[default]
    Unclassified,
    Ascending,
    Descending,
    Flat,
}

impl Category for TerrainCategory {
    fn label(&self) -> &'static str {
        match self {
            TerrainCategory::Unclassified => "unclassified",
            TerrainCategory::Ascending => "ascending",
            TerrainCategory::Descending => "descending",
            TerrainCategory::Flat => "flat",
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, PartialEq)]
pub struct Kinematic {
    pub speed: f64,
    pub direction: f64,
}

impl Measurement for Kinematic {
    type Category = StopCategory;

    fn value(&self) -> f64 {
        self.speed
    }
}

#[derive(Clone, Copy, Debug, Serialize, PartialEq)]
pub struct Elevation {
    pub altitude: f64,
}

impl Measurement for Elevation {
    type Category = TerrainCategory;

    fn value(&self) -> f64 {
        self.altitude
    }
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct Point<M: Measurement> {
    pub longitude: f64,
    pub latitude: f64,
    /// Seconds since the first kinematic fix.
    pub time: f64,
    pub measurement: M,
    pub category: M::Category,
}

impl<M: Measurement> Point<M> {
    pub fn new(longitude: f64, latitude: f64, time: f64, measurement: M) -> Self {
        Self {
            longitude,
            latitude,
            time,
            measurement,
            category: M::Category::default(),
        }
    }
}

impl Point<Kinematic> {
    pub fn speed(&self) -> f64 {
        self.measurement.speed
    }

    pub fn direction(&self) -> f64 {
        self.measurement.direction
    }
}

impl Point<Elevation> {
    pub fn altitude(&self) -> f64 {
        self.measurement.altitude
    }
}

pub type KinematicPoint = Point<Kinematic>;
pub type ElevationPoint = Point<Elevation>;

/// Floor `value` to a multiple of `step`.
pub fn quantize(value: f64, step: f64) -> f64 {
    (value / step).floor() * step
}

/// Seconds from `start` to `end` on the time-of-day clock, wrapped into one day.
pub fn elapsed_seconds(start: NaiveTime, end: NaiveTime) -> f64 {
    let delta = end.signed_duration_since(start);
    let micros = delta
        .num_microseconds()
        .unwrap_or(0)
        .rem_euclid(MICROS_PER_DAY);
    micros as f64 / 1_000_000.0
}

/// Convert decoded fixes into the speed and altitude tracks.
///
/// Both tracks share the timestamp of the first kinematic fix as their time
/// origin. No filtering happens here.
pub fn build_tracks(
    kinematic: &[KinematicFix],
    elevation: &[ElevationFix],
    params: &Params,
) -> Result<(Vec<KinematicPoint>, Vec<ElevationPoint>), ClassifyError> {
    let start = kinematic
        .first()
        .map(|fix| fix.timestamp)
        .ok_or(ClassifyError::EmptyInput)?;

    let speed_track: Vec<KinematicPoint> = kinematic
        .iter()
        .map(|fix| {
            Point::new(
                fix.longitude,
                fix.latitude,
                elapsed_seconds(start, fix.timestamp),
                Kinematic {
                    speed: quantize(fix.speed_over_ground, params.speed_step),
                    direction: quantize(fix.true_course, params.direction_step),
                },
            )
        })
        .collect();

    let altitude_track: Vec<ElevationPoint> = elevation
        .iter()
        .map(|fix| {
            Point::new(
                fix.longitude,
                fix.latitude,
                elapsed_seconds(start, fix.timestamp),
                Elevation {
                    altitude: quantize(fix.altitude, params.altitude_step),
                },
            )
        })
        .collect();

    warn_if_unordered("speed", &speed_track);
    warn_if_unordered("altitude", &altitude_track);

    Ok((speed_track, altitude_track))
}

fn warn_if_unordered<M: Measurement>(name: &str, track: &[Point<M>]) {
    if let Some(idx) = track.windows(2).position(|w| w[1].time < w[0].time) {
        tracing::warn!(
            "{} track time goes backwards at point {} ({:.3}s -> {:.3}s)",
            name,
            idx + 1,
            track[idx].time,
            track[idx + 1].time
        );
    }
}
