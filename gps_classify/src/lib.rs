//! Stop and terrain classification of recorded GPS tracks.
//!
//! The pipeline decodes NMEA sentences into kinematic (`RMC`) and elevation
//! (`GGA`) fixes, builds two time-aligned tracks, cleans them, and labels
//! every point: errand stops and rolling stops on the speed track, ascending,
//! descending and flat stretches on the altitude track. The result renders to
//! a KML overlay.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod clean;
pub mod kml;
pub mod nmea;
pub mod stops;
pub mod terrain;
pub mod track;

pub use clean::{clean_altitude, clean_speed, AltitudeFilter};
pub use kml::render_kml;
pub use nmea::{decode_log, DecodeReport, DecodedLog, ElevationFix, KinematicFix};
pub use stops::classify_stops;
pub use terrain::classify_terrain;
pub use track::{
    build_tracks, quantize, Category, ElevationPoint, KinematicPoint, StopCategory,
    TerrainCategory,
};

#[derive(Error, Debug)]
pub enum ClassifyError {
    #[error("no kinematic (RMC) fixes to anchor the time axis")]
    EmptyInput,
    #[error("altitude track has {len} points, terrain classification needs at least {required}")]
    TrackTooShort { len: usize, required: usize },
    #[error("all timestamps in the slope window around altitude point {index} are equal")]
    DegenerateSlope { index: usize },
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Params {
    pub speed_step: f64,
    pub direction_step: f64,
    pub altitude_step: f64,
    pub altitude_filter: AltitudeFilter,
    pub altitude_spike_m: f64,
    pub errand_gap_s: f64,
    pub rolling_stop_max_speed: f64,
    pub slope_window: usize,
    pub slope_threshold: f64,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            speed_step: 1.0,
            direction_step: 1.0,
            altitude_step: 0.5,
            altitude_filter: AltitudeFilter::Passthrough,
            altitude_spike_m: 5.0,
            errand_gap_s: 120.0,
            rolling_stop_max_speed: 12.0,
            slope_window: 20,
            slope_threshold: 0.2,
        }
    }
}

impl Params {
    /// Parse a JSON parameter file; missing keys keep their defaults.
    pub fn from_json(text: &str) -> Result<Self, ClassifyError> {
        let params: Params = serde_json::from_str(text)
            .map_err(|e| ClassifyError::InvalidParameter(e.to_string()))?;
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<(), ClassifyError> {
        let positive = [
            ("speed_step", self.speed_step),
            ("direction_step", self.direction_step),
            ("altitude_step", self.altitude_step),
            ("altitude_spike_m", self.altitude_spike_m),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(ClassifyError::InvalidParameter(format!(
                    "{name} must be a positive number, got {value}"
                )));
            }
        }
        let non_negative = [
            ("errand_gap_s", self.errand_gap_s),
            ("rolling_stop_max_speed", self.rolling_stop_max_speed),
            ("slope_threshold", self.slope_threshold),
        ];
        for (name, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ClassifyError::InvalidParameter(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }
        if self.slope_window < 2 {
            return Err(ClassifyError::InvalidParameter(format!(
                "slope_window must be at least 2, got {}",
                self.slope_window
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct ClassifiedTracks {
    pub speed: Vec<KinematicPoint>,
    pub altitude: Vec<ElevationPoint>,
}

/// Build, clean and classify both tracks.
///
/// The speed and altitude tracks are independent once built, so they are
/// cleaned and classified on separate rayon tasks.
pub fn process(
    kinematic: &[KinematicFix],
    elevation: &[ElevationFix],
    params: &Params,
) -> Result<ClassifiedTracks, ClassifyError> {
    params.validate()?;
    let (speed, altitude) = build_tracks(kinematic, elevation, params)?;
    tracing::debug!(
        "built tracks: {} speed points, {} altitude points",
        speed.len(),
        altitude.len()
    );

    let (speed, altitude) = rayon::join(
        || {
            let mut speed = clean_speed(speed);
            classify_stops(&mut speed, params.errand_gap_s, params.rolling_stop_max_speed);
            speed
        },
        || -> Result<Vec<ElevationPoint>, ClassifyError> {
            let mut altitude =
                clean_altitude(altitude, params.altitude_filter, params.altitude_spike_m);
            classify_terrain(&mut altitude, params.slope_window, params.slope_threshold)?;
            Ok(altitude)
        },
    );
    let altitude = altitude?;

    tracing::debug!(
        "classified {} stops and {} terrain points",
        speed.iter().filter(|p| p.category.is_classified()).count(),
        altitude.iter().filter(|p| p.category.is_classified()).count()
    );
    Ok(ClassifiedTracks { speed, altitude })
}
