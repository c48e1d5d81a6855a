//! Uphill / downhill / flat labelling from a sliding least-squares slope.

use ndarray::{s, Array1, ArrayView1};

use crate::track::{ElevationPoint, TerrainCategory};
use crate::ClassifyError;

/// Label interior points of an altitude track by the slope of altitude over time.
///
/// For point `i` the regression runs over `window` samples starting at
/// `i - window / 2`, so for an even window the last sample is `i + radius - 1`.
/// The first and last `radius` points stay unclassified.
pub fn classify_terrain(
    track: &mut [ElevationPoint],
    window: usize,
    threshold: f64,
) -> Result<(), ClassifyError> {
    let radius = window / 2;
    let len = track.len();
    if len <= 2 * radius {
        return Err(ClassifyError::TrackTooShort {
            len,
            required: 2 * radius + 1,
        });
    }

    let times: Array1<f64> = track.iter().map(|p| p.time).collect();
    let altitudes: Array1<f64> = track.iter().map(|p| p.altitude()).collect();

    for idx in radius..len - radius {
        let start = idx - radius;
        let end = start + window;
        let slope = window_slope(times.slice(s![start..end]), altitudes.slice(s![start..end]))
            .ok_or(ClassifyError::DegenerateSlope { index: idx })?;

        track[idx].category = if slope > threshold {
            TerrainCategory::Ascending
        } else if slope < -threshold {
            TerrainCategory::Descending
        } else {
            TerrainCategory::Flat
        };
    }
    Ok(())
}

/// Ordinary least-squares slope of `y` against `x`; `None` when `x` has no spread.
pub fn window_slope(x: ArrayView1<f64>, y: ArrayView1<f64>) -> Option<f64> {
    let mean_x = x.mean()?;
    let mean_y = y.mean()?;
    let (numer, denom) = x
        .iter()
        .zip(y.iter())
        .fold((0.0, 0.0), |(numer, denom), (&xi, &yi)| {
            let dx = xi - mean_x;
            (numer + dx * (yi - mean_y), denom + dx * dx)
        });
    if denom == 0.0 {
        return None;
    }
    Some(numer / denom)
}
