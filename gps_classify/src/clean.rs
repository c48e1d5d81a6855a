//! Track cleaning ahead of classification.

use serde::{Deserialize, Serialize};

use crate::track::{ElevationPoint, KinematicPoint};

/// What `clean_altitude` does with adjacent-difference spikes.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum AltitudeFilter {
    /// Return the track unchanged. The spike decision is still evaluated and
    /// logged, matching the historical output of the tool.
    #[default]
    Passthrough,
    /// Drop every point whose successor differs by at least the spike
    /// threshold. The final point has no successor and is dropped too.
    DropSpikes,
}

/// Collapse runs of identical quantized speed to their first point.
pub fn clean_speed(mut track: Vec<KinematicPoint>) -> Vec<KinematicPoint> {
    // dedup_by hands (later, earlier) and keeps the earlier one
    track.dedup_by(|later, earlier| later.speed() == earlier.speed());
    track
}

pub fn clean_altitude(
    track: Vec<ElevationPoint>,
    policy: AltitudeFilter,
    spike_threshold: f64,
) -> Vec<ElevationPoint> {
    let keep: Vec<bool> = track
        .windows(2)
        .map(|w| (w[0].altitude() - w[1].altitude()).abs() < spike_threshold)
        .collect();
    let spikes = keep.iter().filter(|k| !**k).count();

    match policy {
        AltitudeFilter::Passthrough => {
            tracing::debug!(
                "altitude passthrough: {} spike(s) >= {} left in place",
                spikes,
                spike_threshold
            );
            track
        }
        AltitudeFilter::DropSpikes => {
            let before = track.len();
            let cleaned: Vec<ElevationPoint> = track
                .into_iter()
                .zip(keep)
                .filter_map(|(point, keep)| keep.then_some(point))
                .collect();
            tracing::debug!("altitude filter kept {} of {} points", cleaned.len(), before);
            cleaned
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::{Elevation, Kinematic, Point};

    fn speed_track(samples: &[(f64, f64)]) -> Vec<KinematicPoint> {
        samples
            .iter()
            .map(|&(time, speed)| {
                Point::new(0.0, 0.0, time, Kinematic { speed, direction: 0.0 })
            })
            .collect()
    }

    fn altitude_track(altitudes: &[f64]) -> Vec<ElevationPoint> {
        altitudes
            .iter()
            .enumerate()
            .map(|(i, &altitude)| Point::new(0.0, 0.0, i as f64, Elevation { altitude }))
            .collect()
    }

    #[test]
    fn test_clean_speed_keeps_first_of_run() {
        let track = speed_track(&[(0.0, 0.0), (1.0, 0.0), (130.0, 5.0), (131.0, 5.0), (132.0, 0.0)]);
        let cleaned = clean_speed(track);
        let pairs: Vec<(f64, f64)> = cleaned.iter().map(|p| (p.time, p.speed())).collect();
        assert_eq!(pairs, vec![(0.0, 0.0), (130.0, 5.0), (132.0, 0.0)]);
    }

    #[test]
    fn test_clean_speed_idempotent() {
        let track = speed_track(&[(0.0, 3.0), (1.0, 3.0), (2.0, 4.0), (3.0, 3.0), (4.0, 3.0)]);
        let once = clean_speed(track);
        let twice = clean_speed(once.clone());
        assert_eq!(once, twice);
        assert!(twice.windows(2).all(|w| w[0].speed() != w[1].speed()));
    }

    #[test]
    fn test_clean_speed_empty() {
        assert!(clean_speed(Vec::new()).is_empty());
    }

    #[test]
    fn test_clean_altitude_passthrough_keeps_spikes() {
        let track = altitude_track(&[100.0, 101.0, 120.0, 101.5, 102.0]);
        let cleaned = clean_altitude(track.clone(), AltitudeFilter::Passthrough, 5.0);
        assert_eq!(cleaned, track);
    }

    #[test]
    fn test_clean_altitude_drop_spikes() {
        let track = altitude_track(&[100.0, 101.0, 120.0, 101.5, 102.0]);
        let cleaned = clean_altitude(track, AltitudeFilter::DropSpikes, 5.0);
        let alts: Vec<f64> = cleaned.iter().map(|p| p.altitude()).collect();
        // 101 -> 120 and 120 -> 101.5 are spikes; 102 has no successor
        assert_eq!(alts, vec![100.0, 101.5]);
    }

    #[test]
    fn test_clean_altitude_threshold_is_exclusive() {
        let track = altitude_track(&[10.0, 15.0, 15.5]);
        let cleaned = clean_altitude(track, AltitudeFilter::DropSpikes, 5.0);
        let alts: Vec<f64> = cleaned.iter().map(|p| p.altitude()).collect();
        assert_eq!(alts, vec![15.0]);
    }
}
