//! Errand-stop and rolling-stop labelling on the speed track.

use crate::track::{KinematicPoint, StopCategory};

/// Label errand stops and rolling stops on a cleaned speed track.
///
/// Stationary points are errands when the next sample is more than
/// `errand_gap_s` away (or when there is no next sample), rolling stops
/// otherwise. Interior strict speed minima below `rolling_stop_max_speed` then
/// become rolling stops unless they are already errands.
pub fn classify_stops(track: &mut [KinematicPoint], errand_gap_s: f64, rolling_stop_max_speed: f64) {
    let len = track.len();
    for idx in 0..len {
        if track[idx].speed() != 0.0 {
            continue;
        }
        track[idx].category = if idx + 1 == len {
            StopCategory::ErrandStop
        } else if track[idx + 1].time - track[idx].time > errand_gap_s {
            StopCategory::ErrandStop
        } else {
            StopCategory::RollingStop
        };
    }

    let speeds: Vec<f64> = track.iter().map(|p| p.speed()).collect();
    for idx in local_minima(&speeds) {
        let point = &mut track[idx];
        if point.speed() < rolling_stop_max_speed && point.category != StopCategory::ErrandStop {
            point.category = StopCategory::RollingStop;
        }
    }
}

/// Indices strictly lower than both neighbours. Endpoints never qualify.
pub fn local_minima(values: &[f64]) -> Vec<usize> {
    values
        .windows(3)
        .enumerate()
        .filter(|(_, w)| w[1] < w[0] && w[1] < w[2])
        .map(|(i, _)| i + 1)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::{Kinematic, Point};

    fn track(samples: &[(f64, f64)]) -> Vec<KinematicPoint> {
        samples
            .iter()
            .map(|&(time, speed)| {
                Point::new(0.0, 0.0, time, Kinematic { speed, direction: 0.0 })
            })
            .collect()
    }

    fn categories(track: &[KinematicPoint]) -> Vec<StopCategory> {
        track.iter().map(|p| p.category).collect()
    }

    #[test]
    fn test_errand_after_long_gap_and_at_end() {
        let mut points = track(&[(0.0, 0.0), (130.0, 5.0), (132.0, 0.0)]);
        classify_stops(&mut points, 120.0, 12.0);
        assert_eq!(
            categories(&points),
            vec![
                StopCategory::ErrandStop,
                StopCategory::Unclassified,
                StopCategory::ErrandStop
            ]
        );
    }

    #[test]
    fn test_short_stop_is_rolling() {
        let mut points = track(&[(0.0, 20.0), (10.0, 0.0), (40.0, 20.0)]);
        classify_stops(&mut points, 120.0, 12.0);
        assert_eq!(points[1].category, StopCategory::RollingStop);
    }

    #[test]
    fn test_gap_of_exactly_threshold_is_rolling() {
        let mut points = track(&[(0.0, 0.0), (120.0, 8.0), (121.0, 30.0)]);
        classify_stops(&mut points, 120.0, 12.0);
        assert_eq!(points[0].category, StopCategory::RollingStop);
    }

    #[test]
    fn test_slow_local_minimum_is_rolling() {
        let mut points = track(&[(0.0, 30.0), (5.0, 8.0), (10.0, 30.0), (15.0, 20.0), (20.0, 40.0)]);
        classify_stops(&mut points, 120.0, 12.0);
        assert_eq!(
            categories(&points),
            vec![
                StopCategory::Unclassified,
                StopCategory::RollingStop,
                StopCategory::Unclassified,
                // minimum, but not below the threshold
                StopCategory::Unclassified,
                StopCategory::Unclassified
            ]
        );
    }

    #[test]
    fn test_minimum_never_overrides_errand() {
        let mut points = track(&[(0.0, 15.0), (10.0, 0.0), (500.0, 15.0)]);
        classify_stops(&mut points, 120.0, 12.0);
        assert_eq!(points[1].category, StopCategory::ErrandStop);
    }

    #[test]
    fn test_local_minima_excludes_endpoints() {
        assert_eq!(local_minima(&[1.0, 2.0, 3.0]), Vec::<usize>::new());
        assert_eq!(local_minima(&[3.0, 1.0, 3.0, 3.0, 2.0, 5.0]), vec![1, 4]);
        // plateaus are not strict minima
        assert_eq!(local_minima(&[3.0, 1.0, 1.0, 3.0]), Vec::<usize>::new());
        assert!(local_minima(&[]).is_empty());
    }
}
