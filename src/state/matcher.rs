//! Nearest segment matching
//!
//! Road geometry overlaps on bridges, underpasses and parallel roads, so the
//! nearest point by distance alone is not enough. A closer point only wins
//! when its altitude agrees with the reference altitude (usually the altitude
//! of the rider's previous match).

use std::sync::Arc;

use crate::state::segment::Segment;
use crate::state::track_point::{TrackPoint, ALTITUDE_TOLERANCE};

/// Find the segment and member point closest to `position`
///
/// Returns `None` when no candidate has a point fuzzy-equal to `position`,
/// which means the rider is not on any known segment.
pub fn find_closest<'a>(
    candidates: &'a [Arc<Segment>],
    position: &TrackPoint,
    reference_altitude: Option<f64>,
) -> Option<(&'a Arc<Segment>, &'a TrackPoint)> {
    let altitude_ok = |point: &TrackPoint| {
        reference_altitude.map_or(true, |reference| {
            (point.altitude - reference).abs() <= ALTITUDE_TOLERANCE
        })
    };

    let mut best: Option<(&'a Arc<Segment>, &'a TrackPoint, f64, bool)> = None;

    for segment in candidates {
        let Some((point, distance)) = segment.closest_point(position) else {
            continue;
        };
        let point_ok = altitude_ok(point);

        let replace = match best {
            None => true,
            Some((_, _, best_distance, best_ok)) => {
                if point_ok != best_ok {
                    point_ok
                } else {
                    distance < best_distance
                }
            }
        };

        if replace {
            best = Some((segment, point, distance, point_ok));
        }
    }

    best.map(|(segment, point, _, _)| (segment, point))
}
