use serde::{Deserialize, Serialize};

use crate::state::track_point::TrackPoint;
use crate::state::world::{SportType, WorldId};

/// Direction the game can turn the rider at a junction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TurnDirection {
    #[default]
    None,
    Left,
    #[serde(alias = "Straight")]
    GoStraight,
    Right,
}

impl TurnDirection {
    /// Map a command type announced by the game to a turn
    ///
    /// Matching ignores case, spaces, dashes and underscores so that
    /// `TURN LEFT`, `turn_left` and `turnleft` are the same command.
    pub fn from_command_type(command_type: &str) -> Option<Self> {
        let normalized: String = command_type
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match normalized.as_str() {
            "turnleft" | "left" => Some(Self::Left),
            "turnright" | "right" => Some(Self::Right),
            "gostraight" | "straight" => Some(Self::GoStraight),
            _ => None,
        }
    }

    pub fn wire_code(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Left => 1,
            Self::GoStraight => 2,
            Self::Right => 3,
        }
    }

    pub fn from_wire_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Left),
            2 => Some(Self::GoStraight),
            3 => Some(Self::Right),
            _ => None,
        }
    }
}

impl std::fmt::Display for TurnDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::None => "none",
            Self::Left => "left",
            Self::GoStraight => "straight",
            Self::Right => "right",
        };
        f.write_str(s)
    }
}

/// An edge of the junction graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Turn {
    pub direction: TurnDirection,
    pub segment_id: String,
}

impl Turn {
    pub fn new(direction: TurnDirection, segment_id: impl Into<String>) -> Self {
        Self { direction, segment_id: segment_id.into() }
    }
}

/// Direction of travel along a segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SegmentDirection {
    #[default]
    Unknown,
    AtoB,
    BtoA,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SegmentType {
    #[default]
    Segment,
    Climb,
    Sprint,
    StartingPoint,
}

/// Segment as stored in the segment database
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SegmentRecord {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default, rename = "type")]
    segment_type: SegmentType,
    #[serde(default)]
    sport: SportType,
    #[serde(default)]
    world: WorldId,
    points: Vec<TrackPoint>,
    #[serde(default, alias = "nextSegmentsNodeA")]
    next_at_start: Vec<Turn>,
    #[serde(default, alias = "nextSegmentsNodeB")]
    next_at_end: Vec<Turn>,
}

/// A stretch of road between two junction ends, A (first point) and B (last point)
#[derive(Debug, Clone, Deserialize)]
#[serde(from = "SegmentRecord")]
pub struct Segment {
    pub id: String,
    pub name: String,
    pub segment_type: SegmentType,
    pub sport: SportType,
    pub world: WorldId,
    points: Vec<TrackPoint>,
    pub distance: f64,
    pub ascent: f64,
    pub descent: f64,
    /// Edges leaving from end A, taken when riding B to A
    pub next_at_start: Vec<Turn>,
    /// Edges leaving from end B, taken when riding A to B
    pub next_at_end: Vec<Turn>,
}

impl From<SegmentRecord> for Segment {
    fn from(record: SegmentRecord) -> Self {
        let mut segment = Segment::new(record.id, record.points)
            .with_world(record.world)
            .with_sport(record.sport)
            .with_type(record.segment_type)
            .with_next_at_start(record.next_at_start)
            .with_next_at_end(record.next_at_end);
        if !record.name.is_empty() {
            segment.name = record.name;
        }
        segment
    }
}

impl Segment {
    /// Build a segment and compute the per-point derived fields
    pub fn new(id: impl Into<String>, points: Vec<TrackPoint>) -> Self {
        let mut points = points;
        let mut distance = 0.0;
        let mut ascent = 0.0;
        let mut descent = 0.0;

        for i in 0..points.len() {
            let from_previous = if i == 0 {
                0.0
            } else {
                let climb = points[i].altitude - points[i - 1].altitude;
                if climb > 0.0 {
                    ascent += climb;
                } else {
                    descent -= climb;
                }
                points[i - 1].distance_to(&points[i])
            };
            distance += from_previous;

            let point = &mut points[i];
            point.index = Some(i);
            point.distance_from_previous = from_previous;
            point.distance_along_segment = distance;
        }

        let id = id.into();
        Self {
            name: id.clone(),
            id,
            segment_type: SegmentType::Segment,
            sport: SportType::Unknown,
            world: WorldId::Unknown,
            points,
            distance,
            ascent,
            descent,
            next_at_start: Vec::new(),
            next_at_end: Vec::new(),
        }
    }

    pub fn with_world(mut self, world: WorldId) -> Self {
        self.world = world;
        for point in &mut self.points {
            point.world = world;
        }
        self
    }

    pub fn with_sport(mut self, sport: SportType) -> Self {
        self.sport = sport;
        self
    }

    pub fn with_type(mut self, segment_type: SegmentType) -> Self {
        self.segment_type = segment_type;
        self
    }

    pub fn with_next_at_start(mut self, turns: Vec<Turn>) -> Self {
        self.next_at_start = turns;
        self
    }

    pub fn with_next_at_end(mut self, turns: Vec<Turn>) -> Self {
        self.next_at_end = turns;
        self
    }

    pub fn points(&self) -> &[TrackPoint] {
        &self.points
    }

    pub fn start(&self) -> Option<&TrackPoint> {
        self.points.first()
    }

    pub fn end(&self) -> Option<&TrackPoint> {
        self.points.last()
    }

    pub fn contains(&self, point: &TrackPoint) -> bool {
        self.find(point).is_some()
    }

    /// First member point that is fuzzy-equal to `point`
    pub fn find(&self, point: &TrackPoint) -> Option<&TrackPoint> {
        self.points.iter().find(|p| p.is_close_to(point))
    }

    /// Closest fuzzy-equal member point and its distance
    pub fn closest_point(&self, point: &TrackPoint) -> Option<(&TrackPoint, f64)> {
        self.points
            .iter()
            .filter(|p| p.is_close_to(point))
            .map(|p| (p, p.distance_to(point)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }

    /// Direction of travel going from member `from` to member `to`
    pub fn direction_of(&self, from: &TrackPoint, to: &TrackPoint) -> SegmentDirection {
        match (from.index, to.index) {
            (Some(a), Some(b)) if b > a => SegmentDirection::AtoB,
            (Some(a), Some(b)) if b < a => SegmentDirection::BtoA,
            _ => SegmentDirection::Unknown,
        }
    }

    /// Edges reachable at the end the rider is travelling towards
    pub fn next_segments(&self, direction: SegmentDirection) -> &[Turn] {
        match direction {
            SegmentDirection::AtoB => &self.next_at_end,
            SegmentDirection::BtoA => &self.next_at_start,
            SegmentDirection::Unknown => &[],
        }
    }
}

impl PartialEq for Segment {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(n: usize, lat0: f64, alt_step: f64) -> Vec<TrackPoint> {
        (0..n)
            .map(|i| TrackPoint::new(lat0 - i as f64 * 0.0001, 166.95, i as f64 * alt_step, WorldId::Unknown))
            .collect()
    }

    #[test]
    fn test_derived_fields() {
        let segment = Segment::new("seg-1", line(4, -11.64, 1.0)).with_world(WorldId::Watopia);

        assert_eq!(segment.points()[2].index, Some(2));
        assert_eq!(segment.points()[0].distance_along_segment, 0.0);
        assert!((segment.distance - 3.0 * 11.12).abs() < 0.5, "distance {}", segment.distance);
        assert_eq!(segment.ascent, 3.0);
        assert_eq!(segment.descent, 0.0);
        assert!(segment.points().iter().all(|p| p.world == WorldId::Watopia));
    }

    #[test]
    fn test_contains_and_find() {
        let segment = Segment::new("seg-1", line(4, -11.64, 0.0));
        let probe = TrackPoint::new(-11.64021, 166.95, 0.0, WorldId::Unknown);

        assert!(segment.contains(&probe));
        let closest = segment.closest_point(&probe).unwrap().0;
        assert_eq!(closest.index, Some(2));

        let far = TrackPoint::new(-11.65, 166.95, 0.0, WorldId::Unknown);
        assert!(!segment.contains(&far));
        assert!(segment.closest_point(&far).is_none());
    }

    #[test]
    fn test_direction_of() {
        let segment = Segment::new("seg-1", line(4, -11.64, 0.0));
        let p = segment.points();

        assert_eq!(segment.direction_of(&p[0], &p[2]), SegmentDirection::AtoB);
        assert_eq!(segment.direction_of(&p[3], &p[1]), SegmentDirection::BtoA);
        assert_eq!(segment.direction_of(&p[1], &p[1]), SegmentDirection::Unknown);
    }

    #[test]
    fn test_next_segments_by_direction() {
        let segment = Segment::new("seg-1", line(2, -11.64, 0.0))
            .with_next_at_start(vec![Turn::new(TurnDirection::Left, "seg-0")])
            .with_next_at_end(vec![
                Turn::new(TurnDirection::Left, "seg-2"),
                Turn::new(TurnDirection::Right, "seg-3"),
            ]);

        assert_eq!(segment.next_segments(SegmentDirection::AtoB).len(), 2);
        assert_eq!(segment.next_segments(SegmentDirection::BtoA)[0].segment_id, "seg-0");
        assert!(segment.next_segments(SegmentDirection::Unknown).is_empty());
    }

    #[test]
    fn test_command_type_parsing() {
        assert_eq!(TurnDirection::from_command_type("TURN LEFT"), Some(TurnDirection::Left));
        assert_eq!(TurnDirection::from_command_type("turn_right"), Some(TurnDirection::Right));
        assert_eq!(TurnDirection::from_command_type("GoStraight"), Some(TurnDirection::GoStraight));
        assert_eq!(TurnDirection::from_command_type("RIDE ON"), None);
    }

    #[test]
    fn test_deserialize_record() {
        let json = r#"{
            "id": "watopia-beach-001",
            "name": "Beach road",
            "type": "Climb",
            "sport": "cycling",
            "world": "watopia",
            "points": [
                {"lat": -11.64, "lon": 166.95, "altitude": 1.0},
                {"lat": -11.6401, "lon": 166.95, "altitude": 3.0}
            ],
            "nextSegmentsNodeB": [{"direction": "Straight", "segmentId": "watopia-beach-002"}]
        }"#;

        let segment: Segment = serde_json::from_str(json).unwrap();
        assert_eq!(segment.name, "Beach road");
        assert_eq!(segment.segment_type, SegmentType::Climb);
        assert_eq!(segment.sport, SportType::Cycling);
        assert_eq!(segment.ascent, 2.0);
        assert_eq!(segment.next_at_end[0].direction, TurnDirection::GoStraight);
        assert_eq!(segment.points()[1].world, WorldId::Watopia);
    }
}
