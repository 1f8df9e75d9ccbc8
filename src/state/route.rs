use serde::Deserialize;

use crate::error::{Error, Result};
use crate::state::segment::{SegmentDirection, TurnDirection};
use crate::state::world::{SportType, WorldId};

/// Role of an entry within the route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
pub enum SequenceType {
    #[default]
    Regular,
    LeadIn,
    LeadOut,
    LoopStart,
    Loop,
    LoopEnd,
}

impl SequenceType {
    pub fn is_loop(self) -> bool {
        matches!(self, Self::LoopStart | Self::Loop | Self::LoopEnd)
    }
}

/// One step of a planned route
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentSequenceEntry {
    pub segment_id: String,
    #[serde(default)]
    pub direction: SegmentDirection,
    #[serde(default)]
    pub next_segment_id: Option<String>,
    #[serde(default, alias = "turnToNextSegment")]
    pub turn_to_next: TurnDirection,
    #[serde(default, rename = "type")]
    pub sequence_type: SequenceType,
}

impl SegmentSequenceEntry {
    pub fn new(segment_id: impl Into<String>, direction: SegmentDirection) -> Self {
        Self {
            segment_id: segment_id.into(),
            direction,
            next_segment_id: None,
            turn_to_next: TurnDirection::None,
            sequence_type: SequenceType::Regular,
        }
    }

    pub fn then(mut self, turn: TurnDirection, next_segment_id: impl Into<String>) -> Self {
        self.turn_to_next = turn;
        self.next_segment_id = Some(next_segment_id.into());
        self
    }

    pub fn with_type(mut self, sequence_type: SequenceType) -> Self {
        self.sequence_type = sequence_type;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct Cursor {
    index: usize,
    started: bool,
    completed: bool,
    loop_count: u32,
}

/// Snapshot of route progress, shared with states and subscribers
#[derive(Debug, Clone, PartialEq)]
pub struct RouteProgress {
    pub name: String,
    pub step: usize,
    pub total_steps: usize,
    pub current_segment_id: Option<String>,
    pub current_direction: SegmentDirection,
    pub next_segment_id: Option<String>,
    pub turn_to_next: TurnDirection,
    pub loop_count: u32,
    pub has_started: bool,
    pub has_completed: bool,
    pub is_on_last_segment: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RouteRecord {
    #[serde(default)]
    name: String,
    #[serde(default)]
    world: WorldId,
    #[serde(default)]
    sport: SportType,
    #[serde(default)]
    number_of_loops: Option<u32>,
    route_sequence: Vec<SegmentSequenceEntry>,
}

impl TryFrom<RouteRecord> for PlannedRoute {
    type Error = Error;

    fn try_from(record: RouteRecord) -> Result<Self> {
        let mut route = PlannedRoute::new(record.name, record.world, record.sport, record.route_sequence)?;
        route.number_of_loops = record.number_of_loops;
        Ok(route)
    }
}

/// An ordered sequence of segments with a cursor tracking the rider
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "RouteRecord")]
pub struct PlannedRoute {
    pub name: String,
    pub world: WorldId,
    pub sport: SportType,
    sequence: Vec<SegmentSequenceEntry>,
    number_of_loops: Option<u32>,
    loop_start: Option<usize>,
    loop_end: Option<usize>,
    cursor: Cursor,
}

impl PlannedRoute {
    pub fn new(
        name: impl Into<String>,
        world: WorldId,
        sport: SportType,
        sequence: Vec<SegmentSequenceEntry>,
    ) -> Result<Self> {
        if sequence.is_empty() {
            return Err(Error::InvalidRoute("route has no segments".into()));
        }
        if let Some(i) = sequence.iter().position(|e| e.segment_id.is_empty()) {
            return Err(Error::InvalidRoute(format!("entry {i} has no segment id")));
        }

        let positions_of = |kind: SequenceType| -> Vec<usize> {
            sequence
                .iter()
                .enumerate()
                .filter(|(_, e)| e.sequence_type == kind)
                .map(|(i, _)| i)
                .collect()
        };
        let starts = positions_of(SequenceType::LoopStart);
        let ends = positions_of(SequenceType::LoopEnd);
        if starts.len() > 1 || ends.len() > 1 {
            return Err(Error::InvalidRoute("route has more than one loop".into()));
        }

        let loop_start = starts.first().copied();
        let loop_end = match (loop_start, ends.first().copied()) {
            (None, None) => None,
            (None, Some(_)) => {
                return Err(Error::InvalidRoute("loop end without loop start".into()));
            }
            (Some(start), Some(end)) if end < start => {
                return Err(Error::InvalidRoute("loop end precedes loop start".into()));
            }
            (Some(_), Some(end)) => Some(end),
            (Some(_), None) => sequence.iter().rposition(|e| e.sequence_type.is_loop()),
        };

        Ok(Self {
            name: name.into(),
            world,
            sport,
            sequence,
            number_of_loops: None,
            loop_start,
            loop_end,
            cursor: Cursor::default(),
        })
    }

    /// Limit how many times the loop is ridden
    pub fn with_number_of_loops(mut self, loops: u32) -> Self {
        self.number_of_loops = Some(loops);
        self
    }

    pub fn sequence(&self) -> &[SegmentSequenceEntry] {
        &self.sequence
    }

    pub fn starting_segment_id(&self) -> &str {
        &self.sequence[0].segment_id
    }

    pub fn has_started(&self) -> bool {
        self.cursor.started
    }

    pub fn has_completed(&self) -> bool {
        self.cursor.completed
    }

    pub fn is_loop(&self) -> bool {
        self.loop_start.is_some()
    }

    pub fn loop_count(&self) -> u32 {
        self.cursor.loop_count
    }

    pub fn segment_sequence_index(&self) -> usize {
        self.cursor.index
    }

    pub fn current_entry(&self) -> Option<&SegmentSequenceEntry> {
        self.cursor.started.then(|| &self.sequence[self.cursor.index])
    }

    pub fn next_entry(&self) -> Option<&SegmentSequenceEntry> {
        self.next_index().map(|i| &self.sequence[i])
    }

    pub fn current_segment_id(&self) -> Option<&str> {
        self.current_entry().map(|e| e.segment_id.as_str())
    }

    pub fn next_segment_id(&self) -> Option<&str> {
        self.next_entry().map(|e| e.segment_id.as_str())
    }

    pub fn turn_to_next_segment(&self) -> TurnDirection {
        self.current_entry().map(|e| e.turn_to_next).unwrap_or_default()
    }

    pub fn is_on_last_segment(&self) -> bool {
        self.cursor.started && !self.cursor.completed && self.next_index().is_none()
    }

    fn loops_remaining(&self) -> bool {
        match self.number_of_loops {
            None => true,
            Some(loops) => self.cursor.loop_count + 1 < loops,
        }
    }

    fn next_index(&self) -> Option<usize> {
        if !self.cursor.started || self.cursor.completed {
            return None;
        }
        let index = self.cursor.index;
        if Some(index) == self.loop_end && self.loops_remaining() {
            return self.loop_start;
        }
        (index + 1 < self.sequence.len()).then_some(index + 1)
    }

    /// Move the cursor onto segment `segment_id`
    ///
    /// Only the starting segment (before the route started) or the next
    /// segment (after) is accepted. On failure the cursor is unchanged.
    pub fn entered_segment(&mut self, segment_id: &str) -> Result<()> {
        if self.cursor.completed {
            return Err(Error::RouteCompleted);
        }

        if !self.cursor.started {
            if segment_id != self.starting_segment_id() {
                return Err(Error::UnexpectedSegment {
                    expected: Some(self.starting_segment_id().to_string()),
                    actual: segment_id.to_string(),
                });
            }
            self.cursor.started = true;
            self.cursor.index = 0;
            return Ok(());
        }

        let next = self.next_index();
        match next {
            Some(next) if self.sequence[next].segment_id == segment_id => {
                if next <= self.cursor.index {
                    self.cursor.loop_count += 1;
                }
                self.cursor.index = next;
                Ok(())
            }
            _ => Err(Error::UnexpectedSegment {
                expected: next.map(|i| self.sequence[i].segment_id.clone()),
                actual: segment_id.to_string(),
            }),
        }
    }

    pub fn complete(&mut self) {
        if self.cursor.started {
            self.cursor.completed = true;
        }
    }

    /// Rewind to the unstarted state
    pub fn reset(&mut self) {
        self.cursor = Cursor::default();
    }

    pub fn progress(&self) -> RouteProgress {
        RouteProgress {
            name: self.name.clone(),
            step: self.cursor.index,
            total_steps: self.sequence.len(),
            current_segment_id: self.current_segment_id().map(str::to_string),
            current_direction: self.current_entry().map(|e| e.direction).unwrap_or_default(),
            next_segment_id: self.next_segment_id().map(str::to_string),
            turn_to_next: self.turn_to_next_segment(),
            loop_count: self.cursor.loop_count,
            has_started: self.cursor.started,
            has_completed: self.cursor.completed,
            is_on_last_segment: self.is_on_last_segment(),
        }
    }
}
