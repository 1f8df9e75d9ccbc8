//! Junction turn reconciliation
//!
//! The game announces the turns available at the upcoming junction one at a
//! time. Once the number of distinct announcements matches the number of
//! edges the segment graph has at that end, the junction layout is known.
//!
//! Some three-way junctions only ever announce two directions. When two
//! directions have been seen and the graph says there are three edges, the
//! full left/straight/right set is assumed.

use crate::state::segment::TurnDirection;

bitflags::bitflags! {
    /// Set of turn directions
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TurnDirections: u8 {
        const LEFT = 0b001;
        const GO_STRAIGHT = 0b010;
        const RIGHT = 0b100;
    }
}

impl TurnDirections {
    pub fn count(self) -> usize {
        self.bits().count_ones() as usize
    }

    pub fn has(self, direction: TurnDirection) -> bool {
        !Self::from(direction).is_empty() && self.contains(Self::from(direction))
    }

    pub fn directions(self) -> impl Iterator<Item = TurnDirection> {
        [TurnDirection::Left, TurnDirection::GoStraight, TurnDirection::Right]
            .into_iter()
            .filter(move |d| self.has(*d))
    }
}

impl From<TurnDirection> for TurnDirections {
    fn from(direction: TurnDirection) -> Self {
        match direction {
            TurnDirection::Left => Self::LEFT,
            TurnDirection::GoStraight => Self::GO_STRAIGHT,
            TurnDirection::Right => Self::RIGHT,
            TurnDirection::None => Self::empty(),
        }
    }
}

impl FromIterator<TurnDirection> for TurnDirections {
    fn from_iter<I: IntoIterator<Item = TurnDirection>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), |set, d| set | Self::from(d))
    }
}

impl std::fmt::Display for TurnDirections {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self.directions().map(|d| d.to_string()).collect();
        write!(f, "[{}]", names.join(", "))
    }
}

/// Accumulates turn announcements for one junction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TurnReconciler {
    observed: TurnDirections,
}

impl TurnReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observed(&self) -> TurnDirections {
        self.observed
    }

    /// Record an announced direction
    pub fn observe(self, direction: TurnDirection) -> Self {
        Self { observed: self.observed | TurnDirections::from(direction) }
    }

    /// The full direction set once the junction with `edge_count` exits is known
    pub fn resolve(&self, edge_count: usize) -> Option<TurnDirections> {
        let seen = self.observed.count();
        if edge_count >= 2 && seen == edge_count {
            Some(self.observed)
        } else if edge_count == 3 && seen == 2 {
            Some(TurnDirections::all())
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_way_junction_resolves_exactly() {
        let reconciler = TurnReconciler::new()
            .observe(TurnDirection::Left)
            .observe(TurnDirection::GoStraight);

        assert_eq!(
            reconciler.resolve(2),
            Some(TurnDirections::LEFT | TurnDirections::GO_STRAIGHT)
        );
    }

    #[test]
    fn test_three_way_junction_under_reported() {
        let reconciler = TurnReconciler::new()
            .observe(TurnDirection::Left)
            .observe(TurnDirection::GoStraight);

        assert_eq!(reconciler.resolve(3), Some(TurnDirections::all()));
    }

    #[test]
    fn test_waits_for_more_directions() {
        let reconciler = TurnReconciler::new().observe(TurnDirection::Right);
        assert_eq!(reconciler.resolve(2), None);
        assert_eq!(reconciler.resolve(3), None);
    }

    #[test]
    fn test_single_edge_is_not_a_junction() {
        let reconciler = TurnReconciler::new().observe(TurnDirection::GoStraight);
        assert_eq!(reconciler.resolve(1), None);
    }

    #[test]
    fn test_duplicates_do_not_count() {
        let reconciler = TurnReconciler::new()
            .observe(TurnDirection::Left)
            .observe(TurnDirection::Left)
            .observe(TurnDirection::None);
        assert_eq!(reconciler.observed().count(), 1);
        assert_eq!(reconciler.resolve(2), None);
    }

    #[test]
    fn test_directions_iterate_in_order() {
        let set: TurnDirections = [TurnDirection::Right, TurnDirection::Left].into_iter().collect();
        let dirs: Vec<_> = set.directions().collect();
        assert_eq!(dirs, vec![TurnDirection::Left, TurnDirection::Right]);
        assert!(set.has(TurnDirection::Left));
        assert!(!set.has(TurnDirection::GoStraight));
        assert!(!set.has(TurnDirection::None));
        assert_eq!(set.to_string(), "[left, right]");
    }
}
