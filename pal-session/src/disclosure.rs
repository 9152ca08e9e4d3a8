//! Per-answer citation disclosure state.
//!
//! Every assistant answer with at least one citation gets a collapsible
//! sources widget. States are independent of each other and keyed by an
//! identifier that is unique for the lifetime of the session.

use std::collections::HashMap;
use std::fmt;

/// Session-unique identifier of one disclosure widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DisclosureId(u64);

impl DisclosureId {
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for DisclosureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for DisclosureId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().trim_start_matches('#').parse().map(Self)
    }
}

/// Whether a widget shows its citation list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisclosureState {
    #[default]
    Collapsed,
    Expanded,
}

impl DisclosureState {
    pub const fn flipped(self) -> Self {
        match self {
            Self::Collapsed => Self::Expanded,
            Self::Expanded => Self::Collapsed,
        }
    }

    pub const fn is_expanded(self) -> bool {
        matches!(self, Self::Expanded)
    }
}

/// Registry of disclosure widgets for one session.
#[derive(Debug, Default)]
pub struct SourceDisclosure {
    next_id: u64,
    states: HashMap<DisclosureId, DisclosureState>,
}

impl SourceDisclosure {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new widget, collapsed.
    pub fn create(&mut self) -> DisclosureId {
        self.next_id += 1;
        let id = DisclosureId(self.next_id);
        self.states.insert(id, DisclosureState::Collapsed);
        id
    }

    /// Flip a widget between collapsed and expanded.
    ///
    /// Returns the new state, or `None` (and changes nothing) for an unknown id.
    pub fn toggle(&mut self, id: DisclosureId) -> Option<DisclosureState> {
        match self.states.get_mut(&id) {
            Some(state) => {
                *state = state.flipped();
                Some(*state)
            }
            None => {
                tracing::debug!(disclosure = %id, "Toggle for unknown disclosure ignored");
                None
            }
        }
    }

    pub fn state(&self, id: DisclosureId) -> Option<DisclosureState> {
        self.states.get(&id).copied()
    }

    pub fn is_expanded(&self, id: DisclosureId) -> bool {
        self.state(id).is_some_and(DisclosureState::is_expanded)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_defaults_to_collapsed() {
        let mut registry = SourceDisclosure::new();
        let id = registry.create();
        assert_eq!(registry.state(id), Some(DisclosureState::Collapsed));
        assert!(!registry.is_expanded(id));
    }

    #[test]
    fn ids_are_unique() {
        let mut registry = SourceDisclosure::new();
        let ids: Vec<DisclosureId> = (0..50).map(|_| registry.create()).collect();
        let mut deduped = ids.clone();
        deduped.sort();
        deduped.dedup();
        assert_eq!(deduped.len(), ids.len());
        assert_eq!(registry.len(), 50);
    }

    #[test]
    fn toggle_twice_restores_state() {
        let mut registry = SourceDisclosure::new();
        let id = registry.create();

        assert_eq!(registry.toggle(id), Some(DisclosureState::Expanded));
        assert!(registry.is_expanded(id));
        assert_eq!(registry.toggle(id), Some(DisclosureState::Collapsed));
        assert_eq!(registry.state(id), Some(DisclosureState::Collapsed));
    }

    #[test]
    fn toggles_are_independent() {
        let mut registry = SourceDisclosure::new();
        let first = registry.create();
        let second = registry.create();

        registry.toggle(first);
        assert!(registry.is_expanded(first));
        assert!(!registry.is_expanded(second));
    }

    #[test]
    fn unknown_id_is_noop() {
        let mut registry = SourceDisclosure::new();
        let known = registry.create();
        let unknown = DisclosureId(999);

        assert_eq!(registry.toggle(unknown), None);
        assert_eq!(registry.state(unknown), None);
        assert_eq!(registry.state(known), Some(DisclosureState::Collapsed));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn id_parses_with_or_without_hash() {
        assert_eq!("#3".parse::<DisclosureId>().unwrap(), DisclosureId(3));
        assert_eq!(" 7 ".parse::<DisclosureId>().unwrap(), DisclosureId(7));
        assert!("abc".parse::<DisclosureId>().is_err());
    }
}
