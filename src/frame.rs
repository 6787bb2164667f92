//! Names and name frames
//!
//! A `NameFrame` is a bidirectional name <-> slot mapping for one nesting
//! level. Both directions are kept in insertion order so dumps and binding
//! listings come out the same way every run.

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::{ConflictKind, DimResult};
use crate::slot::Slot;

/// A symbolic axis name. Cloning is cheap.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Name(Arc<str>);

impl Name {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for Name {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Name {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Name {
    fn from(s: &str) -> Self {
        Name(Arc::from(s))
    }
}

impl From<String> for Name {
    fn from(s: String) -> Self {
        Name(Arc::from(s))
    }
}

impl From<&String> for Name {
    fn from(s: &String) -> Self {
        Name(Arc::from(s.as_str()))
    }
}

impl From<&Name> for Name {
    fn from(name: &Name) -> Self {
        name.clone()
    }
}

/// Bidirectional name <-> slot mapping for one scope
#[derive(Debug, Clone, Default)]
pub struct NameFrame {
    name_to_slot: IndexMap<Name, Slot>,
    slot_to_name: IndexMap<Slot, Name>,
}

impl NameFrame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert both directions.
    ///
    /// Rebinding an existing pair is a no-op; binding either side to
    /// something else is a conflict and leaves the frame untouched.
    pub fn bind(&mut self, name: Name, slot: Slot) -> DimResult<()> {
        if let Some(&existing) = self.name_to_slot.get(&name) {
            if existing == slot {
                return Ok(());
            }
            return Err(ConflictKind::NameBound {
                name,
                existing,
                requested: slot,
            }
            .into());
        }
        if let Some(existing) = self.slot_to_name.get(&slot) {
            return Err(ConflictKind::SlotBound {
                slot,
                existing: existing.clone(),
                requested: name,
            }
            .into());
        }

        self.slot_to_name.insert(slot, name.clone());
        self.name_to_slot.insert(name, slot);
        Ok(())
    }

    pub fn lookup_by_name(&self, name: &str) -> Option<Slot> {
        self.name_to_slot.get(name).copied()
    }

    pub fn lookup_by_slot(&self, slot: Slot) -> Option<&Name> {
        self.slot_to_name.get(&slot)
    }

    /// Remove both directions. Returns the slot that was bound, if any.
    pub fn unbind(&mut self, name: &str) -> Option<Slot> {
        let slot = self.name_to_slot.shift_remove(name)?;
        self.slot_to_name.shift_remove(&slot);
        Some(slot)
    }

    /// All bindings in insertion order
    pub fn all_bindings(&self) -> impl Iterator<Item = (&Name, Slot)> + '_ {
        self.name_to_slot.iter().map(|(name, &slot)| (name, slot))
    }

    /// Empty the frame, handing back what was bound
    pub fn drain(&mut self) -> Vec<(Name, Slot)> {
        self.slot_to_name.clear();
        self.name_to_slot.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.name_to_slot.len()
    }

    pub fn is_empty(&self) -> bool {
        self.name_to_slot.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DimError;

    fn slot(m: usize) -> Slot {
        Slot::from_magnitude(m)
    }

    #[test]
    fn test_bind_and_lookup() {
        let mut frame = NameFrame::new();
        frame.bind(Name::from("x"), slot(5)).unwrap();
        frame.bind(Name::from("y"), slot(6)).unwrap();

        assert_eq!(frame.lookup_by_name("x"), Some(slot(5)));
        assert_eq!(frame.lookup_by_slot(slot(6)).map(Name::as_str), Some("y"));
        assert_eq!(frame.lookup_by_name("z"), None);
        assert_eq!(frame.len(), 2);

        // Same pair again is fine
        frame.bind(Name::from("x"), slot(5)).unwrap();
        assert_eq!(frame.len(), 2);
    }

    #[test]
    fn test_bind_conflicts() {
        let mut frame = NameFrame::new();
        frame.bind(Name::from("x"), slot(5)).unwrap();

        let err = frame.bind(Name::from("x"), slot(6)).unwrap_err();
        assert!(matches!(
            err,
            DimError::Conflict(ConflictKind::NameBound { .. })
        ));

        let err = frame.bind(Name::from("y"), slot(5)).unwrap_err();
        assert!(matches!(
            err,
            DimError::Conflict(ConflictKind::SlotBound { .. })
        ));

        // Neither failure left anything behind
        assert_eq!(frame.len(), 1);
        assert_eq!(frame.lookup_by_slot(slot(6)), None);
        assert_eq!(frame.lookup_by_name("y"), None);
    }

    #[test]
    fn test_unbind_is_idempotent() {
        let mut frame = NameFrame::new();
        frame.bind(Name::from("x"), slot(5)).unwrap();
        assert_eq!(frame.unbind("x"), Some(slot(5)));
        assert_eq!(frame.unbind("x"), None);
        assert!(frame.is_empty());
        assert_eq!(frame.lookup_by_slot(slot(5)), None);

        // The slot is free again
        frame.bind(Name::from("y"), slot(5)).unwrap();
    }

    #[test]
    fn test_bindings_and_drain() {
        let mut frame = NameFrame::new();
        for (i, name) in ["a", "b", "c"].iter().enumerate() {
            frame.bind(Name::from(*name), slot(i + 5)).unwrap();
        }
        let names: Vec<&str> = frame.all_bindings().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);

        let drained = frame.drain();
        assert_eq!(drained.len(), 3);
        assert!(frame.is_empty());
        assert_eq!(frame.lookup_by_slot(slot(5)), None);
    }
}
