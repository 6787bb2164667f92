//! Scope stack and name resolution
//!
//! The stack holds one `NameFrame` per entered scope, innermost last, on top
//! of a root frame that is never popped. A separate persistent frame holds
//! GLOBAL and VISIBLE names.
//!
//! LOCAL names resolve against a bounded window: the innermost frame plus the
//! `history` frames directly beneath it, where `history` is the value the
//! innermost scope was entered with. Keeping resolution inside that window is
//! what keeps shapes independent of how many names were ever introduced.
//!
//! Slots are unique across the whole context. `owners` maps every bound slot
//! to the frame holding it, which makes reverse lookup O(1) and lets fresh
//! allocation skip slots held by frames outside the window.

use std::collections::HashMap;

use tracing::{debug, trace};

use crate::error::{ConflictKind, DimError, DimResult};
use crate::frame::{Name, NameFrame};
use crate::slot::{DimType, Slot, SlotRange};

/// Identifies a frame for the lifetime of a context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(u64);

impl FrameId {
    /// The frame holding GLOBAL and VISIBLE names
    pub const PERSISTENT: FrameId = FrameId(0);

    /// The bottom LOCAL frame, present even when no scope is entered
    pub const ROOT: FrameId = FrameId(1);

    pub fn get(self) -> u64 {
        self.0
    }
}

/// A stack entry
#[derive(Debug, Clone)]
struct StackFrame {
    id: FrameId,

    /// Enclosing frames visible from this one
    history: usize,

    /// Nesting depth at the time the frame was pushed
    depth: usize,

    names: NameFrame,
}

/// Read-only summary of a stack frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInfo {
    pub id: FrameId,
    pub depth: usize,
    pub history: usize,
    pub bindings: usize,
}

/// Outcome of resolving one name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub slot: Slot,

    /// Frame that holds the binding
    pub frame: FrameId,

    /// Whether the binding was created by this resolution
    pub fresh: bool,
}

/// Ordered stack of name frames plus the persistent frame
#[derive(Debug, Clone)]
pub struct ScopeStack {
    frames: Vec<StackFrame>,
    persistent: NameFrame,
    owners: HashMap<Slot, FrameId>,
    next_id: u64,
}

impl Default for ScopeStack {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeStack {
    pub fn new() -> Self {
        ScopeStack {
            frames: vec![Self::root_frame()],
            persistent: NameFrame::new(),
            owners: HashMap::new(),
            next_id: FrameId::ROOT.0 + 1,
        }
    }

    fn root_frame() -> StackFrame {
        StackFrame {
            id: FrameId::ROOT,
            history: 0,
            depth: 0,
            names: NameFrame::new(),
        }
    }

    /// Push a new empty frame and return its id
    pub fn push(&mut self, history: usize) -> FrameId {
        let id = FrameId(self.next_id);
        self.next_id += 1;
        let depth = self.frames.len();
        self.frames.push(StackFrame {
            id,
            history,
            depth,
            names: NameFrame::new(),
        });
        debug!(frame = id.0, depth, history, "pushed scope frame");
        id
    }

    /// Remove a frame and release every binding it holds.
    ///
    /// Returns `None` if the frame is not on the stack (already removed, or
    /// the root frame, which only `clear` discards).
    pub fn remove(&mut self, id: FrameId) -> Option<Vec<(Name, Slot)>> {
        if id == FrameId::ROOT {
            return None;
        }
        let position = self.frames.iter().rposition(|frame| frame.id == id)?;
        if position + 1 != self.frames.len() {
            trace!(
                frame = id.0,
                above = self.frames.len() - position - 1,
                "removing a frame below the innermost"
            );
        }

        let mut frame = self.frames.remove(position);
        let released = frame.names.drain();
        for (name, slot) in &released {
            self.owners.remove(slot);
            trace!(name = %name, slot = slot.get(), frame = id.0, "released local binding");
        }
        debug!(
            frame = id.0,
            depth = frame.depth,
            released = released.len(),
            "removed scope frame"
        );
        Some(released)
    }

    /// Drop every frame and binding, leaving an empty root frame
    pub fn clear(&mut self) {
        self.frames.clear();
        self.frames.push(Self::root_frame());
        self.persistent.drain();
        self.owners.clear();
    }

    fn innermost(&self) -> &StackFrame {
        &self.frames[self.frames.len() - 1]
    }

    /// Id of the frame new LOCAL bindings land in
    pub fn innermost_id(&self) -> FrameId {
        self.innermost().id
    }

    /// Number of entered scopes (the root frame does not count)
    pub fn depth(&self) -> usize {
        self.frames.len() - 1
    }

    pub fn contains(&self, id: FrameId) -> bool {
        id == FrameId::PERSISTENT || self.frames.iter().any(|frame| frame.id == id)
    }

    /// Frames visible from the innermost frame, innermost first
    fn window(&self) -> impl Iterator<Item = &StackFrame> + '_ {
        let span = self.innermost().history.saturating_add(1);
        self.frames.iter().rev().take(span)
    }

    /// Resolve a name against the LOCAL window only
    pub fn lookup_window(&self, name: &str) -> Option<(Slot, FrameId)> {
        self.window()
            .find_map(|frame| frame.names.lookup_by_name(name).map(|slot| (slot, frame.id)))
    }

    /// Resolve a name the way a LOCAL request sees it: window, then persistent
    pub fn lookup(&self, name: &str) -> Option<(Slot, FrameId)> {
        self.lookup_window(name).or_else(|| {
            self.persistent
                .lookup_by_name(name)
                .map(|slot| (slot, FrameId::PERSISTENT))
        })
    }

    pub fn lookup_persistent(&self, name: &str) -> Option<Slot> {
        self.persistent.lookup_by_name(name)
    }

    /// Whether any stack frame, visible or not, binds `name`
    pub fn holds_local(&self, name: &str) -> bool {
        self.frames
            .iter()
            .any(|frame| frame.names.lookup_by_name(name).is_some())
    }

    /// Frame currently holding `slot`
    pub fn owner(&self, slot: Slot) -> Option<FrameId> {
        self.owners.get(&slot).copied()
    }

    pub fn is_bound(&self, slot: Slot) -> bool {
        self.owners.contains_key(&slot)
    }

    /// Name bound to `slot` anywhere in the context
    pub fn name_at(&self, slot: Slot) -> Option<&Name> {
        let owner = self.owner(slot)?;
        self.names(owner)?.lookup_by_slot(slot)
    }

    /// Dim type of a binding, judged by where it lives and which region
    /// its slot falls in
    pub fn dim_type_of(&self, slot: Slot, range: &SlotRange) -> Option<DimType> {
        match self.owner(slot)? {
            FrameId::PERSISTENT if range.is_visible(slot) => Some(DimType::Visible),
            FrameId::PERSISTENT => Some(DimType::Global),
            _ => Some(DimType::Local),
        }
    }

    fn names(&self, id: FrameId) -> Option<&NameFrame> {
        if id == FrameId::PERSISTENT {
            return Some(&self.persistent);
        }
        self.frames
            .iter()
            .rev()
            .find(|frame| frame.id == id)
            .map(|frame| &frame.names)
    }

    fn names_mut(&mut self, id: FrameId) -> Option<&mut NameFrame> {
        if id == FrameId::PERSISTENT {
            return Some(&mut self.persistent);
        }
        self.frames
            .iter_mut()
            .rev()
            .find(|frame| frame.id == id)
            .map(|frame| &mut frame.names)
    }

    /// Bind `name` to `slot` in frame `id`
    pub fn bind(&mut self, id: FrameId, name: Name, slot: Slot) -> DimResult<()> {
        if let Some(existing) = self.name_at(slot) {
            if existing != &name || self.owner(slot) != Some(id) {
                return Err(ConflictKind::SlotBound {
                    slot,
                    existing: existing.clone(),
                    requested: name,
                }
                .into());
            }
        }
        let frame = self
            .names_mut(id)
            .ok_or_else(|| DimError::config(format!("frame {} is not on the stack", id.0)))?;
        frame.bind(name.clone(), slot)?;
        self.owners.insert(slot, id);
        trace!(name = %name, slot = slot.get(), frame = id.0, "bound");
        Ok(())
    }

    /// Remove `name` from frame `id`. Idempotent.
    pub fn unbind(&mut self, id: FrameId, name: &str) -> Option<Slot> {
        let slot = self.names_mut(id)?.unbind(name)?;
        self.owners.remove(&slot);
        trace!(name, slot = slot.get(), frame = id.0, "unbound");
        Some(slot)
    }

    /// Number of GLOBAL names currently bound
    pub fn global_count(&self, range: &SlotRange) -> usize {
        self.persistent
            .all_bindings()
            .filter(|(_, slot)| !range.is_visible(*slot))
            .count()
    }

    /// First slot of `dim_type`'s region not bound anywhere
    pub fn first_free(&self, range: &SlotRange, dim_type: DimType) -> Option<Slot> {
        range
            .candidates(dim_type)
            .find(|slot| !self.owners.contains_key(slot))
    }

    /// Resolve `name`, allocating a fresh slot if it is not visible.
    ///
    /// GLOBAL and VISIBLE requests resolve against the persistent frame;
    /// LOCAL requests against the window and then the persistent frame.
    /// A `pinned` slot must match an existing binding, or be free and inside
    /// the region for a fresh one. Nothing is mutated on failure.
    pub fn resolve(
        &mut self,
        name: &Name,
        dim_type: DimType,
        pinned: Option<Slot>,
        range: &SlotRange,
    ) -> DimResult<Resolution> {
        let existing = match dim_type {
            DimType::Local => self.lookup(name.as_str()),
            DimType::Global | DimType::Visible => {
                if self.lookup_window(name.as_str()).is_some() {
                    return Err(ConflictKind::RegionMismatch {
                        name: name.clone(),
                        existing: DimType::Local,
                        requested: dim_type,
                    }
                    .into());
                }
                match self.persistent.lookup_by_name(name.as_str()) {
                    Some(slot) => {
                        let existing = if range.is_visible(slot) {
                            DimType::Visible
                        } else {
                            DimType::Global
                        };
                        if existing != dim_type {
                            return Err(ConflictKind::RegionMismatch {
                                name: name.clone(),
                                existing,
                                requested: dim_type,
                            }
                            .into());
                        }
                        Some((slot, FrameId::PERSISTENT))
                    }
                    None => None,
                }
            }
        };

        if let Some((slot, frame)) = existing {
            if let Some(requested) = pinned {
                if requested != slot {
                    return Err(ConflictKind::NameBound {
                        name: name.clone(),
                        existing: slot,
                        requested,
                    }
                    .into());
                }
            }
            return Ok(Resolution {
                slot,
                frame,
                fresh: false,
            });
        }

        if dim_type == DimType::Global {
            if let Some(limit) = range.max_global_dims() {
                if self.global_count(range) >= limit {
                    return Err(DimError::Exhausted {
                        name: name.clone(),
                        region: dim_type,
                        ceiling: limit,
                    });
                }
            }
        }

        let slot = match pinned {
            Some(slot) => {
                if !range.admits(dim_type, slot) {
                    return Err(ConflictKind::WrongRegion {
                        name: name.clone(),
                        slot,
                        dim_type,
                    }
                    .into());
                }
                slot
            }
            None => self
                .first_free(range, dim_type)
                .ok_or_else(|| DimError::Exhausted {
                    name: name.clone(),
                    region: dim_type,
                    ceiling: range.ceiling(dim_type),
                })?,
        };

        let frame = if dim_type.is_persistent() {
            FrameId::PERSISTENT
        } else {
            self.innermost_id()
        };
        self.bind(frame, name.clone(), slot)?;
        Ok(Resolution {
            slot,
            frame,
            fresh: true,
        })
    }

    /// Summaries of the stack frames, outermost first
    pub fn frames(&self) -> Vec<FrameInfo> {
        self.frames
            .iter()
            .map(|frame| FrameInfo {
                id: frame.id,
                depth: frame.depth,
                history: frame.history,
                bindings: frame.names.len(),
            })
            .collect()
    }

    /// Bindings held by frame `id`, in binding order
    pub fn bindings(&self, id: FrameId) -> Vec<(Name, Slot)> {
        self.names(id)
            .map(|names| {
                names
                    .all_bindings()
                    .map(|(name, slot)| (name.clone(), slot))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every bound slot, any frame
    pub fn bound_slots(&self) -> impl Iterator<Item = Slot> + '_ {
        self.owners.keys().copied()
    }

    pub fn bound_count(&self) -> usize {
        self.owners.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(m: usize) -> Slot {
        Slot::from_magnitude(m)
    }

    fn local(stack: &mut ScopeStack, name: &str) -> Slot {
        stack
            .resolve(&Name::from(name), DimType::Local, None, &SlotRange::default())
            .unwrap()
            .slot
    }

    #[test]
    fn test_root_frame_takes_top_level_locals() {
        let mut stack = ScopeStack::new();
        assert_eq!(stack.depth(), 0);
        assert_eq!(local(&mut stack, "x"), slot(5));
        assert_eq!(stack.owner(slot(5)), Some(FrameId::ROOT));
        assert_eq!(stack.remove(FrameId::ROOT), None);
    }

    #[test]
    fn test_push_remove_releases() {
        let mut stack = ScopeStack::new();
        let id = stack.push(1);
        assert!(stack.contains(id));
        assert!(stack.contains(FrameId::PERSISTENT));
        assert_eq!(local(&mut stack, "x"), slot(5));
        assert_eq!(local(&mut stack, "y"), slot(6));
        assert_eq!(stack.bound_count(), 2);
        assert!(stack.is_bound(slot(5)));

        let released = stack.remove(id).unwrap();
        assert_eq!(released.len(), 2);
        assert_eq!(stack.bound_count(), 0);
        assert!(!stack.is_bound(slot(5)));
        assert_eq!(stack.name_at(slot(5)), None);
        assert!(!stack.contains(id));
        assert_eq!(stack.remove(id), None);
    }

    #[test]
    fn test_window_respects_history() {
        let mut stack = ScopeStack::new();
        stack.push(1);
        let a = local(&mut stack, "a");
        stack.push(1);
        // one enclosing frame visible
        assert_eq!(stack.lookup_window("a"), Some((a, FrameId(2))));
        stack.push(1);
        // two frames up is out of range
        assert_eq!(stack.lookup_window("a"), None);
        let shadow = local(&mut stack, "a");
        assert_ne!(shadow, a);
        stack.push(3);
        assert_eq!(stack.lookup_window("a").map(|(s, _)| s), Some(shadow));
    }

    #[test]
    fn test_fresh_slots_skip_frames_outside_window() {
        let mut stack = ScopeStack::new();
        stack.push(0);
        let a = local(&mut stack, "a");
        stack.push(0);
        // "a" is invisible here but its slot is still taken
        let b = local(&mut stack, "b");
        assert_eq!(a, slot(5));
        assert_eq!(b, slot(6));
    }

    #[test]
    fn test_persistent_region_mismatch() {
        let mut stack = ScopeStack::new();
        let range = SlotRange::default();
        let g = Name::from("g");
        let res = stack.resolve(&g, DimType::Global, None, &range).unwrap();
        assert_eq!(res.slot, slot(5));
        assert_eq!(res.frame, FrameId::PERSISTENT);

        let err = stack.resolve(&g, DimType::Visible, None, &range).unwrap_err();
        assert!(err.is_conflict());

        // Locals see persistent names
        let res = stack.resolve(&g, DimType::Local, None, &range).unwrap();
        assert_eq!(res.slot, slot(5));
        assert!(!res.fresh);

        // A live local cannot be re-requested as global
        let l = Name::from("l");
        stack.resolve(&l, DimType::Local, None, &range).unwrap();
        let err = stack.resolve(&l, DimType::Global, None, &range).unwrap_err();
        assert!(matches!(
            err,
            DimError::Conflict(ConflictKind::RegionMismatch { .. })
        ));
    }

    #[test]
    fn test_pinned_requests() {
        let mut stack = ScopeStack::new();
        let range = SlotRange::default();
        let v = Name::from("v");
        let res = stack
            .resolve(&v, DimType::Visible, Some(slot(2)), &range)
            .unwrap();
        assert_eq!(res.slot, slot(2));

        // Same pin again resolves
        assert!(stack.resolve(&v, DimType::Visible, Some(slot(2)), &range).is_ok());
        // Different pin conflicts
        assert!(stack
            .resolve(&v, DimType::Visible, Some(slot(3)), &range)
            .unwrap_err()
            .is_conflict());
        // Taken slot conflicts
        assert!(stack
            .resolve(&Name::from("w"), DimType::Visible, Some(slot(2)), &range)
            .unwrap_err()
            .is_conflict());
        // Wrong region conflicts
        let err = stack
            .resolve(&Name::from("w"), DimType::Local, Some(slot(2)), &range)
            .unwrap_err();
        assert!(matches!(
            err,
            DimError::Conflict(ConflictKind::WrongRegion { .. })
        ));
        assert_eq!(stack.bound_count(), 1);
    }

    #[test]
    fn test_visible_exhaustion() {
        let mut stack = ScopeStack::new();
        let range = SlotRange::new(2, 25).unwrap();
        for name in ["a", "b"] {
            stack
                .resolve(&Name::from(name), DimType::Visible, None, &range)
                .unwrap();
        }
        let err = stack
            .resolve(&Name::from("c"), DimType::Visible, None, &range)
            .unwrap_err();
        assert!(err.is_exhausted());
        assert_eq!(stack.bound_count(), 2);
    }

    #[test]
    fn test_clear() {
        let mut stack = ScopeStack::new();
        stack.push(1);
        local(&mut stack, "x");
        stack
            .resolve(&Name::from("g"), DimType::Global, None, &SlotRange::default())
            .unwrap();
        stack.clear();
        assert_eq!(stack.depth(), 0);
        assert_eq!(stack.bound_count(), 0);
        assert_eq!(stack.lookup_persistent("g"), None);
        assert_eq!(stack.frames().len(), 1);
    }
}
