//! Allocator facade
//!
//! `DimAllocator` is what the conversion boundary talks to. It owns the
//! scope stack, the slot partition and the bookkeeping around them:
//! statistics, open global scopes, and rollback of partially resolved
//! batches.

use tracing::{debug, trace};

use crate::config::AllocatorConfig;
use crate::error::{ConflictKind, DimError, DimResult};
use crate::frame::Name;
use crate::slot::{DimType, Slot, SlotRange};
use crate::stack::{FrameId, FrameInfo, Resolution, ScopeStack};

/// Prefix for names generated for unnamed positions
pub const FRESH_NAME_PREFIX: &str = "_dim_";

/// How a single name should be resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DimRequest {
    /// Region and frame the name belongs to
    pub dim_type: DimType,

    /// Explicit slot, if the caller needs the name at a fixed position
    pub slot: Option<Slot>,
}

impl DimRequest {
    pub fn local() -> Self {
        DimRequest {
            dim_type: DimType::Local,
            slot: None,
        }
    }

    pub fn global() -> Self {
        DimRequest {
            dim_type: DimType::Global,
            slot: None,
        }
    }

    pub fn visible() -> Self {
        DimRequest {
            dim_type: DimType::Visible,
            slot: None,
        }
    }

    /// Request `slot` exactly
    pub fn pinned(dim_type: DimType, slot: Slot) -> Self {
        DimRequest {
            dim_type,
            slot: Some(slot),
        }
    }
}

impl From<DimType> for DimRequest {
    fn from(dim_type: DimType) -> Self {
        DimRequest {
            dim_type,
            slot: None,
        }
    }
}

/// Allocator statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AllocatorStats {
    local_allocations: usize,
    global_allocations: usize,
    visible_allocations: usize,

    /// Requests answered by an existing binding
    lookup_hits: usize,

    /// GLOBAL/VISIBLE names released manually or by a global scope
    releases: usize,

    scopes_entered: usize,
    scopes_exited: usize,

    /// Chain frames retired because they fell out of the history window
    frames_pruned: usize,

    max_nesting_depth: usize,

    /// Largest slot magnitude ever bound
    peak_slot_count: usize,

    /// Most bindings alive at once
    peak_bindings: usize,

    /// Batches undone after a failure
    rollbacks: usize,

    teardowns: usize,
}

impl AllocatorStats {
    pub fn local_allocations(&self) -> usize {
        self.local_allocations
    }

    pub fn global_allocations(&self) -> usize {
        self.global_allocations
    }

    pub fn visible_allocations(&self) -> usize {
        self.visible_allocations
    }

    /// Total fresh bindings of any type
    pub fn allocations(&self) -> usize {
        self.local_allocations + self.global_allocations + self.visible_allocations
    }

    pub fn lookup_hits(&self) -> usize {
        self.lookup_hits
    }

    pub fn releases(&self) -> usize {
        self.releases
    }

    pub fn scopes_entered(&self) -> usize {
        self.scopes_entered
    }

    pub fn scopes_exited(&self) -> usize {
        self.scopes_exited
    }

    pub fn frames_pruned(&self) -> usize {
        self.frames_pruned
    }

    pub fn max_nesting_depth(&self) -> usize {
        self.max_nesting_depth
    }

    pub fn peak_slot_count(&self) -> usize {
        self.peak_slot_count
    }

    pub fn peak_bindings(&self) -> usize {
        self.peak_bindings
    }

    pub fn rollbacks(&self) -> usize {
        self.rollbacks
    }

    pub fn teardowns(&self) -> usize {
        self.teardowns
    }
}

/// GLOBAL/VISIBLE names allocated while a global scope is open
#[derive(Debug, Clone)]
struct GlobalRecorder {
    id: u64,
    names: Vec<Name>,
}

/// Name <-> slot allocator for one conversion context
#[derive(Debug, Clone)]
pub struct DimAllocator {
    config: AllocatorConfig,
    range: SlotRange,
    stack: ScopeStack,
    global_scopes: Vec<GlobalRecorder>,
    next_global_scope: u64,
    stats: AllocatorStats,
}

impl Default for DimAllocator {
    fn default() -> Self {
        DimAllocator {
            config: AllocatorConfig::default(),
            range: SlotRange::default(),
            stack: ScopeStack::new(),
            global_scopes: Vec::new(),
            next_global_scope: 0,
            stats: AllocatorStats::default(),
        }
    }
}

impl DimAllocator {
    /// Create an allocator, validating the configuration first
    pub fn new(config: AllocatorConfig) -> DimResult<Self> {
        config.validate()?;
        let range = config.slot_range()?;
        Ok(DimAllocator {
            config,
            range,
            ..Default::default()
        })
    }

    pub fn config(&self) -> &AllocatorConfig {
        &self.config
    }

    pub fn slot_range(&self) -> &SlotRange {
        &self.range
    }

    pub fn stack(&self) -> &ScopeStack {
        &self.stack
    }

    pub fn stats(&self) -> &AllocatorStats {
        &self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = AllocatorStats::default();
    }

    pub fn first_available_dim(&self) -> usize {
        self.range.first_available_dim()
    }

    /// Move the visible boundary, returning the previous value.
    ///
    /// There is no automatic scoping: callers restore the old value
    /// themselves. Fails if the new boundary would leave any current
    /// binding in the wrong region.
    pub fn set_first_available_dim(&mut self, first_available_dim: usize) -> DimResult<usize> {
        let mut range = self.range;
        let previous = range.set_first_available_dim(first_available_dim)?;

        for slot in self.stack.bound_slots() {
            let Some(dim_type) = self.stack.dim_type_of(slot, &self.range) else {
                continue;
            };
            if !range.admits(dim_type, slot) {
                return Err(DimError::config(format!(
                    "first_available_dim {} would move {} slot {} into another region",
                    first_available_dim, dim_type, slot
                )));
            }
        }

        self.range = range;
        self.config.first_available_dim = first_available_dim;
        debug!(previous, first_available_dim, "moved visible boundary");
        Ok(previous)
    }

    /// Resolve `name`, allocating a slot for it if needed
    pub fn name_to_slot(
        &mut self,
        name: impl Into<Name>,
        request: impl Into<DimRequest>,
    ) -> DimResult<Slot> {
        let name = name.into();
        let request = request.into();
        let resolution = self
            .stack
            .resolve(&name, request.dim_type, request.slot, &self.range)?;
        self.commit(&name, request.dim_type, resolution);
        Ok(resolution.slot)
    }

    /// Resolve a whole name set in one call.
    ///
    /// Either every name resolves, or none of the bindings made by this call
    /// survive and the first error is returned.
    pub fn allocate<N, I>(&mut self, requests: I) -> DimResult<Vec<Slot>>
    where
        N: Into<Name>,
        I: IntoIterator<Item = (N, DimRequest)>,
    {
        let mut resolved: Vec<(Name, DimType, Resolution)> = Vec::new();

        for (name, request) in requests {
            let name = name.into();
            match self
                .stack
                .resolve(&name, request.dim_type, request.slot, &self.range)
            {
                Ok(resolution) => resolved.push((name, request.dim_type, resolution)),
                Err(err) => {
                    let mut undone = 0;
                    for (name, _, resolution) in resolved.iter().rev() {
                        if resolution.fresh {
                            self.stack.unbind(resolution.frame, name.as_str());
                            undone += 1;
                        }
                    }
                    self.stats.rollbacks += 1;
                    debug!(undone, error = %err, "rolled back batch allocation");
                    return Err(err);
                }
            }
        }

        let slots = resolved.iter().map(|(_, _, resolution)| resolution.slot).collect();
        for (name, dim_type, resolution) in resolved {
            self.commit(&name, dim_type, resolution);
        }
        Ok(slots)
    }

    fn commit(&mut self, name: &Name, dim_type: DimType, resolution: Resolution) {
        if !resolution.fresh {
            self.stats.lookup_hits += 1;
            return;
        }

        match dim_type {
            DimType::Local => self.stats.local_allocations += 1,
            DimType::Global => self.stats.global_allocations += 1,
            DimType::Visible => self.stats.visible_allocations += 1,
        }
        if dim_type.is_persistent() {
            if let Some(recorder) = self.global_scopes.last_mut() {
                recorder.names.push(name.clone());
            }
        }
        self.stats.peak_slot_count = self.stats.peak_slot_count.max(resolution.slot.magnitude());
        self.stats.peak_bindings = self.stats.peak_bindings.max(self.stack.bound_count());
        trace!(name = %name, slot = resolution.slot.get(), %dim_type, "allocated");
    }

    /// Name bound to `slot` anywhere in the context
    pub fn slot_to_name(&self, slot: Slot) -> Option<Name> {
        self.stack.name_at(slot).cloned()
    }

    /// Name for a positional slot, binding a generated one if it has none.
    ///
    /// Visible slots get a VISIBLE binding, slots left of the boundary a
    /// LOCAL binding in the innermost frame.
    pub fn name_for_slot(&mut self, slot: Slot) -> DimResult<Name> {
        if let Some(name) = self.slot_to_name(slot) {
            return Ok(name);
        }

        let dim_type = if self.range.is_visible(slot) {
            DimType::Visible
        } else {
            DimType::Local
        };
        let base = format!("{}{}", FRESH_NAME_PREFIX, slot.magnitude());
        let mut name = Name::from(base.as_str());
        let mut suffix = 1;
        while self.stack.lookup(name.as_str()).is_some() || self.stack.holds_local(name.as_str()) {
            name = Name::from(format!("{}_{}", base, suffix));
            suffix += 1;
        }

        self.name_to_slot(name.clone(), DimRequest::pinned(dim_type, slot))?;
        Ok(name)
    }

    /// Slot `name` resolves to from the innermost scope, without allocating
    pub fn lookup(&self, name: &str) -> Option<Slot> {
        self.stack.lookup(name).map(|(slot, _)| slot)
    }

    /// Slot and dim type `name` resolves to, without allocating
    pub fn binding(&self, name: &str) -> Option<(Slot, DimType)> {
        let (slot, _) = self.stack.lookup(name)?;
        let dim_type = self.stack.dim_type_of(slot, &self.range)?;
        Some((slot, dim_type))
    }

    /// Minimal number of rightmost positions that holds every bound name in
    /// `names`. Names that are not bound are ignored.
    pub fn required_slot_count<I, S>(&self, names: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names
            .into_iter()
            .filter_map(|name| self.lookup(name.as_ref()))
            .map(Slot::magnitude)
            .max()
            .unwrap_or(0)
    }

    /// Positional shape prefix for a set of named axes.
    ///
    /// The result has `required_slot_count` entries; each name's size sits at
    /// its slot and every other position is `1`. Every name must be bound.
    pub fn batch_shape<S: AsRef<str>>(&self, sizes: &[(S, usize)]) -> DimResult<Vec<usize>> {
        let mut placed = Vec::with_capacity(sizes.len());
        for (name, size) in sizes {
            let name = name.as_ref();
            let slot = self
                .lookup(name)
                .ok_or_else(|| DimError::Unbound(Name::from(name)))?;
            placed.push((slot.magnitude(), *size));
        }

        let len = placed.iter().map(|(magnitude, _)| *magnitude).max().unwrap_or(0);
        let mut shape = vec![1; len];
        for (magnitude, size) in placed {
            shape[len - magnitude] = size;
        }
        Ok(shape)
    }

    /// Release a GLOBAL or VISIBLE name. Idempotent.
    ///
    /// Returns whether a binding was removed. LOCAL names cannot be released
    /// this way; they go when their scope exits.
    pub fn release(&mut self, name: &str) -> DimResult<bool> {
        if let Some(slot) = self.stack.unbind(FrameId::PERSISTENT, name) {
            self.stats.releases += 1;
            debug!(name, slot = slot.get(), "released persistent name");
            return Ok(true);
        }
        if self.stack.holds_local(name) {
            return Err(ConflictKind::LocalRelease {
                name: Name::from(name),
            }
            .into());
        }
        Ok(false)
    }

    /// Enter a scope with `history` (or the configured default)
    pub fn enter_scope(&mut self, history: Option<usize>) -> DimResult<FrameId> {
        let history = self
            .config
            .check_history(history.unwrap_or(self.config.default_history))?;
        Ok(self.push_scope(history))
    }

    /// Push a frame for an already validated history
    pub(crate) fn push_scope(&mut self, history: usize) -> FrameId {
        let id = self.stack.push(history);
        self.stats.scopes_entered += 1;
        self.stats.max_nesting_depth = self.stats.max_nesting_depth.max(self.stack.depth());
        id
    }

    pub(crate) fn check_history(&self, history: usize) -> DimResult<usize> {
        self.config.check_history(history)
    }

    /// Exit the scope that pushed `frame`, releasing its LOCAL bindings.
    ///
    /// Returns the number of bindings released, or `None` if the frame was
    /// already gone.
    pub fn exit_scope(&mut self, frame: FrameId) -> Option<usize> {
        let released = self.stack.remove(frame)?;
        self.stats.scopes_exited += 1;
        Some(released.len())
    }

    /// Retire a chain frame that fell out of the history window
    pub(crate) fn prune_scope(&mut self, frame: FrameId) -> Option<usize> {
        let released = self.exit_scope(frame)?;
        self.stats.frames_pruned += 1;
        Some(released)
    }

    /// Start recording GLOBAL/VISIBLE allocations
    pub fn open_global_scope(&mut self) -> u64 {
        let id = self.next_global_scope;
        self.next_global_scope += 1;
        self.global_scopes.push(GlobalRecorder {
            id,
            names: Vec::new(),
        });
        debug!(scope = id, "opened global scope");
        id
    }

    /// Release everything the global scope `id` allocated, newest first.
    ///
    /// Returns how many names were actually released.
    pub fn close_global_scope(&mut self, id: u64) -> usize {
        let Some(position) = self.global_scopes.iter().rposition(|r| r.id == id) else {
            return 0;
        };
        let recorder = self.global_scopes.remove(position);
        let mut released = 0;
        for name in recorder.names.iter().rev() {
            if self.stack.unbind(FrameId::PERSISTENT, name.as_str()).is_some() {
                self.stats.releases += 1;
                released += 1;
            }
        }
        debug!(scope = id, released, "closed global scope");
        released
    }

    /// Discard every frame and binding. Configuration and statistics stay.
    pub fn teardown(&mut self) {
        self.stack.clear();
        self.global_scopes.clear();
        self.stats.teardowns += 1;
        debug!("allocator torn down");
    }

    /// Number of entered scopes
    pub fn depth(&self) -> usize {
        self.stack.depth()
    }

    pub fn frames(&self) -> Vec<FrameInfo> {
        self.stack.frames()
    }

    /// Debug dump of allocator state
    pub fn debug_dump(&self) -> String {
        let mut result = String::new();

        result.push_str("Allocator State:\n");
        result.push_str(&format!(
            "- Boundary: {} visible, ceiling {}\n",
            self.range.first_available_dim(),
            self.range.max_dims()
        ));
        result.push_str(&format!("- Depth: {}\n", self.stack.depth()));
        result.push_str(&format!("- Bound slots: {}\n", self.stack.bound_count()));
        result.push_str(&format!("- Open global scopes: {}\n", self.global_scopes.len()));

        result.push_str("\nPersistent:\n");
        for (name, slot) in self.stack.bindings(FrameId::PERSISTENT) {
            let kind = if self.range.is_visible(slot) {
                DimType::Visible
            } else {
                DimType::Global
            };
            result.push_str(&format!("  {} -> {} ({})\n", name, slot, kind));
        }

        for info in self.stack.frames() {
            result.push_str(&format!(
                "\nFrame {} (depth {}, history {}):\n",
                info.id.get(),
                info.depth,
                info.history
            ));
            for (name, slot) in self.stack.bindings(info.id) {
                result.push_str(&format!("  {} -> {}\n", name, slot));
            }
        }

        result.push_str("\nStats:\n");
        result.push_str(&format!("- Allocations: {}\n", self.stats.allocations()));
        result.push_str(&format!("- Lookup hits: {}\n", self.stats.lookup_hits));
        result.push_str(&format!("- Releases: {}\n", self.stats.releases));
        result.push_str(&format!("- Scopes entered: {}\n", self.stats.scopes_entered));
        result.push_str(&format!("- Frames pruned: {}\n", self.stats.frames_pruned));
        result.push_str(&format!("- Max nesting depth: {}\n", self.stats.max_nesting_depth));
        result.push_str(&format!("- Peak slot count: {}\n", self.stats.peak_slot_count));
        result.push_str(&format!("- Rollbacks: {}\n", self.stats.rollbacks));

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(m: usize) -> Slot {
        Slot::from_magnitude(m)
    }

    #[test]
    fn test_round_trip() {
        let mut alloc = DimAllocator::default();
        let x = alloc.name_to_slot("x", DimType::Local).unwrap();
        let g = alloc.name_to_slot("g", DimType::Global).unwrap();
        let v = alloc.name_to_slot("v", DimType::Visible).unwrap();

        assert_eq!(x, slot(5));
        assert_eq!(g, slot(6));
        assert_eq!(v, slot(1));
        for (name, s) in [("x", x), ("g", g), ("v", v)] {
            assert_eq!(alloc.slot_to_name(s).unwrap().as_str(), name);
        }
        assert_eq!(alloc.slot_to_name(slot(2)), None);

        // Second request is a lookup
        assert_eq!(alloc.name_to_slot("x", DimType::Local).unwrap(), x);
        assert_eq!(alloc.stats().allocations(), 3);
        assert_eq!(alloc.stats().lookup_hits(), 1);
    }

    #[test]
    fn test_global_recycling() {
        let mut alloc = DimAllocator::default();
        let a = alloc.name_to_slot("a", DimType::Global).unwrap();
        let b = alloc.name_to_slot("b", DimType::Global).unwrap();
        assert_ne!(a, b);

        assert!(alloc.release("a").unwrap());
        assert!(!alloc.release("a").unwrap());
        let c = alloc.name_to_slot("c", DimType::Global).unwrap();
        assert_eq!(c, a);
        assert_eq!(alloc.stats().releases(), 1);
    }

    #[test]
    fn test_release_local_is_refused() {
        let mut alloc = DimAllocator::default();
        let scope = alloc.enter_scope(None).unwrap();
        alloc.name_to_slot("x", DimType::Local).unwrap();
        let err = alloc.release("x").unwrap_err();
        assert!(matches!(
            err,
            DimError::Conflict(ConflictKind::LocalRelease { .. })
        ));
        assert_eq!(alloc.exit_scope(scope), Some(1));
        assert_eq!(alloc.release("x").unwrap(), false);
    }

    #[test]
    fn test_required_slot_count_and_shape() {
        let mut alloc = DimAllocator::default();
        alloc.name_to_slot("v", DimType::Visible).unwrap();
        alloc.name_to_slot("x", DimType::Local).unwrap();
        alloc.name_to_slot("y", DimType::Local).unwrap();

        assert_eq!(alloc.required_slot_count(Vec::<&str>::new()), 0);
        assert_eq!(alloc.required_slot_count(["v"]), 1);
        assert_eq!(alloc.required_slot_count(["v", "x"]), 5);
        assert_eq!(alloc.required_slot_count(["y", "unbound"]), 6);

        let shape = alloc.batch_shape(&[("x", 3), ("v", 2)]).unwrap();
        assert_eq!(shape, vec![3, 1, 1, 1, 2]);
        let shape = alloc.batch_shape(&[("y", 7)]).unwrap();
        assert_eq!(shape, vec![7, 1, 1, 1, 1, 1]);
        assert_eq!(alloc.batch_shape::<&str>(&[]).unwrap(), Vec::<usize>::new());
        assert!(matches!(
            alloc.batch_shape(&[("nope", 2)]),
            Err(DimError::Unbound(_))
        ));
    }

    #[test]
    fn test_batch_rollback() {
        let mut alloc = DimAllocator::default();
        alloc.name_to_slot("taken", DimRequest::pinned(DimType::Visible, slot(2))).unwrap();
        let before = alloc.stack().bound_count();

        let err = alloc
            .allocate(vec![
                ("a", DimRequest::local()),
                ("b", DimRequest::global()),
                ("c", DimRequest::pinned(DimType::Visible, slot(2))),
            ])
            .unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(alloc.stack().bound_count(), before);
        assert_eq!(alloc.lookup("a"), None);
        assert_eq!(alloc.lookup("b"), None);
        assert_eq!(alloc.stats().rollbacks(), 1);
        assert_eq!(alloc.stats().allocations(), 1);

        let slots = alloc
            .allocate(vec![
                ("a", DimRequest::local()),
                ("a", DimRequest::local()),
                ("v", DimRequest::visible()),
            ])
            .unwrap();
        assert_eq!(slots, vec![slot(5), slot(5), slot(1)]);
    }

    #[test]
    fn test_name_for_slot() {
        let mut alloc = DimAllocator::default();
        let name = alloc.name_for_slot(slot(3)).unwrap();
        assert_eq!(name.as_str(), "_dim_3");
        assert_eq!(alloc.binding("_dim_3"), Some((slot(3), DimType::Visible)));
        // Stable on repeat
        assert_eq!(alloc.name_for_slot(slot(3)).unwrap(), name);

        // A user already owns the plain generated name
        alloc.name_to_slot("_dim_7", DimType::Local).unwrap();
        let name = alloc.name_for_slot(slot(7)).unwrap();
        assert_eq!(name.as_str(), "_dim_7_1");
        assert_eq!(alloc.lookup("_dim_7_1"), Some(slot(7)));
        let name = alloc.name_for_slot(slot(8)).unwrap();
        assert_eq!(name.as_str(), "_dim_8");
        assert_eq!(alloc.binding("_dim_8"), Some((slot(8), DimType::Local)));

        assert!(alloc.name_for_slot(slot(26)).is_err());
    }

    #[test]
    fn test_set_first_available_dim() {
        let mut alloc = DimAllocator::default();
        assert_eq!(alloc.set_first_available_dim(2).unwrap(), 4);
        let x = alloc.name_to_slot("x", DimType::Local).unwrap();
        assert_eq!(x, slot(3));

        // Moving the boundary over x is refused
        assert!(alloc.set_first_available_dim(4).unwrap_err().is_config());
        assert_eq!(alloc.first_available_dim(), 2);
        assert!(alloc.set_first_available_dim(1).is_ok());
        assert_eq!(alloc.config().first_available_dim, 1);
    }

    #[test]
    fn test_global_limit() {
        let config = AllocatorConfig {
            max_global_dims: Some(1),
            ..Default::default()
        };
        let mut alloc = DimAllocator::new(config).unwrap();
        alloc.name_to_slot("g", DimType::Global).unwrap();
        let err = alloc.name_to_slot("h", DimType::Global).unwrap_err();
        assert!(err.is_exhausted());
        // Locals are unaffected
        assert!(alloc.name_to_slot("l", DimType::Local).is_ok());
    }

    #[test]
    fn test_global_scope_recording() {
        let mut alloc = DimAllocator::default();
        alloc.name_to_slot("outer", DimType::Global).unwrap();
        let id = alloc.open_global_scope();
        alloc.name_to_slot("g1", DimType::Global).unwrap();
        alloc.name_to_slot("v1", DimType::Visible).unwrap();
        alloc.name_to_slot("outer", DimType::Global).unwrap();
        alloc.release("g1").unwrap();

        assert_eq!(alloc.close_global_scope(id), 1);
        assert_eq!(alloc.lookup("v1"), None);
        assert!(alloc.lookup("outer").is_some());
        assert_eq!(alloc.close_global_scope(id), 0);
    }

    #[test]
    fn test_teardown_and_dump() {
        let mut alloc = DimAllocator::default();
        alloc.enter_scope(Some(2)).unwrap();
        alloc.name_to_slot("x", DimType::Local).unwrap();
        alloc.name_to_slot("g", DimType::Global).unwrap();

        let dump = alloc.debug_dump();
        assert!(dump.contains("g -> -6 (GLOBAL)"));
        assert!(dump.contains("history 2"));
        assert!(dump.contains("x -> -5"));

        assert_eq!(alloc.stats().peak_bindings(), 2);

        alloc.teardown();
        assert_eq!(alloc.depth(), 0);
        assert_eq!(alloc.stack().bound_count(), 0);
        assert_eq!(alloc.stats().teardowns(), 1);
        // Peaks survive teardown until reset
        assert_eq!(alloc.stats().peak_bindings(), 2);

        alloc.reset_stats();
        assert_eq!(alloc.stats(), &AllocatorStats::default());
    }

    #[test]
    fn test_invalid_history() {
        let mut alloc = DimAllocator::default();
        assert!(alloc.enter_scope(Some(26)).unwrap_err().is_config());
        assert_eq!(alloc.depth(), 0);
    }
}
