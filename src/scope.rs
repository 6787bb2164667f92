//! Scope lifecycle
//!
//! `DimContext` is a cheap, clonable handle to one allocator. It is `!Send`
//! on purpose: resolution order and slot recycling depend on a strictly
//! nested enter/exit discipline, so a context stays on the thread that made
//! it. Each thread also gets a lazily created default context through
//! [`DimContext::current`].
//!
//! Every way of entering a scope goes through the same push/pop pair and is
//! undone on drop, so frames are popped on every exit path, panics included:
//!
//! * [`ScopeGuard`] - block scoped, from [`DimContext::enter`]
//! * [`DimContext::scoped`] and [`DimContext::wrap`] - run a closure inside a scope
//! * [`MarkovIter`] - one scope per element of an iterator
//!
//! [`GlobalScope`] releases the GLOBAL and VISIBLE names allocated while it
//! is open, and [`ActiveContext`] tears the whole context down when the
//! outermost one is dropped.

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::collections::VecDeque;
use std::ops::Deref;
use std::rc::Rc;

use tracing::{debug, error};

use crate::allocator::{AllocatorStats, DimAllocator, DimRequest};
use crate::config::AllocatorConfig;
use crate::error::{DimError, DimResult};
use crate::frame::Name;
use crate::slot::Slot;
use crate::stack::FrameId;

thread_local! {
    static CURRENT: RefCell<Option<DimContext>> = const { RefCell::new(None) };
}

#[derive(Debug)]
struct Shared {
    allocator: RefCell<DimAllocator>,

    /// Live `ActiveContext` guards
    active: Cell<usize>,
}

/// Handle to one allocator and its scope stack
#[derive(Debug, Clone)]
pub struct DimContext {
    shared: Rc<Shared>,
}

impl Default for DimContext {
    fn default() -> Self {
        Self::from_allocator(DimAllocator::default())
    }
}

impl DimContext {
    /// Create a context with its own allocator
    pub fn new(config: AllocatorConfig) -> DimResult<Self> {
        Ok(Self::from_allocator(DimAllocator::new(config)?))
    }

    pub fn from_allocator(allocator: DimAllocator) -> Self {
        DimContext {
            shared: Rc::new(Shared {
                allocator: RefCell::new(allocator),
                active: Cell::new(0),
            }),
        }
    }

    /// This thread's default context, created on first use
    pub fn current() -> Self {
        CURRENT.with(|current| {
            current
                .borrow_mut()
                .get_or_insert_with(DimContext::default)
                .clone()
        })
    }

    /// Install `context` as this thread's default, returning the old one
    pub fn set_current(context: DimContext) -> Option<DimContext> {
        CURRENT.with(|current| current.borrow_mut().replace(context))
    }

    /// Whether two handles point at the same allocator
    pub fn ptr_eq(&self, other: &DimContext) -> bool {
        Rc::ptr_eq(&self.shared, &other.shared)
    }

    /// Borrow the allocator.
    ///
    /// Panics if the allocator is mutably borrowed, e.g. when called from
    /// inside [`with_mut`](Self::with_mut).
    pub fn allocator(&self) -> Ref<'_, DimAllocator> {
        self.shared.allocator.borrow()
    }

    /// Mutably borrow the allocator. Same caveat as [`allocator`](Self::allocator).
    pub fn allocator_mut(&self) -> RefMut<'_, DimAllocator> {
        self.shared.allocator.borrow_mut()
    }

    pub fn with<R>(&self, f: impl FnOnce(&DimAllocator) -> R) -> R {
        f(&self.allocator())
    }

    /// Run `f` with the allocator. `f` must not call back into this context.
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut DimAllocator) -> R) -> R {
        f(&mut self.allocator_mut())
    }

    pub fn name_to_slot(
        &self,
        name: impl Into<Name>,
        request: impl Into<DimRequest>,
    ) -> DimResult<Slot> {
        self.allocator_mut().name_to_slot(name, request)
    }

    pub fn allocate<N, I>(&self, requests: I) -> DimResult<Vec<Slot>>
    where
        N: Into<Name>,
        I: IntoIterator<Item = (N, DimRequest)>,
    {
        self.allocator_mut().allocate(requests)
    }

    pub fn slot_to_name(&self, slot: Slot) -> Option<Name> {
        self.allocator().slot_to_name(slot)
    }

    pub fn name_for_slot(&self, slot: Slot) -> DimResult<Name> {
        self.allocator_mut().name_for_slot(slot)
    }

    pub fn lookup(&self, name: &str) -> Option<Slot> {
        self.allocator().lookup(name)
    }

    pub fn required_slot_count<I, S>(&self, names: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.allocator().required_slot_count(names)
    }

    pub fn batch_shape<S: AsRef<str>>(&self, sizes: &[(S, usize)]) -> DimResult<Vec<usize>> {
        self.allocator().batch_shape(sizes)
    }

    pub fn release(&self, name: &str) -> DimResult<bool> {
        self.allocator_mut().release(name)
    }

    pub fn first_available_dim(&self) -> usize {
        self.allocator().first_available_dim()
    }

    pub fn set_first_available_dim(&self, first_available_dim: usize) -> DimResult<usize> {
        self.allocator_mut().set_first_available_dim(first_available_dim)
    }

    /// Number of entered scopes
    pub fn depth(&self) -> usize {
        self.allocator().depth()
    }

    pub fn stats(&self) -> AllocatorStats {
        self.allocator().stats().clone()
    }

    pub fn debug_dump(&self) -> String {
        self.allocator().debug_dump()
    }

    /// Enter a scope. It exits when the returned guard drops.
    ///
    /// `history` is the number of enclosing frames whose LOCAL names stay
    /// resolvable; `None` uses the configured default.
    pub fn enter(&self, history: Option<usize>) -> DimResult<ScopeGuard> {
        let mut allocator = self.allocator_mut();
        let history =
            allocator.check_history(history.unwrap_or(allocator.config().default_history))?;
        let frame = allocator.push_scope(history);
        drop(allocator);

        Ok(ScopeGuard {
            context: self.clone(),
            frame,
            history,
            exited: false,
        })
    }

    /// Run `body` inside a fresh scope.
    ///
    /// The scope exits whether `body` returns `Ok`, `Err` or panics.
    pub fn scoped<T, E, F>(&self, history: Option<usize>, body: F) -> Result<T, E>
    where
        F: FnOnce(&DimContext) -> Result<T, E>,
        E: From<DimError>,
    {
        let scope = self.enter(history)?;
        body(scope.context())
    }

    /// Wrap `f` so that every call runs inside its own scope
    pub fn wrap<A, T, E, F>(&self, history: Option<usize>, f: F) -> impl Fn(A) -> Result<T, E>
    where
        F: Fn(&DimContext, A) -> Result<T, E>,
        E: From<DimError>,
    {
        let context = self.clone();
        move |arg| context.scoped(history, |ctx| f(ctx, arg))
    }

    /// Iterate with one scope per element.
    ///
    /// With `history = h`, the scope of each element can still see the
    /// LOCAL names of the `h - 1` elements before it, plus whatever encloses
    /// the iteration.
    pub fn markov<I>(
        &self,
        iterable: I,
        history: Option<usize>,
    ) -> DimResult<MarkovIter<I::IntoIter>>
    where
        I: IntoIterator,
    {
        let allocator = self.allocator();
        let history = history.unwrap_or(allocator.config().default_history);
        allocator.check_history(history)?;
        drop(allocator);

        Ok(MarkovIter {
            context: self.clone(),
            iter: iterable.into_iter(),
            history,
            chain: VecDeque::new(),
            done: false,
        })
    }

    /// Open a global scope
    pub fn global_scope(&self) -> GlobalScope {
        let id = self.allocator_mut().open_global_scope();
        GlobalScope {
            context: self.clone(),
            id,
            closed: false,
        }
    }

    /// Run `body` inside a global scope
    pub fn with_global_scope<T, F>(&self, body: F) -> T
    where
        F: FnOnce(&DimContext) -> T,
    {
        let scope = self.global_scope();
        body(scope.context())
    }

    /// Mark the context as in use. The context is torn down when the
    /// outermost `ActiveContext` drops.
    pub fn activate(&self) -> ActiveContext {
        let active = self.shared.active.get();
        if active == 0 {
            debug!("context activated");
        }
        self.shared.active.set(active + 1);
        ActiveContext {
            context: self.clone(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.shared.active.get() > 0
    }

    /// Run `f` on the allocator from a destructor, where a panic must not
    /// happen
    fn with_allocator_in_drop<R>(
        &self,
        what: &str,
        f: impl FnOnce(&mut DimAllocator) -> R,
    ) -> Option<R> {
        match self.shared.allocator.try_borrow_mut() {
            Ok(mut allocator) => Some(f(&mut allocator)),
            Err(_) => {
                error!(what, "allocator is borrowed; cleanup skipped");
                None
            }
        }
    }
}

/// A block-scoped nesting level. Dropping it exits the scope.
#[derive(Debug)]
#[must_use = "the scope exits as soon as the guard is dropped"]
pub struct ScopeGuard {
    context: DimContext,
    frame: FrameId,
    history: usize,
    exited: bool,
}

impl ScopeGuard {
    pub fn frame(&self) -> FrameId {
        self.frame
    }

    pub fn history(&self) -> usize {
        self.history
    }

    pub fn context(&self) -> &DimContext {
        &self.context
    }

    /// Exit now, returning the number of LOCAL bindings released
    pub fn exit(mut self) -> usize {
        self.close()
    }

    fn close(&mut self) -> usize {
        if self.exited {
            return 0;
        }
        self.exited = true;
        let frame = self.frame;
        self.context
            .with_allocator_in_drop("scope exit", |allocator| allocator.exit_scope(frame))
            .flatten()
            .unwrap_or(0)
    }
}

impl Deref for ScopeGuard {
    type Target = DimContext;

    fn deref(&self) -> &DimContext {
        &self.context
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        self.close();
    }
}

/// Iterator adapter entering one scope per element
#[derive(Debug)]
pub struct MarkovIter<I> {
    context: DimContext,
    iter: I,
    history: usize,

    /// Frames of earlier elements still inside the window, oldest first
    chain: VecDeque<FrameId>,

    done: bool,
}

impl<I> MarkovIter<I> {
    pub fn history(&self) -> usize {
        self.history
    }

    /// Frames this iteration currently keeps on the stack
    pub fn live_frames(&self) -> usize {
        self.chain.len()
    }

    fn finish(&mut self) {
        self.done = true;
        if self.chain.is_empty() {
            return;
        }
        let chain: Vec<FrameId> = self.chain.drain(..).rev().collect();
        self.context.with_allocator_in_drop("markov exit", |allocator| {
            for frame in chain {
                allocator.exit_scope(frame);
            }
        });
    }
}

impl<I: Iterator> Iterator for MarkovIter<I> {
    type Item = I::Item;

    fn next(&mut self) -> Option<I::Item> {
        if self.done {
            return None;
        }

        // Earlier elements that the next one cannot see any more
        let keep = self.history.saturating_sub(1);
        if self.chain.len() > keep {
            let mut allocator = self.context.allocator_mut();
            while self.chain.len() > keep {
                if let Some(frame) = self.chain.pop_front() {
                    allocator.prune_scope(frame);
                }
            }
        }

        match self.iter.next() {
            Some(item) => {
                // The step sees the retained steps and the enclosing frame,
                // never further out
                let window = (self.chain.len() + 1).min(self.history);
                let frame = self.context.allocator_mut().push_scope(window);
                self.chain.push_back(frame);
                Some(item)
            }
            None => {
                self.finish();
                None
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.done {
            (0, Some(0))
        } else {
            self.iter.size_hint()
        }
    }
}

impl<I> Drop for MarkovIter<I> {
    fn drop(&mut self) {
        self.finish();
    }
}

/// Releases the GLOBAL and VISIBLE names allocated while it is open
#[derive(Debug)]
#[must_use = "the global scope closes as soon as it is dropped"]
pub struct GlobalScope {
    context: DimContext,
    id: u64,
    closed: bool,
}

impl GlobalScope {
    pub fn context(&self) -> &DimContext {
        &self.context
    }

    /// Close now, returning the number of names released
    pub fn close(mut self) -> usize {
        self.release_all()
    }

    fn release_all(&mut self) -> usize {
        if self.closed {
            return 0;
        }
        self.closed = true;
        let id = self.id;
        self.context
            .with_allocator_in_drop("global scope exit", |allocator| {
                allocator.close_global_scope(id)
            })
            .unwrap_or(0)
    }
}

impl Deref for GlobalScope {
    type Target = DimContext;

    fn deref(&self) -> &DimContext {
        &self.context
    }
}

impl Drop for GlobalScope {
    fn drop(&mut self) {
        self.release_all();
    }
}

/// Keeps a context alive for one computation
#[derive(Debug)]
#[must_use = "the context is torn down when the outermost guard drops"]
pub struct ActiveContext {
    context: DimContext,
}

impl Deref for ActiveContext {
    type Target = DimContext;

    fn deref(&self) -> &DimContext {
        &self.context
    }
}

impl Drop for ActiveContext {
    fn drop(&mut self) {
        let shared = &self.context.shared;
        let active = shared.active.get().saturating_sub(1);
        shared.active.set(active);
        if active == 0 {
            self.context
                .with_allocator_in_drop("teardown", DimAllocator::teardown);
        }
    }
}
