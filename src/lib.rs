//! Dimscope library
//!
//! Scoped allocation of symbolic dimension names to negative positional
//! slots. Named axes get stable positions while a computation runs, LOCAL
//! names are recycled when their scope exits, and the number of positions in
//! use stays bounded by nesting depth and history rather than by how many
//! names were ever introduced.
//!
//! ```
//! use dimscope::{DimContext, DimType};
//!
//! let ctx = DimContext::default();
//! let batch = ctx.name_to_slot("batch", DimType::Visible)?;
//! assert_eq!(batch.get(), -1);
//!
//! let scope = ctx.enter(None)?;
//! let x = scope.name_to_slot("x", DimType::Local)?;
//! assert_eq!(ctx.slot_to_name(x).unwrap().as_str(), "x");
//! drop(scope);
//! assert_eq!(ctx.lookup("x"), None);
//! # Ok::<(), dimscope::DimError>(())
//! ```

pub mod allocator;
pub mod config;
pub mod error;
pub mod frame;
pub mod scope;
pub mod slot;
pub mod stack;

// Re-export commonly used types
pub use allocator::{AllocatorStats, DimAllocator, DimRequest};
pub use config::AllocatorConfig;
pub use error::{ConflictKind, DimError, DimResult};
pub use frame::Name;
pub use scope::{ActiveContext, DimContext, GlobalScope, MarkovIter, ScopeGuard};
pub use slot::{DimType, Slot, SlotRange};
pub use stack::FrameId;
