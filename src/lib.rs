//! Tree model core for a sprite table editor.
//!
//! The crate mirrors a two-level backing store (tables of sprites with
//! frame counts and rendered previews) as a presentable tree, and keeps the
//! two consistent under structural edits. The one invariant everything
//! hangs on: a node's row among its siblings always equals its position in
//! the store, so node identifiers double as store coordinates.
//!
//! - [`tree`] owns the node tree and the [`tree::model::TreeModel`]
//!   controller (navigation, bracketed mutation, derived operations)
//! - [`store`] is the backing-store seam, with an in-memory reference
//!   implementation in [`store::memory`]
//! - [`ui`] holds the presentation-facing traits the model notifies

pub mod error;
pub mod store;
pub mod tree;
pub mod ui;

pub use error::SpriteError;
pub use store::memory::MemoryStore;
pub use store::{FrameShape, SpriteStore, TablePointers};
pub use tree::model::{CellRole, CellValue, ModelIndex, TreeModel};
pub use tree::node::{Node, NodeKind, NodeRef};
pub use ui::{ModelObserver, Presenter};
