/// Tree model controller
///
/// `TreeModel` owns the node tree and the backing store, and keeps the two
/// in lockstep: row positions in the tree always equal positions in the
/// store. Structural edits renumber sibling identifiers immediately, so a
/// node's id can be used as a store coordinate at any time between
/// mutations.
///
/// Every insert/remove/reset is bracketed with begin/end notifications to
/// the registered observers; presentation effects (selection, status text,
/// confirmations) go through the `Presenter` passed into each derived
/// operation.
use std::cell::RefCell;
use std::rc::{Rc, Weak};

use image::RgbaImage;

use crate::error::Result;
use crate::store::{FrameShape, SpriteStore, TablePointers, IMPORT_FRAMES, IMPORT_SHAPE};
use crate::tree::node::{self, Node, NodeRef};
use crate::ui::{ModelObserver, Presenter};

/// Address of one cell in the tree: a row/column pair plus a weak handle to
/// the node behind it. Indices held across a structural mutation go stale;
/// `is_valid` reports whether the node still exists.
#[derive(Debug, Clone, Default)]
pub struct ModelIndex {
    row: usize,
    column: usize,
    node: Weak<RefCell<Node>>,
}

impl ModelIndex {
    /// The invalid index; doubles as the root marker in navigation calls
    pub fn invalid() -> Self {
        ModelIndex::default()
    }

    fn new(row: usize, column: usize, node: &NodeRef) -> Self {
        ModelIndex {
            row,
            column,
            node: Rc::downgrade(node),
        }
    }

    pub fn row(&self) -> usize {
        self.row
    }

    pub fn column(&self) -> usize {
        self.column
    }

    pub fn is_valid(&self) -> bool {
        self.node.upgrade().is_some()
    }

    pub(crate) fn node(&self) -> Option<NodeRef> {
        self.node.upgrade()
    }
}

/// What a cell is being asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellRole {
    /// Caption text (column 0) or frame count (column 2)
    Display,
    /// Preview bitmap (column 1, sprite rows only)
    Decoration,
}

/// What a cell answers with
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Frames(u16),
    Preview(RgbaImage),
}

pub struct TreeModel<S: SpriteStore> {
    root: NodeRef,
    store: S,
    observers: Vec<Box<dyn ModelObserver>>,
    palette_table_addr: u32,
}

impl<S: SpriteStore> TreeModel<S> {
    /// Build a model mirroring the store: one table node per store table,
    /// one sprite node per store sprite, in store iteration order.
    pub fn new(store: S) -> Self {
        let palette_table_addr = store.palette_table_addr();
        let mut model = TreeModel {
            root: Node::root(),
            store,
            observers: Vec::new(),
            palette_table_addr,
        };
        model.build();
        model
    }

    fn build(&mut self) {
        for table in 0..self.store.table_count() {
            let table_node = Node::table(table);
            node::append_child(&self.root, &table_node);

            for sprite in 0..self.store.sprite_count(table) {
                let sprite_node = Node::sprite(sprite);
                node::append_child(&table_node, &sprite_node);
                node::refresh(&sprite_node, &self.store);
            }
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Direct store access for edits applied outside the model; callers are
    /// expected to follow structural store edits with `reset_model`.
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Mirror of the store's palette table address, updated after repoints
    pub fn palette_table_addr(&self) -> u32 {
        self.palette_table_addr
    }

    pub fn add_observer(&mut self, observer: Box<dyn ModelObserver>) {
        self.observers.push(observer);
    }

    // ---- navigation ----

    /// Resolve an index to its node; the invalid index addresses the root
    fn node_at(&self, index: &ModelIndex) -> NodeRef {
        index.node().unwrap_or_else(|| Rc::clone(&self.root))
    }

    pub fn row_count(&self, parent: &ModelIndex) -> usize {
        self.node_at(parent).borrow().child_count()
    }

    pub fn column_count(&self) -> usize {
        3
    }

    pub fn header(&self, section: usize) -> Option<&'static str> {
        match section {
            0 => Some("Sprites structure"),
            1 => Some("Preview"),
            2 => Some("Frames"),
            _ => None,
        }
    }

    /// Index of the child at `row` under `parent`; invalid if out of bounds
    pub fn index(&self, row: usize, column: usize, parent: &ModelIndex) -> ModelIndex {
        let parent_node = self.node_at(parent);
        let child = parent_node.borrow().child(row);
        match child {
            Some(child) => ModelIndex::new(row, column, &child),
            None => ModelIndex::invalid(),
        }
    }

    /// Index of a node's parent; invalid when the parent is the root
    pub fn parent(&self, index: &ModelIndex) -> ModelIndex {
        let node = self.node_at(index);
        let Some(parent_node) = node::parent_of(&node) else {
            return ModelIndex::invalid();
        };
        if Rc::ptr_eq(&parent_node, &self.root) {
            return ModelIndex::invalid();
        }
        let row = node::row_of(&parent_node).unwrap_or(0);
        ModelIndex::new(row, 0, &parent_node)
    }

    pub fn data(&self, index: &ModelIndex, role: CellRole) -> Option<CellValue> {
        let node = index.node()?;
        let node = node.borrow();

        match role {
            CellRole::Display => match index.column() {
                0 => Some(CellValue::Text(format!("{}{}", node.name(), node.id()))),
                2 if node.is_sprite() => Some(CellValue::Frames(node.frames())),
                _ => None,
            },
            CellRole::Decoration => {
                if index.column() == 1 && node.is_sprite() {
                    node.preview().cloned().map(CellValue::Preview)
                } else {
                    None
                }
            }
        }
    }

    /// Renumber a node (`Some(id)`) or re-read a sprite node's cache from
    /// the store (`None`); false for an invalid index
    pub fn set_data(&mut self, index: &ModelIndex, value: Option<usize>) -> bool {
        let Some(node) = index.node() else {
            return false;
        };
        let is_sprite = node.borrow().is_sprite();
        match value {
            Some(id) => node.borrow_mut().set_id(id),
            None if is_sprite => node::refresh(&node, &self.store),
            None => {}
        }
        true
    }

    // ---- structural mutation ----

    /// Insert `count` rows at `position` under `parent`.
    ///
    /// Under a table node this creates sprite nodes and renumbers the
    /// trailing siblings so identifiers keep tracking rows; under the root
    /// it appends a single table node whose id is the store's table count
    /// (the position argument is advisory there).
    pub fn insert_rows(&mut self, position: usize, count: usize, parent: &ModelIndex) -> bool {
        if count == 0 {
            return true;
        }
        let parent_node = self.node_at(parent);
        let (is_table, is_root, child_count) = {
            let p = parent_node.borrow();
            (p.is_table(), p.is_root(), p.child_count())
        };
        if !is_table && !is_root {
            return false;
        }

        let (first, last) = if is_root {
            (child_count, child_count)
        } else {
            (position, position + count - 1)
        };
        for obs in &mut self.observers {
            obs.begin_insert_rows(parent, first, last);
        }

        let mut success = true;
        if is_table {
            for i in 0..count {
                let sprite = Node::sprite(position + i);
                success = node::insert_child(&parent_node, position + i, &sprite) && success;
                // Load the inserted node's preview and frame count
                node::refresh(&sprite, &self.store);
            }
            // Identifiers track positions: shift every following sibling
            for row in (position + count)..(child_count + count) {
                if let Some(child) = parent_node.borrow().child(row) {
                    child.borrow_mut().set_id(row);
                }
            }
        } else {
            let table = Node::table(child_count);
            node::append_child(&parent_node, &table);
        }

        for obs in &mut self.observers {
            obs.end_insert_rows(parent, first, last);
        }
        tracing::debug!(position, count, "rows inserted");
        success
    }

    /// Remove `count` rows starting at `position` under `parent`, removing
    /// the matching store entities and renumbering the remaining siblings.
    /// A zero count is a no-op.
    pub fn remove_rows(&mut self, position: usize, count: usize, parent: &ModelIndex) -> bool {
        if count == 0 {
            return true;
        }
        let parent_node = self.node_at(parent);
        let (is_table, is_root, table_id) = {
            let p = parent_node.borrow();
            (p.is_table(), p.is_root(), p.id())
        };
        if !is_table && !is_root {
            return false;
        }

        for obs in &mut self.observers {
            obs.begin_remove_rows(parent, position, position + count - 1);
        }

        let mut success = true;
        for _ in 0..count {
            let removed = node::remove_child(&parent_node, position);
            success = removed && success;
            if !removed {
                continue;
            }
            let result = if is_table {
                self.store.remove_sprite(table_id, position)
            } else {
                self.store.remove_table(position)
            };
            if let Err(err) = result {
                tracing::warn!(%err, position, "store had no entity for the removed row");
            }
        }

        let remaining = parent_node.borrow().child_count();
        for row in position..remaining {
            if let Some(child) = parent_node.borrow().child(row) {
                child.borrow_mut().set_id(row);
            }
        }

        for obs in &mut self.observers {
            obs.end_remove_rows(parent, position, position + count - 1);
        }
        tracing::debug!(position, count, "rows removed");
        success
    }

    /// Throw the tree away and rebuild it from the current store state.
    /// Observers must invalidate every index they hold.
    pub fn reset_model(&mut self) {
        for obs in &mut self.observers {
            obs.begin_model_reset();
        }
        self.root = Node::root();
        self.build();
        for obs in &mut self.observers {
            obs.end_model_reset();
        }
        tracing::debug!(tables = self.tables_count(), "model reset");
    }

    pub fn tables_count(&self) -> usize {
        self.row_count(&ModelIndex::invalid())
    }

    pub fn sprites_count(&self, table_id: usize) -> usize {
        let table_index = self.index(table_id, 0, &ModelIndex::invalid());
        self.row_count(&table_index)
    }

    /// Re-read one sprite node's cache from the store
    pub fn init_sprite(&mut self, table_id: usize, sprite_id: usize) {
        let parent = self.index(table_id, 0, &ModelIndex::invalid());
        let sprite = self.index(sprite_id, 0, &parent);
        self.set_data(&sprite, None);
    }

    // ---- derived operations ----

    /// Create sprites in the store and mirror them in the tree. `None`
    /// appends (the new id is the current count), `Some(id)` inserts at an
    /// explicit position.
    pub fn insert_sprites(
        &mut self,
        sprite_id: Option<usize>,
        table_id: usize,
        rows: usize,
        shape: FrameShape,
        frames: u16,
    ) -> Result<()> {
        let parent = self.index(table_id, 0, &ModelIndex::invalid());
        let position = sprite_id.unwrap_or_else(|| self.row_count(&parent));

        for _ in 0..rows {
            match sprite_id {
                None => self.store.add_sprite(table_id, shape, frames)?,
                Some(id) => self.store.insert_sprite(table_id, id, shape, frames)?,
            }
        }

        self.insert_rows(position, rows, &parent);
        Ok(())
    }

    /// Remove sprites and move the presenter's current selection to the
    /// nearest surviving row (or clear it when the table emptied).
    pub fn remove_sprites(
        &mut self,
        sprite_id: usize,
        table_id: usize,
        rows: usize,
        presenter: &mut dyn Presenter,
    ) {
        let table_index = self.index(table_id, 0, &ModelIndex::invalid());
        self.remove_rows(sprite_id, rows, &table_index);

        let remaining = self.sprites_count(table_id);
        if remaining == 0 {
            presenter.set_selected_sprite(None);
            return;
        }

        let current = sprite_id.min(remaining - 1);
        presenter.set_selected_sprite(Some(current));
        presenter.selection_changed(&self.index(current, 0, &table_index));
    }

    /// Change a sprite's footprint/frame count, refresh its node, and
    /// re-notify the selection
    pub fn resize_sprite(
        &mut self,
        sprite_id: usize,
        table_id: usize,
        shape: FrameShape,
        frames: u16,
        presenter: &mut dyn Presenter,
    ) -> Result<()> {
        self.store.resize_sprite(table_id, sprite_id, shape, frames)?;

        let table_index = self.index(table_id, 0, &ModelIndex::invalid());
        let sprite_index = self.index(sprite_id, 0, &table_index);
        self.set_data(&sprite_index, None);
        presenter.selection_changed(&self.index(sprite_id, 0, &table_index));
        Ok(())
    }

    /// Register a custom table in the store and append its row; the new
    /// table becomes the current one
    pub fn insert_table(
        &mut self,
        pointers: &TablePointers,
        presenter: &mut dyn Presenter,
    ) -> Result<()> {
        self.store.register_table(pointers)?;

        let end = self.tables_count();
        self.insert_rows(end, 1, &ModelIndex::invalid());

        presenter.set_selected_table(self.tables_count().checked_sub(1));
        Ok(())
    }

    /// Remove a whole table after interactive confirmation. The selection
    /// moves to the previous table, clamped to a valid row (`None` when the
    /// store emptied); the sprite selection is always cleared.
    pub fn remove_table(&mut self, table_id: usize, presenter: &mut dyn Presenter) {
        if !presenter.confirm("Are you sure you want to delete the entire table?") {
            return;
        }

        presenter.show_status("Removing table...");
        self.remove_rows(table_id, 1, &ModelIndex::invalid());
        presenter.show_status("Ready");

        let remaining = self.store.table_count();
        if remaining == 0 {
            presenter.set_selected_table(None);
        } else {
            presenter.set_selected_table(Some(table_id.saturating_sub(1).min(remaining - 1)));
        }
        presenter.set_selected_sprite(None);
        presenter.refresh_all();
    }

    /// Repoint the palette table when no free slot is left, mirroring the
    /// new address. Exhaustion is corrected here, never surfaced.
    fn ensure_palette_capacity(&mut self) {
        if self.store.free_palette_slots() == 0 {
            self.palette_table_addr = self.store.repoint_palette_table();
            tracing::info!(addr = self.palette_table_addr, "palette table repointed before import");
        }
    }

    /// A fixed-format import requires the exact 32x32, nine-frame layout;
    /// resize and rebuild the affected node first when it differs.
    fn prepare_fixed_import(&mut self, sprite_id: usize, table_id: usize) -> Result<()> {
        let shape = self.store.frame_shape(table_id, sprite_id);
        let frames = self.store.frame_count(table_id, sprite_id);
        tracing::info!(?shape, ?frames, "sprite layout before fixed-format import");

        if shape != Some(IMPORT_SHAPE) || frames != Some(IMPORT_FRAMES) {
            tracing::info!("resizing the sprite to the import layout first");
            self.store
                .resize_sprite(table_id, sprite_id, IMPORT_SHAPE, IMPORT_FRAMES)?;
            self.init_sprite(table_id, sprite_id);
        }
        Ok(())
    }

    /// Post-import bookkeeping shared by all import variants: refresh the
    /// node, re-notify the selection, publish the new palette
    fn finish_import(&mut self, sprite_id: usize, table_id: usize, presenter: &mut dyn Presenter) {
        let table_index = self.index(table_id, 0, &ModelIndex::invalid());
        let sprite_index = self.index(sprite_id, 0, &table_index);
        self.set_data(&sprite_index, None);
        presenter.selection_changed(&self.index(sprite_id, 0, &table_index));

        if let Some(&latest) = self.store.used_palettes().last() {
            presenter.add_palette_option(latest);
        }
        presenter.refresh_palette_info();
    }

    /// Import a horizontal frame strip into a sprite, whatever its layout
    pub fn import_frames(
        &mut self,
        sheet: &RgbaImage,
        sprite_id: usize,
        table_id: usize,
        presenter: &mut dyn Presenter,
    ) -> Result<()> {
        self.ensure_palette_capacity();
        self.store.import_frames(table_id, sprite_id, sheet)?;
        self.finish_import(sprite_id, table_id, presenter);
        Ok(())
    }

    /// Import a pokemon spritesheet (3x3 grid), resizing the target to the
    /// required layout first if needed
    pub fn import_pokemon_sheet(
        &mut self,
        sheet: &RgbaImage,
        sprite_id: usize,
        table_id: usize,
        presenter: &mut dyn Presenter,
    ) -> Result<()> {
        self.ensure_palette_capacity();
        self.prepare_fixed_import(sprite_id, table_id)?;
        self.store.import_pokemon_sheet(table_id, sprite_id, sheet)?;
        self.finish_import(sprite_id, table_id, presenter);
        Ok(())
    }

    /// Import an overworld spritesheet (single row of nine frames),
    /// resizing the target to the required layout first if needed
    pub fn import_overworld_sheet(
        &mut self,
        sheet: &RgbaImage,
        sprite_id: usize,
        table_id: usize,
        presenter: &mut dyn Presenter,
    ) -> Result<()> {
        self.ensure_palette_capacity();
        self.prepare_fixed_import(sprite_id, table_id)?;
        self.store.import_overworld_sheet(table_id, sprite_id, sheet)?;
        self.finish_import(sprite_id, table_id, presenter);
        Ok(())
    }

    /// Drop unused palette slots and bring the presentation back in sync
    pub fn palette_cleanup(&mut self, presenter: &mut dyn Presenter) {
        self.store.palette_cleanup();
        presenter.reset_palette_options(&self.store.used_palettes());

        if let (Some(table_id), Some(sprite_id)) =
            (presenter.selected_table(), presenter.selected_sprite())
        {
            let table_index = self.index(table_id, 0, &ModelIndex::invalid());
            let sprite_index = self.index(sprite_id, 0, &table_index);
            self.set_data(&sprite_index, None);
            presenter.selection_changed(&self.index(sprite_id, 0, &table_index));
        }

        presenter.refresh_all();
    }
}
