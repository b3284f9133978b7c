/// Tree nodes
///
/// The tree owns its nodes downward: children are `Rc<RefCell<Node>>`, the
/// parent back-reference is a `Weak` handle so no ownership cycle exists.
/// A node's position among its siblings is the authoritative row; the node
/// itself never renumbers anything, that is the model's job.
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use image::RgbaImage;

use crate::store::SpriteStore;

/// Shared handle to a tree node
pub type NodeRef = Rc<RefCell<Node>>;

/// Closed set of node variants.
///
/// Sprite nodes carry their cached preview and frame count; table nodes and
/// the synthetic root have no payload beyond identity and name.
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// Synthetic anchor with no store counterpart
    Root,
    /// A table row: its id is the store's table index
    Table,
    /// A sprite row: its id is the store's sprite index within the table
    Sprite {
        frames: u16,
        preview: Option<RgbaImage>,
    },
}

#[derive(Debug)]
pub struct Node {
    id: usize,
    name: String,
    kind: NodeKind,
    children: Vec<NodeRef>,
    parent: Weak<RefCell<Node>>,
}

impl Node {
    fn new(id: usize, name: &str, kind: NodeKind) -> NodeRef {
        Rc::new(RefCell::new(Node {
            id,
            name: name.to_string(),
            kind,
            children: Vec::new(),
            parent: Weak::new(),
        }))
    }

    /// The synthetic tree root
    pub fn root() -> NodeRef {
        Node::new(0, "root", NodeKind::Root)
    }

    /// A table node
    pub fn table(id: usize) -> NodeRef {
        Node::new(id, "Table ", NodeKind::Table)
    }

    /// A sprite node with an uninitialized cache (refresh fills it in)
    pub fn sprite(id: usize) -> NodeRef {
        Node::new(
            id,
            "Sprite ",
            NodeKind::Sprite {
                frames: 0,
                preview: None,
            },
        )
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn set_id(&mut self, id: usize) {
        self.id = id;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn is_root(&self) -> bool {
        matches!(self.kind, NodeKind::Root)
    }

    pub fn is_table(&self) -> bool {
        matches!(self.kind, NodeKind::Table)
    }

    pub fn is_sprite(&self) -> bool {
        matches!(self.kind, NodeKind::Sprite { .. })
    }

    /// Cached frame count (0 for non-sprite nodes)
    pub fn frames(&self) -> u16 {
        match self.kind {
            NodeKind::Sprite { frames, .. } => frames,
            _ => 0,
        }
    }

    /// Cached preview (sprite nodes only)
    pub fn preview(&self) -> Option<&RgbaImage> {
        match &self.kind {
            NodeKind::Sprite { preview, .. } => preview.as_ref(),
            _ => None,
        }
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    pub fn child(&self, row: usize) -> Option<NodeRef> {
        self.children.get(row).cloned()
    }

    fn dump(&self, depth: usize, out: &mut fmt::Formatter<'_>) -> fmt::Result {
        for _ in 0..depth {
            write!(out, "\t")?;
        }
        writeln!(out, "|------{}{}", self.name, self.id)?;
        for child in &self.children {
            child.borrow().dump(depth + 1, out)?;
        }
        Ok(())
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.dump(0, f)
    }
}

/// Append a child and set its parent back-reference
pub fn append_child(parent: &NodeRef, child: &NodeRef) {
    parent.borrow_mut().children.push(Rc::clone(child));
    child.borrow_mut().parent = Rc::downgrade(parent);
}

/// Insert a child at a position; false if the position is past the end.
/// Sibling identifiers are left alone, renumbering is the model's job.
pub fn insert_child(parent: &NodeRef, position: usize, child: &NodeRef) -> bool {
    if position > parent.borrow().child_count() {
        return false;
    }
    parent.borrow_mut().children.insert(position, Rc::clone(child));
    child.borrow_mut().parent = Rc::downgrade(parent);
    true
}

/// Detach the child at a position, clearing its parent link; false if the
/// position addresses no child
pub fn remove_child(parent: &NodeRef, position: usize) -> bool {
    if position >= parent.borrow().child_count() {
        return false;
    }
    let child = parent.borrow_mut().children.remove(position);
    child.borrow_mut().parent = Weak::new();
    true
}

/// Upgrade a node's parent back-reference
pub fn parent_of(node: &NodeRef) -> Option<NodeRef> {
    node.borrow().parent.upgrade()
}

/// Position of a node among its siblings; None for a detached node or root
pub fn row_of(node: &NodeRef) -> Option<usize> {
    let parent = parent_of(node)?;
    let row = parent
        .borrow()
        .children
        .iter()
        .position(|c| Rc::ptr_eq(c, node));
    row
}

/// Re-read a sprite node's cached preview and frame count from the store.
///
/// Coordinates come from the tree itself: the parent's id is the table, the
/// node's own id the sprite. Idempotent; a detached node keeps its defaults.
pub fn refresh<S: SpriteStore>(node: &NodeRef, store: &S) {
    let Some(parent) = parent_of(node) else {
        return;
    };
    let table_id = parent.borrow().id();
    let sprite_id = node.borrow().id();

    let new_preview = store.frame_preview(table_id, sprite_id, 0);
    let new_frames = store.frame_count(table_id, sprite_id).unwrap_or(0);

    if let NodeKind::Sprite { frames, preview } = &mut node.borrow_mut().kind {
        *frames = new_frames;
        *preview = new_preview;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use crate::store::FrameShape;

    #[test]
    fn test_append_sets_parent() {
        let root = Node::root();
        let table = Node::table(0);
        append_child(&root, &table);

        assert_eq!(root.borrow().child_count(), 1);
        assert!(Rc::ptr_eq(&parent_of(&table).unwrap(), &root));
        assert_eq!(row_of(&table), Some(0));
        assert_eq!(row_of(&root), None);
    }

    #[test]
    fn test_insert_child_bounds() {
        let table = Node::table(0);
        let a = Node::sprite(0);
        let b = Node::sprite(1);

        assert!(insert_child(&table, 0, &a));
        assert!(insert_child(&table, 1, &b));
        // One past the end is rejected
        assert!(!insert_child(&table, 5, &Node::sprite(2)));
        assert_eq!(table.borrow().child_count(), 2);
    }

    #[test]
    fn test_remove_child_orphans() {
        let table = Node::table(0);
        let sprite = Node::sprite(0);
        append_child(&table, &sprite);

        assert!(!remove_child(&table, 1));
        assert!(remove_child(&table, 0));
        assert_eq!(table.borrow().child_count(), 0);
        assert!(parent_of(&sprite).is_none());
    }

    #[test]
    fn test_refresh_reads_store_at_own_coordinates() {
        let mut store = MemoryStore::new();
        store.add_table();
        store.add_sprite(0, FrameShape::S16x32, 4).unwrap();

        let root = Node::root();
        let table = Node::table(0);
        let sprite = Node::sprite(0);
        append_child(&root, &table);
        append_child(&table, &sprite);

        refresh(&sprite, &store);
        assert_eq!(sprite.borrow().frames(), 4);
        assert!(sprite.borrow().preview().is_some());
    }

    #[test]
    fn test_refresh_detached_keeps_defaults() {
        let store = MemoryStore::new();
        let sprite = Node::sprite(0);

        refresh(&sprite, &store);
        assert_eq!(sprite.borrow().frames(), 0);
        assert!(sprite.borrow().preview().is_none());
    }

    #[test]
    fn test_dump_shows_tree_shape() {
        let root = Node::root();
        let table = Node::table(0);
        append_child(&root, &table);
        append_child(&table, &Node::sprite(0));

        let dump = format!("{}", root.borrow());
        assert!(dump.contains("|------root0"));
        assert!(dump.contains("\t|------Table 0"));
        assert!(dump.contains("\t\t|------Sprite 0"));
    }
}
