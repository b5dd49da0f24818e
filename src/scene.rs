//! Scene graph mirroring client surfaces
//!
//! Nodes live in an arena owned by [`SceneGraph`] and are addressed by
//! [`NodeId`]. Only tree nodes have children; the children of a tree form a
//! doubly linked list threaded through the arena, the last child being the
//! topmost one. Raising or lowering a node is therefore a constant time relink.
//!
//! Destroyed slots are recycled with a bumped generation, so an id that
//! outlived its node is reported as [`SceneError::StaleNode`] instead of
//! silently aliasing whatever took its slot.

use std::fmt;

use smithay::utils::{Logical, Point, Size};
use thiserror::Error;

use crate::surface::SurfaceId;

/// Handle to a node in the scene arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

/// Node classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Tree,
    Rect,
    Buffer,
}

impl NodeType {
    pub fn name(self) -> &'static str {
        match self {
            NodeType::Tree => "tree",
            NodeType::Rect => "rect",
            NodeType::Buffer => "buffer",
        }
    }
}

/// A child handle carrying its node type, as yielded by [`SceneGraph::children`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneNode {
    Tree(NodeId),
    Rect(NodeId),
    Buffer(NodeId),
}

impl SceneNode {
    pub fn id(self) -> NodeId {
        match self {
            SceneNode::Tree(id) | SceneNode::Rect(id) | SceneNode::Buffer(id) => id,
        }
    }

    pub fn kind(self) -> NodeType {
        match self {
            SceneNode::Tree(_) => NodeType::Tree,
            SceneNode::Rect(_) => NodeType::Rect,
            SceneNode::Buffer(_) => NodeType::Buffer,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SceneError {
    #[error("scene node {0:?} no longer exists")]
    StaleNode(NodeId),
    #[error("scene node {0:?} is not a tree")]
    NotATree(NodeId),
    #[error("scene node {0:?} has no size")]
    NoSize(NodeId),
    #[error("child index {index} out of range for a tree of {len} children")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("the scene root cannot be destroyed")]
    RootNode,
}

/// Result of a hit test
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub node: NodeId,
    /// Hit point in the coordinate space of `node`
    pub local: Point<f64, Logical>,
}

#[derive(Debug, Clone, Copy, Default)]
struct TreeLinks {
    first: Option<NodeId>,
    last: Option<NodeId>,
    len: usize,
}

#[derive(Debug, Clone)]
enum Payload {
    Tree(TreeLinks),
    Rect {
        size: Size<i32, Logical>,
        color: [f32; 4],
    },
    Buffer {
        size: Size<i32, Logical>,
        surface: Option<SurfaceId>,
    },
}

#[derive(Debug, Clone)]
struct Node {
    parent: Option<NodeId>,
    prev: Option<NodeId>,
    next: Option<NodeId>,
    position: Point<i32, Logical>,
    payload: Payload,
}

impl Node {
    fn new(position: Point<i32, Logical>, payload: Payload) -> Self {
        Self {
            parent: None,
            prev: None,
            next: None,
            position,
            payload,
        }
    }

    fn kind(&self) -> NodeType {
        match self.payload {
            Payload::Tree(_) => NodeType::Tree,
            Payload::Rect { .. } => NodeType::Rect,
            Payload::Buffer { .. } => NodeType::Buffer,
        }
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// Arena scene graph with a single root tree at the layout origin
#[derive(Debug)]
pub struct SceneGraph {
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: NodeId,
    live: usize,
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneGraph {
    pub fn new() -> Self {
        let root = NodeId {
            index: 0,
            generation: 0,
        };
        Self {
            slots: vec![Slot {
                generation: 0,
                node: Some(Node::new(Point::default(), Payload::Tree(TreeLinks::default()))),
            }],
            free: Vec::new(),
            root,
            live: 1,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of live nodes, root included
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_ok()
    }

    fn node(&self, id: NodeId) -> Result<&Node, SceneError> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
            .ok_or(SceneError::StaleNode(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, SceneError> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
            .ok_or(SceneError::StaleNode(id))
    }

    fn links(&self, id: NodeId) -> Result<TreeLinks, SceneError> {
        match self.node(id)?.payload {
            Payload::Tree(links) => Ok(links),
            _ => Err(SceneError::NotATree(id)),
        }
    }

    fn links_mut(&mut self, id: NodeId) -> Result<&mut TreeLinks, SceneError> {
        match &mut self.node_mut(id)?.payload {
            Payload::Tree(links) => Ok(links),
            _ => Err(SceneError::NotATree(id)),
        }
    }

    pub fn kind(&self, id: NodeId) -> Result<NodeType, SceneError> {
        Ok(self.node(id)?.kind())
    }

    pub fn position(&self, id: NodeId) -> Result<Point<i32, Logical>, SceneError> {
        Ok(self.node(id)?.position)
    }

    /// Position of `id` in layout coordinates
    pub fn absolute_position(&self, id: NodeId) -> Result<Point<i32, Logical>, SceneError> {
        let mut node = self.node(id)?;
        let mut position = node.position;
        while let Some(parent) = node.parent {
            node = self.node(parent)?;
            position = position + node.position;
        }
        Ok(position)
    }

    pub fn size(&self, id: NodeId) -> Result<Size<i32, Logical>, SceneError> {
        match self.node(id)?.payload {
            Payload::Tree(_) => Err(SceneError::NoSize(id)),
            Payload::Rect { size, .. } | Payload::Buffer { size, .. } => Ok(size),
        }
    }

    pub fn parent(&self, id: NodeId) -> Result<Option<NodeId>, SceneError> {
        Ok(self.node(id)?.parent)
    }

    /// Surface bound to a buffer node, if any
    pub fn surface(&self, id: NodeId) -> Result<Option<SurfaceId>, SceneError> {
        match self.node(id)?.payload {
            Payload::Buffer { surface, .. } => Ok(surface),
            _ => Ok(None),
        }
    }

    pub fn set_position(&mut self, id: NodeId, x: i32, y: i32) -> Result<(), SceneError> {
        self.node_mut(id)?.position = Point::from((x, y));
        Ok(())
    }

    pub fn set_size(&mut self, id: NodeId, width: i32, height: i32) -> Result<(), SceneError> {
        match &mut self.node_mut(id)?.payload {
            Payload::Tree(_) => Err(SceneError::NoSize(id)),
            Payload::Rect { size, .. } | Payload::Buffer { size, .. } => {
                *size = Size::from((width, height));
                Ok(())
            }
        }
    }

    pub fn append_tree(&mut self, parent: NodeId, x: i32, y: i32) -> Result<NodeId, SceneError> {
        self.append(
            parent,
            Node::new(Point::from((x, y)), Payload::Tree(TreeLinks::default())),
        )
    }

    pub fn append_rect(
        &mut self,
        parent: NodeId,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        color: [f32; 4],
    ) -> Result<NodeId, SceneError> {
        self.append(
            parent,
            Node::new(
                Point::from((x, y)),
                Payload::Rect {
                    size: Size::from((width, height)),
                    color,
                },
            ),
        )
    }

    pub fn append_buffer(
        &mut self,
        parent: NodeId,
        x: i32,
        y: i32,
        size: Size<i32, Logical>,
    ) -> Result<NodeId, SceneError> {
        self.append(
            parent,
            Node::new(
                Point::from((x, y)),
                Payload::Buffer {
                    size,
                    surface: None,
                },
            ),
        )
    }

    /// Attach a surface: a tree holding a single buffer node bound to `surface`.
    ///
    /// Returns the tree; the buffer is its first child. The buffer starts
    /// empty and takes its size from the surface's commits.
    pub fn append_surface(
        &mut self,
        parent: NodeId,
        surface: SurfaceId,
    ) -> Result<NodeId, SceneError> {
        let tree = self.append_tree(parent, 0, 0)?;
        self.append(
            tree,
            Node::new(
                Point::default(),
                Payload::Buffer {
                    size: Size::default(),
                    surface: Some(surface),
                },
            ),
        )?;
        Ok(tree)
    }

    fn append(&mut self, parent: NodeId, node: Node) -> Result<NodeId, SceneError> {
        // Validate before allocating so a bad parent doesn't leak a slot.
        self.links(parent)?;
        let id = self.alloc(node);
        self.link_last(parent, id)?;
        Ok(id)
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            return NodeId {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            node: Some(node),
        });
        NodeId {
            index,
            generation: 0,
        }
    }

    fn link_last(&mut self, parent: NodeId, id: NodeId) -> Result<(), SceneError> {
        let last = self.links(parent)?.last;
        {
            let node = self.node_mut(id)?;
            node.parent = Some(parent);
            node.prev = last;
            node.next = None;
        }
        if let Some(last) = last {
            self.node_mut(last)?.next = Some(id);
        }
        let links = self.links_mut(parent)?;
        if links.first.is_none() {
            links.first = Some(id);
        }
        links.last = Some(id);
        links.len += 1;
        Ok(())
    }

    fn link_first(&mut self, parent: NodeId, id: NodeId) -> Result<(), SceneError> {
        let first = self.links(parent)?.first;
        {
            let node = self.node_mut(id)?;
            node.parent = Some(parent);
            node.prev = None;
            node.next = first;
        }
        if let Some(first) = first {
            self.node_mut(first)?.prev = Some(id);
        }
        let links = self.links_mut(parent)?;
        if links.last.is_none() {
            links.last = Some(id);
        }
        links.first = Some(id);
        links.len += 1;
        Ok(())
    }

    /// Detach `id` from its parent's child list, returning the former parent.
    fn unlink(&mut self, id: NodeId) -> Result<Option<NodeId>, SceneError> {
        let (parent, prev, next) = {
            let node = self.node(id)?;
            (node.parent, node.prev, node.next)
        };
        let Some(parent) = parent else {
            return Ok(None);
        };

        match prev {
            Some(prev) => self.node_mut(prev)?.next = next,
            None => self.links_mut(parent)?.first = next,
        }
        match next {
            Some(next) => self.node_mut(next)?.prev = prev,
            None => self.links_mut(parent)?.last = prev,
        }
        self.links_mut(parent)?.len -= 1;

        let node = self.node_mut(id)?;
        node.parent = None;
        node.prev = None;
        node.next = None;
        Ok(Some(parent))
    }

    /// Children of `id` front to back (bottommost first)
    pub fn children(&self, id: NodeId) -> Result<Children<'_>, SceneError> {
        Ok(Children {
            scene: self,
            next: self.links(id)?.first,
        })
    }

    pub fn child(&self, id: NodeId, index: usize) -> Result<SceneNode, SceneError> {
        let len = self.child_count(id)?;
        self.children(id)?
            .nth(index)
            .ok_or(SceneError::IndexOutOfRange { index, len })
    }

    pub fn child_count(&self, id: NodeId) -> Result<usize, SceneError> {
        Ok(self.links(id)?.len)
    }

    /// Make `id` the topmost child of its parent. No-op for the root.
    pub fn raise_to_top(&mut self, id: NodeId) -> Result<(), SceneError> {
        let node = self.node(id)?;
        let Some(parent) = node.parent else {
            return Ok(());
        };
        if node.next.is_none() {
            return Ok(());
        }
        self.unlink(id)?;
        self.link_last(parent, id)
    }

    /// Make `id` the bottommost child of its parent. No-op for the root.
    pub fn lower_to_bottom(&mut self, id: NodeId) -> Result<(), SceneError> {
        let node = self.node(id)?;
        let Some(parent) = node.parent else {
            return Ok(());
        };
        if node.prev.is_none() {
            return Ok(());
        }
        self.unlink(id)?;
        self.link_first(parent, id)
    }

    /// Destroy `id` together with its whole subtree.
    pub fn destroy(&mut self, id: NodeId) -> Result<(), SceneError> {
        if id == self.root {
            return Err(SceneError::RootNode);
        }
        self.unlink(id)?;

        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Ok(links) = self.links(current) {
                let mut child = links.first;
                while let Some(next) = child {
                    child = self.node(next)?.next;
                    stack.push(next);
                }
            }
            let slot = &mut self.slots[current.index as usize];
            slot.node = None;
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(current.index);
            self.live -= 1;
        }
        Ok(())
    }

    /// Find the topmost, deepest paintable node under `point` (layout coordinates).
    pub fn node_at(&self, point: Point<f64, Logical>) -> Option<Hit> {
        self.hit(self.root, point)
    }

    fn hit(&self, id: NodeId, point: Point<f64, Logical>) -> Option<Hit> {
        let node = self.node(id).ok()?;
        let local = point - node.position.to_f64();
        match &node.payload {
            Payload::Tree(links) => {
                let mut child = links.last;
                while let Some(current) = child {
                    if let Some(hit) = self.hit(current, local) {
                        return Some(hit);
                    }
                    child = self.node(current).ok()?.prev;
                }
                None
            }
            Payload::Rect { size, .. } | Payload::Buffer { size, .. } => {
                let inside = size.w > 0
                    && size.h > 0
                    && local.x >= 0.0
                    && local.y >= 0.0
                    && local.x < f64::from(size.w)
                    && local.y < f64::from(size.h);
                inside.then_some(Hit { node: id, local })
            }
        }
    }

    /// Textual rendering of the whole tree, one node per line
    pub fn dump(&self) -> String {
        self.to_string()
    }

    fn fmt_node(&self, f: &mut fmt::Formatter<'_>, id: NodeId, depth: usize) -> fmt::Result {
        let Ok(node) = self.node(id) else {
            return Ok(());
        };
        let indent = "  ".repeat(depth);
        let (x, y) = (node.position.x, node.position.y);
        match &node.payload {
            Payload::Tree(links) => {
                writeln!(f, "{indent}tree ({x}, {y})")?;
                let mut child = links.first;
                while let Some(current) = child {
                    self.fmt_node(f, current, depth + 1)?;
                    child = self.node(current).ok().and_then(|node| node.next);
                }
                Ok(())
            }
            Payload::Rect { size, color } => writeln!(
                f,
                "{indent}rect ({x}, {y}) {}x{} {:?}",
                size.w, size.h, color
            ),
            Payload::Buffer { size, surface } => {
                write!(f, "{indent}buffer ({x}, {y}) {}x{}", size.w, size.h)?;
                match surface {
                    Some(surface) => writeln!(f, " surface={surface}"),
                    None => writeln!(f),
                }
            }
        }
    }
}

impl fmt::Display for SceneGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_node(f, self.root, 0)
    }
}

/// Lazy iterator over the children of a tree node
#[derive(Clone)]
pub struct Children<'a> {
    scene: &'a SceneGraph,
    next: Option<NodeId>,
}

impl Iterator for Children<'_> {
    type Item = SceneNode;

    fn next(&mut self) -> Option<SceneNode> {
        let id = self.next?;
        let node = self.scene.node(id).ok()?;
        self.next = node.next;
        Some(match node.kind() {
            NodeType::Tree => SceneNode::Tree(id),
            NodeType::Rect => SceneNode::Rect(id),
            NodeType::Buffer => SceneNode::Buffer(id),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: [f32; 4] = [1.0, 0.0, 0.0, 1.0];

    fn ids(scene: &SceneGraph, parent: NodeId) -> Vec<NodeId> {
        scene.children(parent).unwrap().map(SceneNode::id).collect()
    }

    #[test]
    fn new_scene_has_empty_root() {
        let scene = SceneGraph::new();
        assert_eq!(scene.kind(scene.root()), Ok(NodeType::Tree));
        assert_eq!(scene.child_count(scene.root()), Ok(0));
        assert_eq!(scene.parent(scene.root()), Ok(None));
        assert!(scene.is_empty());
    }

    #[test]
    fn append_keeps_insertion_order() {
        let mut scene = SceneGraph::new();
        let root = scene.root();
        let a = scene.append_tree(root, 0, 0).unwrap();
        let b = scene.append_rect(root, 1, 2, 3, 4, RED).unwrap();
        let c = scene.append_buffer(root, 0, 0, Size::from((5, 5))).unwrap();

        assert_eq!(ids(&scene, root), vec![a, b, c]);
        assert_eq!(scene.child(root, 1).unwrap(), SceneNode::Rect(b));
        assert_eq!(scene.parent(b), Ok(Some(root)));
        assert_eq!(scene.size(b), Ok(Size::from((3, 4))));
        assert_eq!(scene.position(b), Ok(Point::from((1, 2))));
    }

    #[test]
    fn children_iterator_is_restartable() {
        let mut scene = SceneGraph::new();
        let root = scene.root();
        scene.append_tree(root, 0, 0).unwrap();
        scene.append_tree(root, 0, 0).unwrap();

        let children = scene.children(root).unwrap();
        assert_eq!(children.clone().count(), 2);
        assert_eq!(children.count(), 2);
    }

    #[test]
    fn child_index_out_of_range() {
        let mut scene = SceneGraph::new();
        let root = scene.root();
        scene.append_tree(root, 0, 0).unwrap();
        assert_eq!(
            scene.child(root, 3),
            Err(SceneError::IndexOutOfRange { index: 3, len: 1 })
        );
    }

    #[test]
    fn leaves_have_no_children() {
        let mut scene = SceneGraph::new();
        let rect = scene.append_rect(scene.root(), 0, 0, 1, 1, RED).unwrap();
        assert_eq!(scene.child_count(rect), Err(SceneError::NotATree(rect)));
        assert!(matches!(scene.children(rect), Err(SceneError::NotATree(_))));
        assert_eq!(
            scene.append_tree(rect, 0, 0),
            Err(SceneError::NotATree(rect))
        );
        // Failed append must not consume a slot.
        assert_eq!(scene.len(), 2);
    }

    #[test]
    fn tree_has_no_size() {
        let mut scene = SceneGraph::new();
        let tree = scene.append_tree(scene.root(), 0, 0).unwrap();
        assert_eq!(scene.set_size(tree, 10, 10), Err(SceneError::NoSize(tree)));
        assert_eq!(scene.size(tree), Err(SceneError::NoSize(tree)));
    }

    #[test]
    fn raise_and_lower_relink() {
        let mut scene = SceneGraph::new();
        let root = scene.root();
        let a = scene.append_tree(root, 0, 0).unwrap();
        let b = scene.append_tree(root, 0, 0).unwrap();
        let c = scene.append_tree(root, 0, 0).unwrap();

        scene.raise_to_top(a).unwrap();
        assert_eq!(ids(&scene, root), vec![b, c, a]);
        scene.raise_to_top(a).unwrap();
        assert_eq!(ids(&scene, root), vec![b, c, a]);

        scene.lower_to_bottom(c).unwrap();
        assert_eq!(ids(&scene, root), vec![c, b, a]);
        scene.lower_to_bottom(c).unwrap();
        assert_eq!(ids(&scene, root), vec![c, b, a]);
        assert_eq!(scene.child_count(root), Ok(3));

        // Root has no siblings
        scene.raise_to_top(root).unwrap();
        scene.lower_to_bottom(root).unwrap();
    }

    #[test]
    fn raise_keeps_subtree() {
        let mut scene = SceneGraph::new();
        let root = scene.root();
        let a = scene.append_surface(root, SurfaceId(0xa)).unwrap();
        let popup = scene.append_surface(a, SurfaceId(0xb)).unwrap();
        scene.append_tree(root, 0, 0).unwrap();

        scene.raise_to_top(a).unwrap();
        assert_eq!(scene.parent(popup), Ok(Some(a)));
        assert_eq!(scene.child_count(a), Ok(2));
    }

    #[test]
    fn destroy_frees_subtree_and_detects_stale_ids() {
        let mut scene = SceneGraph::new();
        let root = scene.root();
        let a = scene.append_surface(root, SurfaceId(1)).unwrap();
        let buffer = scene.child(a, 0).unwrap().id();
        let nested = scene.append_tree(a, 0, 0).unwrap();
        let keep = scene.append_tree(root, 0, 0).unwrap();

        scene.destroy(a).unwrap();
        assert_eq!(ids(&scene, root), vec![keep]);
        for id in [a, buffer, nested] {
            assert_eq!(scene.kind(id), Err(SceneError::StaleNode(id)));
        }

        // Slot reuse must not revive old ids
        let fresh = scene.append_tree(root, 0, 0).unwrap();
        assert!(scene.contains(fresh));
        assert!(!scene.contains(a));
        assert_eq!(scene.len(), 3);
    }

    #[test]
    fn root_cannot_be_destroyed() {
        let mut scene = SceneGraph::new();
        assert_eq!(scene.destroy(scene.root()), Err(SceneError::RootNode));
    }

    #[test]
    fn append_surface_binds_buffer() {
        let mut scene = SceneGraph::new();
        let tree = scene.append_surface(scene.root(), SurfaceId(0x42)).unwrap();
        let buffer = scene.child(tree, 0).unwrap();
        assert_eq!(buffer.kind(), NodeType::Buffer);
        assert_eq!(scene.surface(buffer.id()), Ok(Some(SurfaceId(0x42))));
        assert_eq!(scene.surface(tree), Ok(None));
    }

    #[test]
    fn hit_test_prefers_topmost() {
        let mut scene = SceneGraph::new();
        let root = scene.root();
        let bottom = scene.append_rect(root, 0, 0, 100, 100, RED).unwrap();
        let top = scene.append_rect(root, 50, 50, 100, 100, RED).unwrap();

        let hit = scene.node_at(Point::from((60.0, 70.0))).unwrap();
        assert_eq!(hit.node, top);
        assert_eq!(hit.local, Point::from((10.0, 20.0)));

        assert_eq!(scene.node_at(Point::from((10.0, 10.0))).unwrap().node, bottom);
        assert!(scene.node_at(Point::from((200.0, 10.0))).is_none());

        scene.raise_to_top(bottom).unwrap();
        assert_eq!(scene.node_at(Point::from((60.0, 70.0))).unwrap().node, bottom);
    }

    #[test]
    fn hit_test_descends_with_local_coordinates() {
        let mut scene = SceneGraph::new();
        let root = scene.root();
        let tree = scene.append_tree(root, 100, 100).unwrap();
        let inner = scene.append_tree(tree, 10, 10).unwrap();
        let buffer = scene
            .append_buffer(inner, 5, 5, Size::from((20, 20)))
            .unwrap();

        let hit = scene.node_at(Point::from((120.0, 121.0))).unwrap();
        assert_eq!(hit.node, buffer);
        assert_eq!(hit.local, Point::from((5.0, 6.0)));
        assert_eq!(scene.absolute_position(buffer), Ok(Point::from((115, 115))));
    }

    #[test]
    fn zero_sized_nodes_are_never_hit() {
        let mut scene = SceneGraph::new();
        let tree = scene.append_surface(scene.root(), SurfaceId(1)).unwrap();
        assert!(scene.node_at(Point::from((0.0, 0.0))).is_none());

        let buffer = scene.child(tree, 0).unwrap().id();
        scene.set_size(buffer, 10, 10).unwrap();
        assert_eq!(scene.node_at(Point::from((0.0, 0.0))).unwrap().node, buffer);
    }

    #[test]
    fn dump_snapshot() {
        let mut scene = SceneGraph::new();
        let root = scene.root();
        let desktop = scene.append_surface(root, SurfaceId(0x10)).unwrap();
        let buffer = scene.child(desktop, 0).unwrap().id();
        scene.set_size(buffer, 1920, 1080).unwrap();
        let popup = scene.append_surface(desktop, SurfaceId(0x20)).unwrap();
        scene.set_position(popup, 40, 30).unwrap();
        scene.append_rect(root, 5, 5, 2, 2, RED).unwrap();

        insta::assert_snapshot!(scene.dump().trim_end(), @r"
        tree (0, 0)
          tree (0, 0)
            buffer (0, 0) 1920x1080 surface=0x10
            tree (40, 30)
              buffer (0, 0) 0x0 surface=0x20
          rect (5, 5) 2x2 [1.0, 0.0, 0.0, 1.0]
        ");
    }
}
