//! Scene Graph
//!
//! Arena of nodes with parent/child links and local transforms. Nodes only
//! reference geometry/material ids; the [`ResourcePool`](super::ResourcePool)
//! owns the data. Removing a node detaches its whole subtree and hands the
//! removed nodes back so the caller can release their resources.

use std::collections::BTreeMap;

use glam::{Mat4, Quat, Vec3};

use super::color::Color;
use super::resources::{GeometryId, MaterialId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u32);

/// Light sources. Lights carry no disposable resources.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Light {
    /// Shines from the node position toward the origin
    Directional { color: Color, intensity: f32 },
    Ambient { color: Color, intensity: f32 },
}

/// What a node draws.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum NodeKind {
    Group,
    /// Triangle geometry
    Mesh { geometry: GeometryId, material: MaterialId },
    /// Line strip or line segments
    Line { geometry: GeometryId, material: MaterialId },
    /// Camera-facing quad; width/height come from the node scale
    Sprite { material: MaterialId },
    Light(Light),
}

/// Local transform (translation, rotation, scale).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }
}

#[derive(Clone, Debug)]
pub struct Node {
    pub name: String,
    pub kind: NodeKind,
    pub transform: Transform,
    pub visible: bool,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            transform: Transform::default(),
            visible: true,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn at(mut self, position: Vec3) -> Self {
        self.transform.position = position;
        self
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// Node arena rooted at a single group node.
pub struct SceneGraph {
    nodes: BTreeMap<NodeId, Node>,
    root: NodeId,
    next_id: u32,
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneGraph {
    pub fn new() -> Self {
        let root = NodeId(0);
        let mut nodes = BTreeMap::new();
        nodes.insert(root, Node::new("Scene", NodeKind::Group));
        Self {
            nodes,
            root,
            next_id: 1,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Attach `node` under `parent`. Falls back to the root if `parent` is gone.
    pub fn add(&mut self, parent: NodeId, mut node: Node) -> NodeId {
        let parent = if self.nodes.contains_key(&parent) {
            parent
        } else {
            self.root
        };
        let id = NodeId(self.next_id);
        self.next_id += 1;
        node.parent = Some(parent);
        node.children.clear();
        self.nodes.insert(id, node);
        if let Some(p) = self.nodes.get_mut(&parent) {
            p.children.push(id);
        }
        id
    }

    pub fn add_to_root(&mut self, node: Node) -> NodeId {
        self.add(self.root, node)
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Number of nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Pre-order traversal of `id` and its descendants.
    pub fn traverse(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(node) = self.nodes.get(&current) else {
                continue;
            };
            out.push(current);
            stack.extend(node.children.iter().rev().copied());
        }
        out
    }

    /// Detach and drop `id` with its subtree, returning the removed nodes.
    ///
    /// The root itself cannot be removed; its children are removed instead.
    pub fn remove(&mut self, id: NodeId) -> Vec<Node> {
        if id == self.root {
            let children = self.nodes.get(&id).map(|n| n.children.clone()).unwrap_or_default();
            return children.into_iter().flat_map(|c| self.remove(c)).collect();
        }
        let ids = self.traverse(id);
        if ids.is_empty() {
            return Vec::new();
        }
        if let Some(parent) = self.nodes.get(&id).and_then(|n| n.parent) {
            if let Some(p) = self.nodes.get_mut(&parent) {
                p.children.retain(|c| *c != id);
            }
        }
        ids.into_iter().filter_map(|n| self.nodes.remove(&n)).collect()
    }

    /// Object-to-world matrix.
    pub fn world_matrix(&self, id: NodeId) -> Mat4 {
        let mut matrix = Mat4::IDENTITY;
        let mut current = Some(id);
        while let Some(cid) = current {
            let Some(node) = self.nodes.get(&cid) else {
                break;
            };
            matrix = node.transform.matrix() * matrix;
            current = node.parent;
        }
        matrix
    }

    pub fn world_position(&self, id: NodeId) -> Vec3 {
        self.world_matrix(id).transform_point3(Vec3::ZERO)
    }

    /// A node is drawn only when it and all its ancestors are visible.
    pub fn is_visible(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(cid) = current {
            match self.nodes.get(&cid) {
                Some(node) if node.visible => current = node.parent,
                _ => return false,
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_world_position_accumulates_parents() {
        let mut graph = SceneGraph::new();
        let parent = graph.add_to_root(Node::new("parent", NodeKind::Group).at(Vec3::new(1.0, 2.0, 3.0)));
        let child = graph.add(parent, Node::new("child", NodeKind::Group).at(Vec3::new(0.0, 6.5, 0.0)));
        assert_eq!(graph.world_position(child), Vec3::new(1.0, 8.5, 3.0));
    }

    #[test]
    fn test_remove_drops_subtree() {
        let mut graph = SceneGraph::new();
        let parent = graph.add_to_root(Node::new("parent", NodeKind::Group));
        let child = graph.add(parent, Node::new("child", NodeKind::Group));
        let other = graph.add_to_root(Node::new("other", NodeKind::Group));

        let removed = graph.remove(parent);
        assert_eq!(removed.len(), 2);
        assert!(!graph.contains(child));
        assert!(graph.contains(other));
        assert_eq!(graph.get(graph.root()).unwrap().children(), &[other]);
    }

    #[test]
    fn test_hidden_parent_hides_children() {
        let mut graph = SceneGraph::new();
        let parent = graph.add_to_root(Node::new("parent", NodeKind::Group));
        let child = graph.add(parent, Node::new("child", NodeKind::Group));
        assert!(graph.is_visible(child));
        graph.get_mut(parent).unwrap().visible = false;
        assert!(!graph.is_visible(child));
    }

    #[test]
    fn test_traverse_is_preorder() {
        let mut graph = SceneGraph::new();
        let a = graph.add_to_root(Node::new("a", NodeKind::Group));
        let a1 = graph.add(a, Node::new("a1", NodeKind::Group));
        let b = graph.add_to_root(Node::new("b", NodeKind::Group));
        assert_eq!(graph.traverse(graph.root()), vec![graph.root(), a, a1, b]);
    }
}
