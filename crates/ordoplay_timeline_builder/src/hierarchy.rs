// SPDX-License-Identifier: MIT OR Apache-2.0
//! Scene hierarchy queries consumed by the builder.
//!
//! The builder never walks the scene itself. It asks a [`SceneHierarchy`]
//! for liveness, relative paths and member capabilities. [`SceneTree`] is an
//! in-memory implementation used by scripts, the CLI and tests.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a scene node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl NodeId {
    /// Create a new random node ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

/// What a node is able to drive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NodeCapabilities {
    /// Has a 3D transform
    pub spatial: bool,
    /// Has blend shapes
    pub mesh: bool,
    /// Can play audio streams
    pub audio_player: bool,
    /// Can play named animations
    pub animation_player: bool,
}

/// Hierarchy collaborator used for addressing and validation
pub trait SceneHierarchy {
    /// Whether the node still exists
    fn is_alive(&self, node: NodeId) -> bool;

    /// Relative path from `base` to `target`.
    ///
    /// Returns an empty string when no relation exists.
    fn path_between(&self, base: NodeId, target: NodeId) -> String;

    /// Resolve a relative path from `base` back to a node
    fn node_at(&self, base: NodeId, relation: &str) -> Option<NodeId>;

    /// Whether `name` is a readable member of `node`
    fn has_property(&self, node: NodeId, name: &str) -> bool;

    /// Whether `name` is a callable method of `node`
    fn has_method(&self, node: NodeId, name: &str) -> bool;

    /// Whether `node` is an animation player holding `name`
    fn has_animation(&self, node: NodeId, name: &str) -> bool;

    /// Capability flags of `node`
    fn capabilities(&self, node: NodeId) -> NodeCapabilities;
}

/// Class of a scene node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum NodeKind {
    /// Plain node
    #[default]
    Node,
    /// Node with a 3D transform
    Spatial,
    /// Spatial node with a mesh and blend shapes
    MeshInstance,
    /// Audio stream player
    AudioPlayer,
    /// Animation player
    AnimationPlayer,
}

impl NodeKind {
    /// Capability flags implied by this kind
    pub fn capabilities(&self) -> NodeCapabilities {
        match self {
            Self::Node => NodeCapabilities::default(),
            Self::Spatial => NodeCapabilities {
                spatial: true,
                ..Default::default()
            },
            Self::MeshInstance => NodeCapabilities {
                spatial: true,
                mesh: true,
                ..Default::default()
            },
            Self::AudioPlayer => NodeCapabilities {
                audio_player: true,
                ..Default::default()
            },
            Self::AnimationPlayer => NodeCapabilities {
                animation_player: true,
                ..Default::default()
            },
        }
    }
}

/// Declarative description of a node subtree, loadable from RON
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeSpec {
    /// Node name, unique among siblings
    pub name: String,
    /// Node class
    pub kind: NodeKind,
    /// Readable members (blend shape names included for meshes)
    pub properties: Vec<String>,
    /// Callable methods
    pub methods: Vec<String>,
    /// Animation names (animation players only)
    pub animations: Vec<String>,
    /// Child nodes
    pub children: Vec<NodeSpec>,
}

/// A node in the scene tree
#[derive(Debug, Clone)]
pub struct SceneNode {
    /// Node ID
    pub id: NodeId,
    /// Node name
    pub name: String,
    /// Node class
    pub kind: NodeKind,
    /// Parent node
    pub parent: Option<NodeId>,
    /// Child nodes, in order
    pub children: Vec<NodeId>,
    /// Readable members
    pub properties: Vec<String>,
    /// Callable methods
    pub methods: Vec<String>,
    /// Animation names
    pub animations: Vec<String>,
}

/// In-memory scene hierarchy
#[derive(Debug, Clone, Default)]
pub struct SceneTree {
    nodes: IndexMap<NodeId, SceneNode>,
}

impl SceneTree {
    /// Create an empty tree
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a tree from a node description, returning it with the root's ID
    pub fn from_spec(spec: &NodeSpec) -> (Self, NodeId) {
        let mut tree = Self::new();
        let root = tree.insert_spec(None, spec);
        (tree, root)
    }

    /// Parse a [`NodeSpec`] from RON and build a tree from it
    pub fn from_ron(s: &str) -> Result<(Self, NodeId), ron::error::SpannedError> {
        let spec: NodeSpec = ron::from_str(s)?;
        Ok(Self::from_spec(&spec))
    }

    fn insert_spec(&mut self, parent: Option<NodeId>, spec: &NodeSpec) -> NodeId {
        let id = self.add_node(parent, &spec.name, spec.kind);
        if let Some(node) = self.nodes.get_mut(&id) {
            node.properties = spec.properties.clone();
            node.methods = spec.methods.clone();
            node.animations = spec.animations.clone();
        }
        for child in &spec.children {
            self.insert_spec(Some(id), child);
        }
        id
    }

    /// Add a node under `parent` (or as a new root)
    pub fn add_node(&mut self, parent: Option<NodeId>, name: impl Into<String>, kind: NodeKind) -> NodeId {
        let id = NodeId::new();
        let parent = parent.filter(|p| self.nodes.contains_key(p));
        self.nodes.insert(
            id,
            SceneNode {
                id,
                name: name.into(),
                kind,
                parent,
                children: Vec::new(),
                properties: Vec::new(),
                methods: Vec::new(),
                animations: Vec::new(),
            },
        );
        if let Some(parent) = parent.and_then(|p| self.nodes.get_mut(&p)) {
            parent.children.push(id);
        }
        id
    }

    /// Declare a readable member on a node
    pub fn add_property(&mut self, node: NodeId, name: impl Into<String>) {
        if let Some(n) = self.nodes.get_mut(&node) {
            n.properties.push(name.into());
        }
    }

    /// Declare a callable method on a node
    pub fn add_method(&mut self, node: NodeId, name: impl Into<String>) {
        if let Some(n) = self.nodes.get_mut(&node) {
            n.methods.push(name.into());
        }
    }

    /// Register an animation on an animation player node
    pub fn add_animation(&mut self, node: NodeId, name: impl Into<String>) {
        if let Some(n) = self.nodes.get_mut(&node) {
            n.animations.push(name.into());
        }
    }

    /// Destroy a node and its whole subtree
    pub fn free(&mut self, node: NodeId) {
        let Some(removed) = self.nodes.shift_remove(&node) else {
            return;
        };
        if let Some(parent) = removed.parent.and_then(|p| self.nodes.get_mut(&p)) {
            parent.children.retain(|c| *c != node);
        }
        for child in removed.children {
            self.free(child);
        }
    }

    /// Get a node
    pub fn node(&self, node: NodeId) -> Option<&SceneNode> {
        self.nodes.get(&node)
    }

    /// Find a direct child by name
    pub fn child_by_name(&self, node: NodeId, name: &str) -> Option<NodeId> {
        self.nodes
            .get(&node)?
            .children
            .iter()
            .copied()
            .find(|c| self.nodes.get(c).is_some_and(|n| n.name == name))
    }

    /// Get node count
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Chain from `node` up to its root, `node` first
    fn ancestry(&self, node: NodeId) -> Vec<NodeId> {
        let mut chain = Vec::new();
        let mut current = Some(node);
        while let Some(id) = current {
            chain.push(id);
            current = self.nodes.get(&id).and_then(|n| n.parent);
        }
        chain
    }
}

impl SceneHierarchy for SceneTree {
    fn is_alive(&self, node: NodeId) -> bool {
        self.nodes.contains_key(&node)
    }

    fn path_between(&self, base: NodeId, target: NodeId) -> String {
        if !self.is_alive(base) || !self.is_alive(target) {
            return String::new();
        }
        if base == target {
            return ".".to_string();
        }

        let base_chain = self.ancestry(base);
        let target_chain = self.ancestry(target);
        let Some((up, common)) = base_chain
            .iter()
            .enumerate()
            .find(|(_, id)| target_chain.contains(id))
        else {
            return String::new();
        };

        let mut segments: Vec<&str> = vec![".."; up];
        let down = target_chain
            .iter()
            .take_while(|id| *id != common)
            .filter_map(|id| self.nodes.get(id))
            .map(|n| n.name.as_str())
            .collect::<Vec<_>>();
        segments.extend(down.into_iter().rev());
        segments.join("/")
    }

    fn node_at(&self, base: NodeId, relation: &str) -> Option<NodeId> {
        if !self.is_alive(base) || relation.is_empty() {
            return None;
        }
        let mut current = base;
        for segment in relation.split('/') {
            current = match segment {
                "." | "" => current,
                ".." => self.nodes.get(&current)?.parent?,
                name => self.child_by_name(current, name)?,
            };
        }
        Some(current)
    }

    fn has_property(&self, node: NodeId, name: &str) -> bool {
        self.nodes
            .get(&node)
            .is_some_and(|n| n.properties.iter().any(|p| p == name))
    }

    fn has_method(&self, node: NodeId, name: &str) -> bool {
        self.nodes
            .get(&node)
            .is_some_and(|n| n.methods.iter().any(|m| m == name))
    }

    fn has_animation(&self, node: NodeId, name: &str) -> bool {
        self.nodes.get(&node).is_some_and(|n| {
            n.kind == NodeKind::AnimationPlayer && n.animations.iter().any(|a| a == name)
        })
    }

    fn capabilities(&self, node: NodeId) -> NodeCapabilities {
        self.nodes
            .get(&node)
            .map(|n| n.kind.capabilities())
            .unwrap_or_default()
    }
}
