// SPDX-License-Identifier: MIT OR Apache-2.0
//! Track addresses and their resolution from scene nodes.

use crate::error::{BuilderError, Result};
use crate::hierarchy::{NodeId, SceneHierarchy};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator between node names in a relation
pub const NODE_SEPARATOR: char = '/';

/// Separator between the relation and a property name
pub const PROPERTY_SEPARATOR: char = ':';

/// Address of a track target: a relation from the builder base to a node,
/// optionally followed by a property of that node
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct NodePath {
    /// Relative node path (`"."`, `"Child/Grand"`, `"../Sibling"`)
    pub relation: String,
    /// Property on the addressed node
    pub property: Option<String>,
}

impl NodePath {
    /// Address a node
    pub fn node(relation: impl Into<String>) -> Self {
        Self {
            relation: relation.into(),
            property: None,
        }
    }

    /// Address a property of a node
    pub fn property(relation: impl Into<String>, property: impl Into<String>) -> Self {
        Self {
            relation: relation.into(),
            property: Some(property.into()),
        }
    }

    /// Parse `"relation"` or `"relation:property"`
    pub fn parse(s: &str) -> Self {
        match s.split_once(PROPERTY_SEPARATOR) {
            Some((relation, property)) => Self::property(relation, property),
            None => Self::node(s),
        }
    }

    /// Whether the address is empty
    pub fn is_empty(&self) -> bool {
        self.relation.is_empty()
    }

    /// Whether this addresses some property of the node at `relation`
    pub fn is_property_of(&self, relation: &str) -> bool {
        self.property.is_some() && self.relation == relation
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.property {
            Some(property) => write!(f, "{}{}{}", self.relation, PROPERTY_SEPARATOR, property),
            None => f.write_str(&self.relation),
        }
    }
}

/// Computes addresses relative to a fixed base node
pub struct PathResolver<'h, H: SceneHierarchy + ?Sized> {
    hierarchy: &'h H,
    base: NodeId,
}

impl<'h, H: SceneHierarchy + ?Sized> PathResolver<'h, H> {
    /// Create a resolver rooted at `base`
    pub fn new(hierarchy: &'h H, base: NodeId) -> Self {
        Self { hierarchy, base }
    }

    /// The base node
    pub fn base(&self) -> NodeId {
        self.base
    }

    /// The hierarchy being resolved against
    pub fn hierarchy(&self) -> &'h H {
        self.hierarchy
    }

    /// Address `target` relative to the base
    pub fn resolve(&self, target: NodeId) -> Result<NodePath> {
        if !self.hierarchy.is_alive(target) {
            return Err(BuilderError::InvalidTarget(target));
        }
        let relation = self.hierarchy.path_between(self.base, target);
        if relation.is_empty() {
            return Err(BuilderError::UnreachableTarget(target));
        }
        Ok(NodePath::node(relation))
    }

    /// Address a readable property of `target` relative to the base
    pub fn resolve_property(&self, target: NodeId, property: &str) -> Result<NodePath> {
        let path = self.resolve(target)?;
        validate_property_name(property)?;
        if !self.hierarchy.has_property(target, property) {
            return Err(BuilderError::MissingProperty {
                target: path.relation,
                property: property.to_string(),
            });
        }
        Ok(NodePath::property(path.relation, property))
    }

    /// Resolve a relation back to a node
    pub fn node_at(&self, relation: &str) -> Result<NodeId> {
        self.hierarchy
            .node_at(self.base, relation)
            .ok_or_else(|| BuilderError::UnresolvedNode(relation.to_string()))
    }
}

fn validate_property_name(property: &str) -> Result<()> {
    if property.is_empty() {
        return Err(BuilderError::EmptyPropertyName);
    }
    if property.contains(NODE_SEPARATOR)
        || property.contains(PROPERTY_SEPARATOR)
        || property.starts_with('.')
    {
        return Err(BuilderError::MalformedPropertyName(property.to_string()));
    }
    Ok(())
}
