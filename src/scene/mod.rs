mod geometry;

pub use geometry::{
    Aabb, Color, Geometry, GeometryKind, Material, MaterialKind, Ray, UndecodedDraco,
};

use glam::Mat4;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use thiserror::Error;

static NEXT_GRAPH_ID: AtomicU32 = AtomicU32::new(1);

/// Handle referencing a node within one scene graph.
///
/// Handles carry the id of the graph that issued them, so a handle kept from a
/// previously loaded model is rejected by every later graph.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId {
    graph: u32,
    index: u32,
}

impl NodeId {
    pub const fn graph(self) -> u32 {
        self.graph
    }

    pub const fn index(self) -> u32 {
        self.index
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeshComponent {
    pub geometry: Geometry,
    pub material: Option<Material>,
    world_bounds: Option<Aabb>,
}

impl MeshComponent {
    pub fn new(geometry: Geometry, material: Option<Material>) -> Self {
        Self {
            geometry,
            material,
            world_bounds: None,
        }
    }

    pub fn world_bounds(&self) -> Option<Aabb> {
        self.world_bounds
    }
}

#[derive(Debug, Clone)]
pub struct SceneNode {
    pub name: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    local: Mat4,
    world: Mat4,
    mesh: Option<MeshComponent>,
}

impl SceneNode {
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn local_transform(&self) -> Mat4 {
        self.local
    }

    pub fn world_transform(&self) -> Mat4 {
        self.world
    }

    pub fn mesh(&self) -> Option<&MeshComponent> {
        self.mesh.as_ref()
    }
}

/// Errors returned by scene graph operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SceneError {
    #[error("node {0:?} does not belong to this scene graph")]
    NoSuchNode(NodeId),
}

/// Read/write access to mesh material colours.
///
/// The selection controller only ever touches the scene through this seam.
pub trait MaterialColors {
    fn material_color(&self, mesh: NodeId) -> Option<Color>;

    /// Returns `false` when the node is unknown or has no material.
    fn set_material_color(&mut self, mesh: NodeId, color: Color) -> bool;
}

/// Loaded model: a forest of nodes, some of which carry meshes.
#[derive(Debug, Clone)]
pub struct SceneGraph {
    id: u32,
    name: String,
    nodes: Vec<SceneNode>,
    roots: Vec<NodeId>,
}

impl SceneGraph {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: NEXT_GRAPH_ID.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
            nodes: Vec::new(),
            roots: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn add_node(
        &mut self,
        parent: Option<NodeId>,
        name: impl Into<String>,
        local: Mat4,
    ) -> Result<NodeId, SceneError> {
        let parent_world = match parent {
            Some(parent) => self.validate(parent)?.world,
            None => Mat4::IDENTITY,
        };

        let id = NodeId {
            graph: self.id,
            index: self.nodes.len() as u32,
        };
        self.nodes.push(SceneNode {
            name: name.into(),
            parent,
            children: Vec::new(),
            local,
            world: parent_world * local,
            mesh: None,
        });

        match parent {
            Some(parent) => self.nodes[parent.index as usize].children.push(id),
            None => self.roots.push(id),
        }
        Ok(id)
    }

    pub fn attach_mesh(
        &mut self,
        node: NodeId,
        geometry: Geometry,
        material: Option<Material>,
    ) -> Result<(), SceneError> {
        self.validate(node)?;
        let record = &mut self.nodes[node.index as usize];
        let mut mesh = MeshComponent::new(geometry, material);
        mesh.world_bounds = mesh
            .geometry
            .local_bounds()
            .map(|bounds| bounds.transformed(&record.world));
        record.mesh = Some(mesh);
        Ok(())
    }

    pub fn add_mesh(
        &mut self,
        parent: Option<NodeId>,
        name: impl Into<String>,
        local: Mat4,
        geometry: Geometry,
        material: Option<Material>,
    ) -> Result<NodeId, SceneError> {
        let node = self.add_node(parent, name, local)?;
        self.attach_mesh(node, geometry, material)?;
        Ok(node)
    }

    pub fn contains(&self, node: NodeId) -> bool {
        node.graph == self.id && (node.index as usize) < self.nodes.len()
    }

    pub fn node(&self, node: NodeId) -> Option<&SceneNode> {
        if !self.contains(node) {
            return None;
        }
        self.nodes.get(node.index as usize)
    }

    pub fn mesh(&self, node: NodeId) -> Option<&MeshComponent> {
        self.node(node)?.mesh.as_ref()
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Depth-first, pre-order walk over every node.
    pub fn traverse(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<NodeId> = self.roots.iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            order.push(node);
            let record = &self.nodes[node.index as usize];
            stack.extend(record.children.iter().rev().copied());
        }
        order
    }

    pub fn mesh_nodes(&self) -> Vec<NodeId> {
        self.traverse()
            .into_iter()
            .filter(|node| self.nodes[node.index as usize].mesh.is_some())
            .collect()
    }

    pub fn find_mesh(&self, name: &str) -> Option<NodeId> {
        self.mesh_nodes()
            .into_iter()
            .find(|node| self.nodes[node.index as usize].name == name)
    }

    /// Nearest mesh whose world bounds the ray enters.
    pub fn pick(&self, ray: &Ray) -> Option<NodeId> {
        self.mesh_nodes()
            .into_iter()
            .filter_map(|node| {
                let bounds = self.nodes[node.index as usize].mesh.as_ref()?.world_bounds?;
                bounds.intersect(ray).map(|distance| (node, distance))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(node, _)| node)
    }

    pub fn bounds(&self) -> Option<Aabb> {
        self.nodes
            .iter()
            .filter_map(|node| node.mesh.as_ref()?.world_bounds)
            .reduce(|acc, bounds| acc.union(&bounds))
    }

    fn validate(&self, node: NodeId) -> Result<&SceneNode, SceneError> {
        self.node(node).ok_or(SceneError::NoSuchNode(node))
    }
}

impl MaterialColors for SceneGraph {
    fn material_color(&self, mesh: NodeId) -> Option<Color> {
        self.mesh(mesh)?.material.as_ref().map(|material| material.color)
    }

    fn set_material_color(&mut self, mesh: NodeId, color: Color) -> bool {
        if !self.contains(mesh) {
            return false;
        }
        match self.nodes[mesh.index as usize]
            .mesh
            .as_mut()
            .and_then(|mesh| mesh.material.as_mut())
        {
            Some(material) => {
                material.color = color;
                true
            }
            None => false,
        }
    }
}
