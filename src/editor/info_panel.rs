use crate::scene::{NodeId, SceneGraph};
use serde::Serialize;
use std::fmt;

pub const NO_MATERIAL: &str = "None";

/// What the info panel shows for one mesh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectInfo {
    pub name: String,
    pub geometry: String,
    pub material: Option<String>,
}

impl ObjectInfo {
    pub fn of(scene: &SceneGraph, mesh: NodeId) -> Option<Self> {
        let node = scene.node(mesh)?;
        let component = node.mesh()?;
        Some(Self {
            name: node.name.clone(),
            geometry: component.geometry.kind.label().to_string(),
            material: component
                .material
                .as_ref()
                .map(|material| material.kind.label().to_string()),
        })
    }

    pub fn material_label(&self) -> &str {
        self.material.as_deref().unwrap_or(NO_MATERIAL)
    }

    pub fn lines(&self) -> [String; 4] {
        [
            "Object Info".to_string(),
            format!("Name: {}", self.name),
            format!("Geometry: {}", self.geometry),
            format!("Material: {}", self.material_label()),
        ]
    }
}

impl fmt::Display for ObjectInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.lines().join("\n"))
    }
}

/// Hovered mesh first, then the selected one, else nothing. A handle that
/// does not resolve to a mesh of `scene` is skipped.
pub fn project(
    scene: &SceneGraph,
    highlighted: Option<NodeId>,
    selected: Option<NodeId>,
) -> Option<ObjectInfo> {
    highlighted
        .and_then(|mesh| ObjectInfo::of(scene, mesh))
        .or_else(|| selected.and_then(|mesh| ObjectInfo::of(scene, mesh)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Color, Geometry, GeometryKind, Material};
    use glam::Mat4;

    fn scene() -> (SceneGraph, NodeId, NodeId) {
        let mut scene = SceneGraph::new("panel");
        let statue = scene
            .add_mesh(
                None,
                "Statue",
                Mat4::IDENTITY,
                Geometry::new(GeometryKind::Triangles, vec![[0.0; 3]]),
                Some(Material::standard(Color::WHITE)),
            )
            .unwrap();
        let wire = scene
            .add_mesh(
                None,
                "",
                Mat4::IDENTITY,
                Geometry::new(GeometryKind::Lines, vec![[0.0; 3]]),
                None,
            )
            .unwrap();
        (scene, statue, wire)
    }

    #[test]
    fn highlighted_takes_precedence() {
        let (scene, statue, wire) = scene();
        let info = project(&scene, Some(wire), Some(statue)).expect("panel visible");
        assert_eq!(info.name, "");
        assert_eq!(info.geometry, "Lines");
        assert_eq!(info.material_label(), NO_MATERIAL);
    }

    #[test]
    fn falls_back_to_selected_then_nothing() {
        let (scene, statue, _) = scene();
        let info = project(&scene, None, Some(statue)).expect("panel visible");
        assert_eq!(
            info.to_string(),
            "Object Info\nName: Statue\nGeometry: Triangles\nMaterial: MeshStandardMaterial"
        );
        assert!(project(&scene, None, None).is_none());
    }

    #[test]
    fn nodes_without_mesh_render_nothing() {
        let mut scene = SceneGraph::new("group");
        let group = scene.add_node(None, "group", Mat4::IDENTITY).unwrap();
        assert!(project(&scene, Some(group), None).is_none());
    }

    #[test]
    fn unresolvable_highlight_falls_back_to_selection() {
        let (mut panel_scene, statue, _) = scene();
        let group = panel_scene.add_node(None, "group", Mat4::IDENTITY).unwrap();
        let info = project(&panel_scene, Some(group), Some(statue)).expect("selection shown");
        assert_eq!(info.name, "Statue");

        let (_other, _, foreign_wire) = scene();
        let info = project(&panel_scene, Some(foreign_wire), Some(statue)).expect("selection shown");
        assert_eq!(info.name, "Statue");
    }
}
