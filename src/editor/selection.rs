use crate::scene::{Color, MaterialColors, NodeId};

/// Hover tint: every channel is scaled by 4/5 (0.8), truncated.
pub const HIGHLIGHT_SCALE: (u8, u8) = (4, 5);

pub fn darken(color: Color) -> Color {
    color.scaled(HIGHLIGHT_SCALE.0, HIGHLIGHT_SCALE.1)
}

/// Mesh currently under the pointer together with the colour it had before
/// the tint was applied. `original` is `None` for meshes without a material.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Highlight {
    pub mesh: NodeId,
    pub original: Option<Color>,
}

/// Tracks hover and click state and projects the hover tint onto the scene.
///
/// The controller's record is the source of truth: the scene only ever sees
/// either the captured original colour or its darkened form. At most one mesh
/// is tinted at a time.
#[derive(Debug, Default, Clone)]
pub struct SelectionController {
    highlighted: Option<Highlight>,
    selected: Option<NodeId>,
    suspended: bool,
}

impl SelectionController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn highlighted(&self) -> Option<NodeId> {
        self.highlighted.map(|highlight| highlight.mesh)
    }

    pub fn highlight(&self) -> Option<&Highlight> {
        self.highlighted.as_ref()
    }

    pub fn selected(&self) -> Option<NodeId> {
        self.selected
    }

    /// Hovered mesh wins over the selected one.
    pub fn displayed(&self) -> Option<NodeId> {
        self.highlighted().or(self.selected)
    }

    pub fn on_hover<S>(&mut self, scene: &mut S, mesh: Option<NodeId>)
    where
        S: MaterialColors + ?Sized,
    {
        if mesh.is_some() && mesh == self.highlighted() {
            return;
        }

        self.restore(scene);

        if let Some(mesh) = mesh {
            let original = scene.material_color(mesh);
            if let Some(original) = original {
                if !self.suspended {
                    scene.set_material_color(mesh, darken(original));
                }
            }
            log::debug!("[selection] highlight {:?} (original {:?})", mesh, original);
            self.highlighted = Some(Highlight { mesh, original });
        }
    }

    pub fn on_click(&mut self, mesh: NodeId) {
        log::debug!("[selection] select {:?}", mesh);
        self.selected = Some(mesh);
    }

    /// Puts the captured original colour back without forgetting the hover.
    pub fn suspend<S>(&mut self, scene: &mut S)
    where
        S: MaterialColors + ?Sized,
    {
        if self.suspended {
            return;
        }
        if let Some(Highlight {
            mesh,
            original: Some(original),
        }) = self.highlighted
        {
            scene.set_material_color(mesh, original);
        }
        self.suspended = true;
    }

    /// Re-applies the tint after [`suspend`](Self::suspend).
    pub fn resume<S>(&mut self, scene: &mut S)
    where
        S: MaterialColors + ?Sized,
    {
        if !self.suspended {
            return;
        }
        self.suspended = false;
        if let Some(Highlight {
            mesh,
            original: Some(original),
        }) = self.highlighted
        {
            scene.set_material_color(mesh, darken(original));
        }
    }

    /// Forgets both states without touching any scene. Used when the scene the
    /// handles point into has been replaced.
    pub fn reset(&mut self) {
        self.highlighted = None;
        self.selected = None;
        self.suspended = false;
    }

    fn restore<S>(&mut self, scene: &mut S)
    where
        S: MaterialColors + ?Sized,
    {
        if let Some(previous) = self.highlighted.take() {
            if let Some(original) = previous.original {
                if !scene.set_material_color(previous.mesh, original) {
                    log::debug!(
                        "[selection] {:?} no longer has a material to restore",
                        previous.mesh
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Geometry, GeometryKind, Material, SceneGraph};
    use glam::Mat4;

    fn scene_with(colors: &[Option<Color>]) -> (SceneGraph, Vec<NodeId>) {
        let mut scene = SceneGraph::new("selection");
        let ids = colors
            .iter()
            .enumerate()
            .map(|(index, color)| {
                scene
                    .add_mesh(
                        None,
                        format!("mesh-{index}"),
                        Mat4::IDENTITY,
                        Geometry::new(GeometryKind::Triangles, vec![[0.0; 3]]),
                        color.map(Material::standard),
                    )
                    .expect("mesh added")
            })
            .collect();
        (scene, ids)
    }

    #[test]
    fn hover_darkens_by_four_fifths() {
        let (mut scene, ids) = scene_with(&[Some(Color::new(200, 100, 50))]);
        let mut controller = SelectionController::new();

        controller.on_hover(&mut scene, Some(ids[0]));

        assert_eq!(scene.material_color(ids[0]), Some(Color::new(160, 80, 40)));
        assert_eq!(controller.highlighted(), Some(ids[0]));
    }

    #[test]
    fn repeated_hover_does_not_compound() {
        let (mut scene, ids) = scene_with(&[Some(Color::new(200, 100, 50))]);
        let mut controller = SelectionController::new();

        controller.on_hover(&mut scene, Some(ids[0]));
        controller.on_hover(&mut scene, Some(ids[0]));
        controller.on_hover(&mut scene, Some(ids[0]));

        assert_eq!(scene.material_color(ids[0]), Some(Color::new(160, 80, 40)));
        assert_eq!(
            controller.highlight().and_then(|highlight| highlight.original),
            Some(Color::new(200, 100, 50))
        );
    }

    #[test]
    fn moving_hover_restores_previous_mesh() {
        let a = Color::new(10, 20, 30);
        let b = Color::new(100, 150, 250);
        let (mut scene, ids) = scene_with(&[Some(a), Some(b)]);
        let mut controller = SelectionController::new();

        controller.on_hover(&mut scene, Some(ids[0]));
        controller.on_hover(&mut scene, Some(ids[1]));

        assert_eq!(scene.material_color(ids[0]), Some(a));
        assert_eq!(scene.material_color(ids[1]), Some(darken(b)));

        controller.on_hover(&mut scene, None);
        assert_eq!(scene.material_color(ids[1]), Some(b));
        assert_eq!(controller.highlighted(), None);
    }

    #[test]
    fn click_then_hover_elsewhere_keeps_selection() {
        let (mut scene, ids) = scene_with(&[Some(Color::WHITE), Some(Color::WHITE)]);
        let mut controller = SelectionController::new();

        controller.on_click(ids[0]);
        controller.on_hover(&mut scene, Some(ids[1]));
        assert_eq!(controller.displayed(), Some(ids[1]));

        controller.on_hover(&mut scene, None);
        assert_eq!(controller.selected(), Some(ids[0]));
        assert_eq!(controller.highlighted(), None);
        assert_eq!(controller.displayed(), Some(ids[0]));
    }

    #[test]
    fn hover_without_material_is_tracked_but_not_tinted() {
        let (mut scene, ids) = scene_with(&[None, Some(Color::WHITE)]);
        let mut controller = SelectionController::new();

        controller.on_hover(&mut scene, Some(ids[0]));
        assert_eq!(controller.highlighted(), Some(ids[0]));
        assert_eq!(scene.material_color(ids[0]), None);

        controller.on_hover(&mut scene, Some(ids[1]));
        assert_eq!(scene.material_color(ids[1]), Some(darken(Color::WHITE)));
    }

    #[test]
    fn suspend_and_resume_toggle_the_tint() {
        let original = Color::new(50, 60, 70);
        let (mut scene, ids) = scene_with(&[Some(original)]);
        let mut controller = SelectionController::new();
        controller.on_hover(&mut scene, Some(ids[0]));

        controller.suspend(&mut scene);
        assert_eq!(scene.material_color(ids[0]), Some(original));
        controller.suspend(&mut scene);
        assert_eq!(scene.material_color(ids[0]), Some(original));

        controller.resume(&mut scene);
        assert_eq!(scene.material_color(ids[0]), Some(darken(original)));

        controller.on_hover(&mut scene, None);
        assert_eq!(scene.material_color(ids[0]), Some(original));
    }

    #[test]
    fn hover_none_with_nothing_highlighted_is_harmless() {
        let (mut scene, ids) = scene_with(&[Some(Color::WHITE)]);
        let mut controller = SelectionController::new();
        controller.on_hover(&mut scene, None);
        assert_eq!(scene.material_color(ids[0]), Some(Color::WHITE));
        assert_eq!(controller.displayed(), None);
    }
}
