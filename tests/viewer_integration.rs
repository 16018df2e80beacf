use glam::Mat4;
use glb_viewer::asset::load_slice;
use glb_viewer::config::ViewerConfig;
use glb_viewer::editor::{MeshTarget, ViewerCommand, parse_script};
use glb_viewer::export::{EXPORT_FILE_NAME, ExportOptions, ExportOutput, GlbExporter, SceneExporter};
use glb_viewer::scene::{Color, Geometry, GeometryKind, Material, MaterialColors, SceneGraph};
use glb_viewer::viewer::{NoticeLevel, Viewer};
use std::path::Path;
use std::time::Duration;

fn write_model(dir: &Path) -> std::path::PathBuf {
    let mut scene = SceneGraph::new("olympia");
    let triangle = Geometry::new(
        GeometryKind::Triangles,
        vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
    );
    scene
        .add_mesh(
            None,
            "Statue",
            Mat4::IDENTITY,
            triangle.clone(),
            Some(Material::standard(Color::new(200, 100, 50))),
        )
        .unwrap();
    scene
        .add_mesh(None, "Pedestal", Mat4::IDENTITY, triangle, None)
        .unwrap();

    let ExportOutput::Binary(bytes) = GlbExporter::new()
        .export(&scene, &ExportOptions::compressed_glb())
        .unwrap()
    else {
        panic!("binary export expected");
    };
    let path = dir.join("olympia.glb");
    std::fs::write(&path, bytes).unwrap();
    path
}

fn wait_for_load(viewer: &mut Viewer) {
    for _ in 0..2000 {
        viewer.tick(1.0 / 60.0);
        if !viewer.is_loading() {
            return;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    panic!("model did not finish loading");
}

fn viewer_for(dir: &Path, model: &Path) -> Viewer {
    let config = ViewerConfig::default()
        .with_model(model.to_string_lossy())
        .with_output_dir(dir.join("downloads"));
    Viewer::from_config(&config)
}

#[test]
fn scripted_session_exports_untinted_model() {
    let dir = tempfile::tempdir().unwrap();
    let model = write_model(dir.path());
    let mut viewer = viewer_for(dir.path(), &model);

    viewer.load_default();
    wait_for_load(&mut viewer);
    assert!(viewer.scene().is_some(), "notices: {:?}", viewer.notices().latest());

    let script = parse_script(r#"[{"click": "Statue"}, {"hover": "Statue"}, "export"]"#).unwrap();
    let mut outcomes = Vec::new();
    for command in script {
        outcomes.extend(viewer.handle(command));
    }
    assert_eq!(outcomes.len(), 1);

    let statue = viewer.scene().unwrap().find_mesh("Statue").unwrap();
    assert_eq!(
        viewer.scene().unwrap().material_color(statue),
        Some(Color::new(160, 80, 40))
    );

    let exported = dir.path().join("downloads").join(EXPORT_FILE_NAME);
    let bytes = std::fs::read(&exported).expect("one artifact delivered");
    let reloaded = load_slice(&bytes, "export", None, None).unwrap();
    let statue = reloaded.find_mesh("Statue").unwrap();
    assert_eq!(reloaded.material_color(statue), Some(Color::new(200, 100, 50)));

    let entries = std::fs::read_dir(dir.path().join("downloads")).unwrap().count();
    assert_eq!(entries, 1);
}

#[test]
fn panel_follows_hover_then_selection() {
    let dir = tempfile::tempdir().unwrap();
    let model = write_model(dir.path());
    let mut viewer = viewer_for(dir.path(), &model);
    viewer.load_default();
    wait_for_load(&mut viewer);

    viewer.handle(ViewerCommand::Click(MeshTarget::Name("Statue".into())));
    viewer.handle(ViewerCommand::Hover(MeshTarget::Name("Pedestal".into())));
    let info = viewer.info_panel().expect("panel visible");
    assert_eq!(
        info.lines(),
        [
            "Object Info".to_string(),
            "Name: Pedestal".to_string(),
            "Geometry: Triangles".to_string(),
            "Material: None".to_string(),
        ]
    );

    viewer.handle(ViewerCommand::Unhover);
    let info = viewer.info_panel().expect("selection shown");
    assert_eq!(info.name, "Statue");
    assert_eq!(info.material_label(), "MeshStandardMaterial");
}

#[test]
fn export_before_load_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let model = write_model(dir.path());
    let mut viewer = viewer_for(dir.path(), &model);

    assert!(viewer.handle(ViewerCommand::Export).is_some());
    assert!(!dir.path().join("downloads").exists());
    assert!(viewer.notices().is_empty());
}

#[test]
fn broken_model_surfaces_notice() {
    let dir = tempfile::tempdir().unwrap();
    let model = dir.path().join("broken.glb");
    std::fs::write(&model, b"definitely not a glb").unwrap();
    let mut viewer = viewer_for(dir.path(), &model);

    viewer.load_default();
    wait_for_load(&mut viewer);

    assert!(viewer.scene().is_none());
    let notice = viewer.notices().latest().expect("load failure notice");
    assert_eq!(notice.level, NoticeLevel::Error);
    assert!(notice.message.contains("broken.glb"));
}
