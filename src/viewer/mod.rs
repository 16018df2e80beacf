mod composition;
mod notice;

pub use composition::{
    AmbientLight, CameraSettings, DEFAULT_DECODER_PATH, DEFAULT_MODEL, DirectionalLight,
    SceneComposition,
};
pub use notice::{Notice, NoticeBoard, NoticeLevel};

use crate::asset::{AssetLoader, AssetSource, LoadHandle};
use crate::config::ViewerConfig;
use crate::editor::{
    CommandQueue, FrameStats, ObjectInfo, SelectionController, ViewerCommand, info_panel,
};
use crate::export::{DirectorySink, ExportOutcome, ExportTrigger, GlbExporter};
use crate::scene::{NodeId, Ray, SceneGraph};

/// Wires the asset loader, selection controller, info panel and export
/// trigger around the currently loaded scene.
///
/// Until a load resolves there is no root and hover, click and export are
/// no-ops.
pub struct Viewer {
    composition: SceneComposition,
    loader: AssetLoader,
    pending: Option<LoadHandle>,
    scene: Option<SceneGraph>,
    generation: u64,
    controller: SelectionController,
    export: ExportTrigger,
    notices: NoticeBoard,
    stats: FrameStats,
    commands: CommandQueue,
}

impl Viewer {
    pub fn new(composition: SceneComposition, loader: AssetLoader, export: ExportTrigger) -> Self {
        Self {
            composition,
            loader,
            pending: None,
            scene: None,
            generation: 0,
            controller: SelectionController::new(),
            export,
            notices: NoticeBoard::default(),
            stats: FrameStats::default(),
            commands: CommandQueue::new(),
        }
    }

    /// Builds a viewer that saves exports into `config.output_dir`.
    pub fn from_config(config: &ViewerConfig) -> Self {
        let export = ExportTrigger::new(
            Box::new(GlbExporter::new()),
            Box::new(DirectorySink::new(config.output_dir.clone())),
        )
        .with_options(config.export)
        .with_file_name(config.composition.export_file_name.clone());
        Self::new(config.composition.clone(), AssetLoader::new(), export)
    }

    pub fn composition(&self) -> &SceneComposition {
        &self.composition
    }

    /// Starts loading the configured model.
    pub fn load_default(&mut self) {
        let source = AssetSource::parse(&self.composition.model);
        self.load(source);
    }

    /// Starts a background load. A load still in flight is abandoned.
    pub fn load(&mut self, source: AssetSource) {
        log::info!(
            "[viewer] loading {} (draco decoders: {})",
            source,
            self.composition.decoder_path
        );
        if let Some(previous) = self.pending.replace(self.loader.load(source)) {
            log::warn!("[viewer] abandoning pending load of {}", previous.label());
        }
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    /// Installs `scene` as the loaded root. Handles into the previous scene
    /// are forgotten.
    pub fn set_scene(&mut self, scene: SceneGraph) {
        self.controller.reset();
        self.generation += 1;
        log::info!(
            "[viewer] scene '{}' ready ({} meshes)",
            scene.name(),
            scene.mesh_nodes().len()
        );
        self.scene = Some(scene);
    }

    pub fn scene(&self) -> Option<&SceneGraph> {
        self.scene.as_ref()
    }

    /// Bumped every time a new scene is installed.
    pub fn scene_generation(&self) -> u64 {
        self.generation
    }

    /// Polls the loader, runs queued commands and records frame stats.
    pub fn tick(&mut self, delta_seconds: f32) {
        self.poll_loader();

        for command in self.commands.drain_pending() {
            self.handle(command);
        }

        if self.composition.stats {
            self.stats.record(delta_seconds);
        }
    }

    fn poll_loader(&mut self) {
        let Some(handle) = self.pending.as_mut() else {
            return;
        };
        let Some(result) = handle.poll() else {
            return;
        };
        let label = handle.label().to_string();
        self.pending = None;

        match result {
            Ok(scene) => self.set_scene(scene),
            Err(err) => {
                log::error!("[viewer] failed to load {label}: {err}");
                self.notices.error(format!("failed to load {label}: {err}"));
            }
        }
    }

    pub fn enqueue(&mut self, command: ViewerCommand) {
        self.commands.push(command);
    }

    pub fn enqueue_all<I>(&mut self, commands: I)
    where
        I: IntoIterator<Item = ViewerCommand>,
    {
        self.commands.extend(commands);
    }

    pub fn commands(&self) -> &CommandQueue {
        &self.commands
    }

    /// Applies one command right away. Returns the outcome for exports.
    pub fn handle(&mut self, command: ViewerCommand) -> Option<ExportOutcome> {
        let Some(scene) = self.scene.as_ref() else {
            log::debug!("[viewer] {} ignored; nothing loaded", command.label());
            return match command {
                ViewerCommand::Export => Some(self.export()),
                _ => None,
            };
        };

        match command {
            ViewerCommand::Hover(target) => {
                let mesh = target.resolve(scene);
                if mesh.is_none() {
                    log::warn!("[viewer] hover target {target:?} not found; treating as unhover");
                }
                self.hover(mesh);
                None
            }
            ViewerCommand::Unhover => {
                self.hover(None);
                None
            }
            ViewerCommand::Click(target) => {
                match target.resolve(scene) {
                    Some(mesh) => self.click(mesh),
                    None => log::warn!("[viewer] click target {target:?} not found"),
                }
                None
            }
            ViewerCommand::Export => Some(self.export()),
        }
    }

    /// A handle that is not a mesh of the loaded scene counts as unhover.
    pub fn hover(&mut self, mesh: Option<NodeId>) {
        let Some(scene) = self.scene.as_mut() else {
            return;
        };
        let mesh = mesh.filter(|&id| {
            let is_mesh = scene.mesh(id).is_some();
            if !is_mesh {
                log::debug!("[viewer] hover on {id:?} treated as unhover; not a mesh of this scene");
            }
            is_mesh
        });
        self.controller.on_hover(scene, mesh);
    }

    pub fn click(&mut self, mesh: NodeId) {
        match self.scene.as_ref() {
            Some(scene) if scene.mesh(mesh).is_some() => self.controller.on_click(mesh),
            Some(_) => log::warn!("[viewer] click on {mesh:?} ignored; not a mesh of this scene"),
            None => {}
        }
    }

    /// Nearest mesh hit by `ray` in the loaded scene.
    pub fn pick(&self, ray: &Ray) -> Option<NodeId> {
        self.scene.as_ref()?.pick(ray)
    }

    /// Exports the loaded root. The hover tint is lifted for the duration so
    /// the file carries the original colours.
    pub fn export(&mut self) -> ExportOutcome {
        let Some(scene) = self.scene.as_mut() else {
            return self.export.trigger(None);
        };

        self.controller.suspend(scene);
        let outcome = self.export.trigger(Some(&*scene));
        self.controller.resume(scene);

        match &outcome {
            ExportOutcome::Delivered { path, .. } => {
                self.notices.info(format!("exported {}", path.display()));
            }
            ExportOutcome::Failed(err) => {
                self.notices.error(format!("export failed: {err}"));
            }
            ExportOutcome::Skipped => {}
        }
        outcome
    }

    pub fn info_panel(&self) -> Option<ObjectInfo> {
        let scene = self.scene.as_ref()?;
        info_panel::project(
            scene,
            self.controller.highlighted(),
            self.controller.selected(),
        )
    }

    pub fn controller(&self) -> &SelectionController {
        &self.controller
    }

    pub fn notices(&self) -> &NoticeBoard {
        &self.notices
    }

    pub fn notices_mut(&mut self) -> &mut NoticeBoard {
        &mut self.notices
    }

    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    pub fn export_trigger(&self) -> &ExportTrigger {
        &self.export
    }
}
