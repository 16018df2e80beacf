pub mod glb;
mod options;

pub use options::{
    AttributeChannel, CompressionMethod, DracoOptions, EncoderOptions, ExportOptions,
    MAX_QUANTIZATION_BITS, MAX_SPEED,
};

use crate::scene::{Geometry, SceneGraph};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

pub const EXPORT_FILE_NAME: &str = "compressed-model.glb";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("invalid export options: {0}")]
    InvalidOptions(String),
    #[error("scene has no nodes to export")]
    EmptyScene,
    #[error("draco encoder failed: {0}")]
    Encoder(String),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("export of {0} bytes exceeds the GLB size limit")]
    TooLarge(usize),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result of an exporter run.
#[derive(Debug, Clone, PartialEq)]
pub enum ExportOutput {
    Binary(Vec<u8>),
    Json(Value),
}

impl ExportOutput {
    pub fn into_bytes(self) -> Result<Vec<u8>, ExportError> {
        match self {
            ExportOutput::Binary(bytes) => Ok(bytes),
            ExportOutput::Json(value) => Ok(serde_json::to_vec_pretty(&value)?),
        }
    }
}

/// Draco-compressed primitive produced by an encoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPrimitive {
    pub bytes: Vec<u8>,
    /// glTF attribute semantic to Draco attribute id.
    pub attributes: BTreeMap<String, u32>,
}

/// Draco bitstream encoder. The codec itself lives outside this crate.
pub trait DracoEncoder: Send + Sync {
    fn encode(
        &self,
        geometry: &Geometry,
        options: &DracoOptions,
    ) -> Result<EncodedPrimitive, ExportError>;
}

/// Serializes a loaded scene.
pub trait SceneExporter: Send {
    fn export(
        &self,
        scene: &SceneGraph,
        options: &ExportOptions,
    ) -> Result<ExportOutput, ExportError>;
}

/// Writes glTF 2.0, either as a GLB container or as JSON with an embedded buffer.
///
/// Without an attached [`DracoEncoder`] attributes are stored uncompressed and
/// the requested Draco options are kept under `asset.extras.dracoOptions`.
#[derive(Default, Clone)]
pub struct GlbExporter {
    encoder: Option<Arc<dyn DracoEncoder>>,
}

impl GlbExporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_encoder(encoder: Arc<dyn DracoEncoder>) -> Self {
        Self {
            encoder: Some(encoder),
        }
    }
}

impl SceneExporter for GlbExporter {
    fn export(
        &self,
        scene: &SceneGraph,
        options: &ExportOptions,
    ) -> Result<ExportOutput, ExportError> {
        options.validate()?;
        if options.draco_options.is_some() && self.encoder.is_none() {
            log::warn!("[export] no Draco encoder attached; writing uncompressed attributes");
        }

        let (document, bin) =
            glb::DocumentBuilder::new(options, self.encoder.as_deref()).build(scene)?;

        if options.binary {
            Ok(ExportOutput::Binary(glb::write_glb(&document, &bin)?))
        } else {
            Ok(ExportOutput::Json(document))
        }
    }
}

/// Platform save surface for exported files.
pub trait DownloadSink: Send {
    /// Takes ownership of `bytes`; they are released once delivery returns.
    fn deliver(&mut self, file_name: &str, bytes: Vec<u8>) -> Result<PathBuf, ExportError>;
}

/// Saves downloads into a directory, creating it when missing.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl DownloadSink for DirectorySink {
    fn deliver(&mut self, file_name: &str, bytes: Vec<u8>) -> Result<PathBuf, ExportError> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(file_name);
        std::fs::write(&path, &bytes)?;
        Ok(path)
    }
}

#[derive(Debug)]
pub enum ExportOutcome {
    /// Nothing is loaded yet.
    Skipped,
    Delivered { path: PathBuf, bytes: usize },
    Failed(ExportError),
}

/// Export button: serialize the loaded root and hand the file to the sink.
pub struct ExportTrigger {
    exporter: Box<dyn SceneExporter>,
    sink: Box<dyn DownloadSink>,
    options: ExportOptions,
    file_name: String,
}

impl ExportTrigger {
    pub fn new(exporter: Box<dyn SceneExporter>, sink: Box<dyn DownloadSink>) -> Self {
        Self {
            exporter,
            sink,
            options: ExportOptions::compressed_glb(),
            file_name: EXPORT_FILE_NAME.to_string(),
        }
    }

    pub fn with_options(mut self, options: ExportOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = file_name.into();
        self
    }

    pub fn options(&self) -> &ExportOptions {
        &self.options
    }

    /// Name of the delivered file. JSON output swaps the extension to `.gltf`.
    pub fn delivered_name(&self) -> String {
        if self.options.binary {
            return self.file_name.clone();
        }
        Path::new(&self.file_name)
            .with_extension("gltf")
            .to_string_lossy()
            .into_owned()
    }

    pub fn trigger(&mut self, root: Option<&SceneGraph>) -> ExportOutcome {
        let Some(scene) = root else {
            log::info!("[export] nothing loaded yet; export ignored");
            return ExportOutcome::Skipped;
        };

        match self.run(scene) {
            Ok((path, bytes)) => {
                log::info!("[export] wrote {} ({} bytes)", path.display(), bytes);
                ExportOutcome::Delivered { path, bytes }
            }
            Err(err) => {
                log::error!("[export] failed to export '{}': {err}", scene.name());
                ExportOutcome::Failed(err)
            }
        }
    }

    fn run(&mut self, scene: &SceneGraph) -> Result<(PathBuf, usize), ExportError> {
        let bytes = self.exporter.export(scene, &self.options)?.into_bytes()?;
        let size = bytes.len();
        let name = self.delivered_name();
        let path = self.sink.deliver(&name, bytes)?;
        Ok((path, size))
    }
}
