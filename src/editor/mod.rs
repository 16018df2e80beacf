pub mod commands;
pub mod info_panel;
pub mod selection;
pub mod stats;

pub use commands::{CommandQueue, MeshTarget, ViewerCommand, parse_script};
pub use info_panel::{NO_MATERIAL, ObjectInfo};
pub use selection::{HIGHLIGHT_SCALE, Highlight, SelectionController, darken};
pub use stats::FrameStats;
