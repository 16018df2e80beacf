use crate::scene::{NodeId, SceneGraph};
use serde::{Deserialize, Serialize};

/// Mesh addressed either by a live handle or, in scripts, by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MeshTarget {
    Node(NodeId),
    Name(String),
}

impl MeshTarget {
    pub fn resolve(&self, scene: &SceneGraph) -> Option<NodeId> {
        match self {
            MeshTarget::Node(node) => scene.mesh(*node).map(|_| *node),
            MeshTarget::Name(name) => scene.find_mesh(name),
        }
    }
}

impl From<NodeId> for MeshTarget {
    fn from(node: NodeId) -> Self {
        MeshTarget::Node(node)
    }
}

/// Pointer and toolbar input understood by the viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewerCommand {
    Hover(MeshTarget),
    Unhover,
    Click(MeshTarget),
    Export,
}

impl ViewerCommand {
    pub fn hover(target: impl Into<MeshTarget>) -> Self {
        ViewerCommand::Hover(target.into())
    }

    pub fn click(target: impl Into<MeshTarget>) -> Self {
        ViewerCommand::Click(target.into())
    }

    pub fn label(&self) -> &'static str {
        match self {
            ViewerCommand::Hover(_) => "hover",
            ViewerCommand::Unhover => "unhover",
            ViewerCommand::Click(_) => "click",
            ViewerCommand::Export => "export",
        }
    }
}

/// Parses a JSON array of commands, e.g. `[{"hover": "Statue"}, "unhover", "export"]`.
pub fn parse_script(json: &str) -> Result<Vec<ViewerCommand>, serde_json::Error> {
    serde_json::from_str(json)
}

/// Commands collected between viewer ticks.
#[derive(Debug, Default, Clone)]
pub struct CommandQueue {
    pending: Vec<ViewerCommand>,
    processed: usize,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, command: ViewerCommand) {
        self.pending.push(command);
    }

    pub fn extend<I>(&mut self, commands: I)
    where
        I: IntoIterator<Item = ViewerCommand>,
    {
        self.pending.extend(commands);
    }

    pub fn drain_pending(&mut self) -> Vec<ViewerCommand> {
        let drained: Vec<_> = self.pending.drain(..).collect();
        self.processed += drained.len();
        drained
    }

    pub fn pending_depth(&self) -> usize {
        self.pending.len()
    }

    pub fn total_processed(&self) -> usize {
        self.processed
    }
}
