//! # Task Report Tree
//!
//! The nested status/message document embedded in every task record, shaped
//! for progressive disclosure in a UI: stage → resource type → resource →
//! sub-step. Aggregation semantics live in `orchestration::reporting`; this
//! module is the persisted data model.
//!
//! Serialized shape (preserved for UI compatibility):
//!
//! ```json
//! {
//!   "status": "...", "message": "...",
//!   "<stage>": {
//!     "status": "...", "message": "...",
//!     "steps": {
//!       "<resource type>": {
//!         "status": "...", "message": "...",
//!         "steps": [ { "id", "name", "status", "message", "steps": {...} } ]
//!       }
//!     }
//!   }
//! }
//! ```

use crate::state_machine::ReportStatus;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Top-level report: overall status/message mirroring the dominant stage
/// outcome, plus one entry per stage keyed by stage name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub status: ReportStatus,
    #[serde(default)]
    pub message: String,
    #[serde(flatten)]
    pub stages: BTreeMap<String, StageNode>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageNode {
    pub status: ReportStatus,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub steps: BTreeMap<String, TypeNode>,
}

/// Resource-type summary node holding the per-resource entries
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TypeNode {
    pub status: ReportStatus,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub steps: Vec<ResourceNode>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceNode {
    pub id: String,
    pub name: String,
    pub status: ReportStatus,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub steps: BTreeMap<String, SubStepNode>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubStepNode {
    pub status: ReportStatus,
    #[serde(default)]
    pub message: String,
}

impl Report {
    /// Fetch or create a stage entry
    pub fn stage_mut(&mut self, stage: &str) -> &mut StageNode {
        self.stages.entry(stage.to_string()).or_default()
    }

    pub fn stage(&self, stage: &str) -> Option<&StageNode> {
        self.stages.get(stage)
    }
}

impl StageNode {
    pub fn type_mut(&mut self, label: &str) -> &mut TypeNode {
        self.steps.entry(label.to_string()).or_default()
    }

    pub fn type_node(&self, label: &str) -> Option<&TypeNode> {
        self.steps.get(label)
    }
}

impl TypeNode {
    pub fn resource(&self, name: &str) -> Option<&ResourceNode> {
        self.steps.iter().find(|r| r.name == name)
    }

    pub fn resource_mut(&mut self, name: &str) -> Option<&mut ResourceNode> {
        self.steps.iter_mut().find(|r| r.name == name)
    }

    /// Append a pending resource entry, returning its report id
    pub fn add_resource(&mut self, name: impl Into<String>) -> &mut ResourceNode {
        let node = ResourceNode {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            status: ReportStatus::Pending,
            message: String::new(),
            steps: BTreeMap::new(),
        };
        self.steps.push(node);
        self.steps.last_mut().expect("entry just pushed")
    }
}

impl ResourceNode {
    /// Pre-register a pending sub-step under this resource
    pub fn add_sub_step(&mut self, name: impl Into<String>) {
        self.steps.insert(name.into(), SubStepNode::default());
    }
}
