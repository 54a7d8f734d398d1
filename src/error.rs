//! Error kinds surfaced by the viewer.
//!
//! Every failure the loader, patcher or host setup can run into maps onto one
//! [`ViewerError`] variant so it can be logged with a distinct kind. None of
//! them stop the render loop: a failed load leaves the scene empty and a
//! hierarchy mismatch only skips the offending patch.

use crate::data_structures::model::NodePath;

#[derive(Debug, thiserror::Error)]
pub enum ViewerError {
    /// The element the canvas should be appended to does not exist.
    #[error("attachment point `{selector}` not found in the document")]
    AttachmentMissing { selector: String },

    /// Fetching or decoding a remote resource failed.
    #[error("failed to load {resource}: {reason}")]
    AssetFetchFailed { resource: String, reason: String },

    /// A patch table entry points at a node that is not in the loaded model.
    #[error("no node at hierarchy path {path}")]
    HierarchyMismatch { path: NodePath },

    #[error("invalid viewer configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error("graphics setup failed: {0}")]
    Graphics(String),
}

impl ViewerError {
    pub(crate) fn fetch(resource: &str, reason: impl std::fmt::Display) -> Self {
        Self::AssetFetchFailed {
            resource: resource.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ViewerError>;
