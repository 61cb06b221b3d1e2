use std::fmt;

use orm::uploads::UploadStatusDb;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Moderation state of an image change request.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Pending,
    Accepted,
    Rejected,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModerationAction {
    Accept,
    Reject,
}

impl fmt::Display for ModerationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accept => write!(f, "accept"),
            Self::Reject => write!(f, "reject"),
        }
    }
}

#[derive(Debug, Clone, Copy, Error, Eq, PartialEq)]
#[error("cannot {action} an upload that is already {from:?}")]
pub struct InvalidTransition {
    pub from: UploadStatus,
    pub action: ModerationAction,
}

impl UploadStatus {
    /// Only pending uploads may be moderated; terminal states are final.
    pub fn apply(self, action: ModerationAction) -> Result<Self, InvalidTransition> {
        match (self, action) {
            (Self::Pending, ModerationAction::Accept) => Ok(Self::Accepted),
            (Self::Pending, ModerationAction::Reject) => Ok(Self::Rejected),
            (from, action) => Err(InvalidTransition { from, action }),
        }
    }
}

impl From<UploadStatusDb> for UploadStatus {
    fn from(value: UploadStatusDb) -> Self {
        match value {
            UploadStatusDb::Pending => Self::Pending,
            UploadStatusDb::Accepted => Self::Accepted,
            UploadStatusDb::Rejected => Self::Rejected,
        }
    }
}

impl From<UploadStatus> for UploadStatusDb {
    fn from(value: UploadStatus) -> Self {
        match value {
            UploadStatus::Pending => Self::Pending,
            UploadStatus::Accepted => Self::Accepted,
            UploadStatus::Rejected => Self::Rejected,
        }
    }
}
