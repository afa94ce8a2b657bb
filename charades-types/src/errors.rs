use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Category of a notice sent back to a single client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "kebab-case")]
#[ts(export)]
pub enum NoticeKind {
    /// Action sent in the wrong phase or by the wrong role.
    InvalidState,
    InvalidRoomCode,
    MalformedMessage,
    RateLimited,
}
