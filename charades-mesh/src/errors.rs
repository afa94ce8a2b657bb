use thiserror::Error;

#[derive(Debug, Error)]
pub enum MeshError {
    #[error("Signaling channel closed")]
    SignalingClosed,
    #[error("Media error: {0}")]
    Media(String),
}
