//! Domain-level errors (no external dependencies)

use thiserror::Error;

/// Domain errors represent violations of the road-network model
/// and of the documentation hierarchy format.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("road connection {road_id} already exists on intersection {intersection}")]
    DuplicateRoad { intersection: String, road_id: u32 },

    #[error("unknown intersection: {0}")]
    UnknownIntersection(String),

    #[error("unknown traffic light: {0}")]
    UnknownTrafficLight(String),

    #[error("unknown entity type: {0}")]
    UnknownEntityType(String),

    #[error("malformed hierarchy at {path}: {reason}")]
    MalformedHierarchy { path: String, reason: String },
}
