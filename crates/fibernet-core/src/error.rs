//! Command and query errors
//!
//! Everything crossing the service surface maps to a stable
//! [`ErrorCode`]. Validation, structural and not-found failures leave state
//! untouched; projection and log failures poison the service.

use crate::event_log::LogError;
use crate::route_network::RouteNetworkError;
use fibernet_graph::{ProjectionError, TraceError};
use fibernet_model::{CatalogError, EquipmentError, ErrorCode, ErrorKind};
use uuid::Uuid;

/// Failed command
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CommandError {
    #[error(transparent)]
    Equipment(#[from] EquipmentError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("route network rejected the request: {0}")]
    RouteNetwork(#[from] RouteNetworkError),

    #[error("projection failure: {0}")]
    Projection(#[from] ProjectionError),

    #[error("event log failure: {0}")]
    Log(#[from] LogError),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// An earlier projection failure stopped command processing
    #[error("service is poisoned and must be rebuilt from the event log")]
    Poisoned,
}

impl CommandError {
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Equipment(e) => e.code(),
            Self::Catalog(e) => e.code(),
            Self::RouteNetwork(e) => e.code(),
            Self::InvalidRequest(_) => ErrorCode::InvalidRequest,
            Self::Projection(_) | Self::Log(_) | Self::Poisoned => ErrorCode::ProjectionFailure,
        }
    }

    /// Rejections the caller can fix by sending a different command
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        !self.is_system_error()
    }

    /// Failures that indicate a bug or a broken log rather than bad input
    #[inline]
    #[must_use]
    pub fn is_system_error(&self) -> bool {
        self.code().kind() == ErrorKind::Fatal
    }
}

/// Failed query
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error(transparent)]
    Trace(#[from] TraceError),

    #[error("element {0} not found")]
    NotFound(Uuid),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl QueryError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Trace(e) => e.code(),
            Self::NotFound(_) => ErrorCode::ElementNotFound,
            Self::InvalidRequest(_) => ErrorCode::InvalidRequest,
        }
    }
}
