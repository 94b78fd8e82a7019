//! Slot pool error types.

use std::fmt;

/// Why a handle was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleFault {
    /// The handle was issued by a different pool.
    Foreign,
    /// The slot index does not exist in this pool.
    OutOfRange,
    /// The slot is not currently held.
    NotInUse,
    /// The slot was released and re-acquired since this handle was issued.
    Stale,
}

impl fmt::Display for HandleFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HandleFault::Foreign => "handle belongs to another pool",
            HandleFault::OutOfRange => "slot index out of range",
            HandleFault::NotInUse => "slot is not in use",
            HandleFault::Stale => "handle is stale",
        };
        f.write_str(s)
    }
}

/// Errors that can occur during slot pool operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotError {
    /// Release or access through a handle this pool does not consider held.
    InvalidHandle {
        /// Slot index carried by the handle.
        index: usize,
        /// What was wrong with it.
        fault: HandleFault,
    },

    /// The slot pool configuration is invalid.
    InvalidConfig(String),
}

impl SlotError {
    /// Check if this is an invalid-handle error.
    pub fn is_invalid_handle(&self) -> bool {
        matches!(self, SlotError::InvalidHandle { .. })
    }
}

impl fmt::Display for SlotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotError::InvalidHandle { index, fault } => {
                write!(f, "invalid handle for slot {}: {}", index, fault)
            }
            SlotError::InvalidConfig(reason) => {
                write!(f, "invalid slot pool configuration: {}", reason)
            }
        }
    }
}

impl std::error::Error for SlotError {}

/// Result type alias for slot pool operations.
pub type SlotResult<T> = Result<T, SlotError>;
