//! Services - business logic and state management
//!
//! This module contains the core business logic:
//! - `pipeline` - Localization pipeline (label validation, distance
//!   resolution, marker synthesis, confidence tiering)
//! - `session` - Async session controller around the state machine

pub mod pipeline;
pub mod session;

// Re-export commonly used types
pub use session::{SessionCommand, SessionController};
