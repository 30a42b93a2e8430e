//! Core types and validation for the monitor pipeline.

pub mod error;
pub mod event;
pub mod query;

pub use error::{Error, Result};
pub use event::{Event, ValidationError};
pub use query::*;
