//! Core domain types shared by every processing stage.
//!
//! Identity normalization and masking, fiscal model codes, accounting
//! periods, the crate error type and the user-facing operation log.

mod error;
mod identity;
mod log;
mod model;

pub use error::FiscalError;
pub use identity::{IdentitySet, digits, mask_identity};
pub use log::OperationLog;
pub use model::{ModelCode, Period, format_period};
