//! Input/output helpers.
//!
//! - CSV ingest of time axes and peak sets (`ingest`)
//! - slice report export (`export`)
//! - fit result CSV (`results`)

pub mod export;
pub mod ingest;
pub mod results;

pub use export::*;
pub use ingest::*;
pub use results::*;
