//! Report module - summarizing and exporting fit results

pub mod export;
pub mod summary;

pub use export::*;
pub use summary::*;
