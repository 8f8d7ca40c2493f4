//! Scorebin: WoE binning and scorecard library
//!
//! Fits weight-of-evidence binning tables on binary-target datasets,
//! WoE-encodes datasets through fitted tables, and builds and applies
//! points-based scorecards.

pub mod cli;
pub mod pipeline;
pub mod report;
pub mod scorecard;
pub mod utils;
