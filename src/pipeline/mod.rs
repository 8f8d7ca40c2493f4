//! Pipeline module - the per-variable binning stages and their artifacts

pub mod apply;
pub mod binning;
pub mod loader;
pub mod monotonic;
pub mod special;
pub mod table;
pub mod target;

pub use apply::{apply_woe, ApplyConfig, ApplyError, BinLocation, UnknownHandling};
pub use binning::{fit_bins, BinningConfig, BreakSpec};
pub use loader::{load_dataset, save_dataset};
pub use table::{
    tables_from_dataframe, tables_to_dataframe, Bin, BinBoundary, BinningTable, SpecialValue,
    VariableKind,
};
pub use target::{binary_target_mask, TargetMapping};
