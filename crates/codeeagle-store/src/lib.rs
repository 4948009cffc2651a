//! CodeEagle Store — branch-partitioned embedded graph store, export
//! codec, and layered overlay

pub mod export;
pub mod keys;
pub mod layered;
pub mod migrate;
pub mod store;

#[cfg(test)]
mod tests;

pub use export::{
    read_export_branch, read_export_header, ExportHeader, ExportRecord, ExportSummary,
    EXPORT_FORMAT, EXPORT_VERSION,
};
pub use layered::LayeredStore;
pub use migrate::MigrationReport;
pub use store::{BranchMeta, BranchStore, BranchView, SCHEMA_VERSION};
