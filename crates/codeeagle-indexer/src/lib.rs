//! CodeEagle Indexer — parsing, change detection, sync orchestration,
//! and the linker

pub mod changes;
pub mod config;
pub mod heuristics;
pub mod indexer;
pub mod languages;
pub mod linker;
pub mod parser;
pub mod state;


pub use changes::{ChangeSet, ChangeSource, GitChangeSource, MtimeChangeSource};
pub use config::ProjectConfig;
pub use indexer::{Indexer, IndexerOptions, Summarizer, SyncError, SyncStats};
pub use linker::{LinkReport, Linker, PhaseReport};
pub use parser::{ParseResult, Parser, ParserRegistry};
pub use state::SyncState;
