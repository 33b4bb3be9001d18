//! Top-level store operations.
//!
//! Each operation opens its own transaction scope on the store it is given
//! and releases it before returning, whether it succeeds or fails.

mod merge;
mod organize;
mod select;
mod write;

pub use merge::{BatchMergeReport, DropReason, EntityMerger, MergeFailure, MergeReport};
pub use organize::{MoveSkip, OrganizeReport, Organizer, PlannedMove};
pub use select::{link_interactively, parse_choice, Selector, MANUAL_CONTEXT};
pub use write::{RelationWriter, SkipReason, WriteOutcome, WriteReport};
