//! Remapping of partition tables to their parents and allow-list filtering.

mod allow_list;
mod mapping;
mod stage;

pub use allow_list::AllowList;
pub use mapping::TableMapping;
pub use stage::{FilterOutcome, FilterStage};
