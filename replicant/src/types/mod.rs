//! Data model shared by the pipeline stages.

mod change;
mod message;
mod position;

pub use change::*;
pub use message::*;
pub use position::*;

pub use postgres::types::TableName;
