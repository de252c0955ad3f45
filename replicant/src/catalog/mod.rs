//! Resolution of physical tables to their logical parents.

mod base;
mod pg;

pub use base::TableCatalog;
pub use pg::PgTableCatalog;
