mod memory;
mod postgres;

pub use memory::{MemoryDirectory, MemoryStore};
pub use postgres::{PgDirectory, PgStore};
