pub mod memory;
pub mod validation;

pub use memory::{DateFilter, MemoryService};
pub use validation::validate_memory;
