pub mod memory;
pub mod owner;

pub use memory::*;
pub use owner::*;
