mod interface;
mod memory;
mod outcome;

pub use interface::*;
pub use memory::*;
pub use outcome::*;
