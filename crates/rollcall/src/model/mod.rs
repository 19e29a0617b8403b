mod issued_code;
mod occurrence;

pub use issued_code::*;
pub use occurrence::*;
