mod interface;
mod message;
mod sqlstate;

pub use interface::*;
pub use message::MessageClassifier;
pub use sqlstate::*;
