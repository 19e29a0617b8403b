mod generator;
mod security_code;

pub use generator::*;
pub use security_code::{ALPHABET, CODE_LEN, CodeError, SecurityCode};
