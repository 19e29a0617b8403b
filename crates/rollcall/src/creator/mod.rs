mod idempotent;

pub use idempotent::*;
