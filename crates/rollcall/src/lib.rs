#![cfg_attr(docsrs, feature(doc_cfg))]

mod classify;
mod code;
mod creator;
mod date;
mod error;
mod futures;
mod model;
mod rand;
mod retry;
mod service;
mod store;

pub use crate::classify::*;
pub use crate::code::*;
pub use crate::creator::*;
pub use crate::date::*;
pub use crate::error::*;
pub use crate::futures::*;
pub use crate::model::*;
pub use crate::rand::*;
pub use crate::retry::*;
pub use crate::service::*;
pub use crate::store::*;
