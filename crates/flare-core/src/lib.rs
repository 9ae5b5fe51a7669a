#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

pub mod cache;
mod error;
pub mod notify;
pub mod queue;
mod resource;

pub use crate::error::{BoxedError, Error, ErrorKind, Result};
pub use crate::resource::ResourceClass;
