#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod config;
mod error;
pub mod queue;

pub use crate::config::{
    AdmissionOrder, DEFAULT_BASE_URL, DEFAULT_CHUNK_BUFFER, DEFAULT_MAX_CONCURRENT,
    DEFAULT_TIMEOUT_SECS, FetchConfig, FetchConfigBuilder,
};
pub use crate::error::{FetchError, Result};
pub use crate::queue::{
    FetchOutcome, FetchQueue, FetchStats, FetchStream, FetchTicket, NotFoundReason,
};
