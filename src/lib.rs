#![forbid(unsafe_code)]
#![doc = include_str!("../README.md")]

mod collection;
mod error;
mod hash;
mod local;
mod sibling;
mod status;
mod structure;
mod target;
#[cfg(feature = "logging")]
mod utils;

pub use crate::collection::TargetCollection;
pub use crate::error::*;
pub use crate::hash::Hash32;
pub use crate::local::{LocalDirTarget, LocalFileTarget};
pub use crate::sibling::SiblingFileCollection;
pub use crate::status::StatusOpts;
pub use crate::structure::{Handle, Key, Node};
pub use crate::target::{FileTarget, Target, TargetDir};
#[cfg(feature = "logging")]
pub use crate::utils::init_logging;
