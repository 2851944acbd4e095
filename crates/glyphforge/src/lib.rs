#![doc = include_str!("../README.md")]

mod archive;
mod error;
mod filename;
mod pipeline;
mod scope;
mod store;
mod synth;
mod types;

pub use crate::archive::*;
pub use crate::error::*;
pub use crate::filename::*;
pub use crate::pipeline::*;
pub use crate::scope::*;
pub use crate::store::*;
pub use crate::synth::*;
pub use crate::types::*;
