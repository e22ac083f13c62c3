//! reelcap common library
//!
//! Types shared between the recording engine and its front ends.

pub mod logging;
pub mod types;

pub use types::*;
