//! # parley-conduit
//!
//! One request/response exchange with the external agent process.
//!
//! - [`Conduit`]: async trait seam the runtime depends on
//! - [`ClaudeCli`]: production implementation spawning the `claude` binary
//!   with `--output-format json` and parsing its single JSON result
//! - [`ConduitError`]: spawn, exit-code, parse and timeout failures

#![deny(unsafe_code)]

pub mod cli;
pub mod errors;
pub mod traits;
pub mod types;

pub use cli::{ClaudeCli, build_args};
pub use errors::{ConduitError, Result};
pub use traits::Conduit;
pub use types::{InvocationRequest, InvocationResult};
