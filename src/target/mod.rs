//! Target handling
//!
//! This module turns user-supplied target strings into request URIs and keeps
//! the registry of everything being polled:
//! - `parser`: target string parsing and URI construction
//! - `registry`: the `Target` record and the `TargetRegistry` that owns it

mod parser;
mod registry;

pub use parser::{build_request_uri, parse_target, resolve_targets, ThreadRef};
pub use registry::{Target, TargetRegistry};
