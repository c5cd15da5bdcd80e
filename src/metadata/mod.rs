//! Project metadata loading and access.
//!
//! This module reads a project's `data.yml`, tolerating tab-indented input,
//! and exposes the parsed tree through a lookup layer that never fails.

pub mod access;
pub mod reader;

pub use access::{Node, ProjectMetadata};
pub use reader::load_metadata;
