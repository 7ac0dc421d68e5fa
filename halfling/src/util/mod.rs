//! Utilities shared by the engine and render routines.

pub mod bind_merge;
pub mod buffer;
pub mod error_scope;
pub mod frustum;
pub mod typedefs;
