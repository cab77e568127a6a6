//! Utility primitives shared by the rest of the workspace: async filesystem
//! wrappers with error context, child-process invocation/logging, and UUID
//! generation -- collected here instead of being duplicated per crate.

pub mod fs;
pub mod ids;
pub mod process;
