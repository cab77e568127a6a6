//! The virtual file system: content-addressed
//! package references, site-template-driven remote resolution, pluggable
//! user-FS drivers, and the per-userspace mount table.

mod error;
mod facade;
mod mount;
mod reference;
mod site;
mod userfs;
mod userspace;

pub use error::{Error, Result};
pub use facade::Vfs;
pub use mount::MountEntry;
pub use reference::{Ref, FILE_SCHEME, GSMAKE_SCHEME};
pub use site::{default_sites, Site};
pub use userfs::{FileDriver, GitDriver, MountContext, UserFs};
pub use userspace::{allocate as allocate_userspace, purge_temp_bound, UserspaceIndex};
