use serde::{Deserialize, Serialize};

use crate::reference::Ref;

/// `{src: Ref, target: Ref}` where `target.scheme == "gsmake"`. Persisted in the mount index keyed by `"<domain>/<name>"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountEntry {
    pub src: Ref,
    pub target: Ref,
}
