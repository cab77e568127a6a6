//! UUID generation, used for userspace allocation. Kept as a one-line
//! wrapper so every call site shares a single point of truth for the ID
//! format.

/// Generates a new userspace id.
pub fn new_userspace_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
