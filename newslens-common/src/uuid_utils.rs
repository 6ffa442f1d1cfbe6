//! UUID utilities

use uuid::Uuid;

/// Prefix marking identifiers that were minted locally and never confirmed
pub const TEMP_ID_PREFIX: &str = "temp-";

/// Generate a new UUIDv4
pub fn generate() -> Uuid {
    Uuid::new_v4()
}

/// Identifier for an optimistic entry awaiting its authoritative id
pub fn temp_id() -> String {
    format!("{}{}", TEMP_ID_PREFIX, generate().simple())
}

/// True for identifiers produced by [`temp_id`]
pub fn is_temp_id(id: &str) -> bool {
    id.starts_with(TEMP_ID_PREFIX)
}
