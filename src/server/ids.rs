//! Identifiers for backup and share documents.

use uuid::Uuid;

/// Returns a fresh backup id, `backup_<32 hex>`.
pub fn new_backup_id() -> String {
    format!("backup_{}", Uuid::new_v4().simple())
}

/// Returns a fresh share id, `share_<32 hex>`.
pub fn new_share_id() -> String {
    format!("share_{}", Uuid::new_v4().simple())
}
