//! Client-side assembly id generation.

use uuid::Uuid;

/// Generate a fresh assembly id.
///
/// Ids are chosen by the client before submission so status polling can
/// begin while the upload is still in flight. The service expects 32
/// lowercase hex characters.
pub fn new_assembly_id() -> String {
    Uuid::new_v4().simple().to_string()
}
