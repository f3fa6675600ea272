use crate::entities::{realms, users};

/// The authenticated user a hook call acts on behalf of, together with the
/// realm that owns their uploads.
#[derive(Debug, Clone)]
pub struct Principal {
    pub user: users::Model,
    pub realm: realms::Model,
}
