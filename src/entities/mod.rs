pub mod prelude;

pub mod attachments;
pub mod realms;
pub mod users;
