pub use super::attachments::Entity as Attachments;
pub use super::realms::Entity as Realms;
pub use super::users::Entity as Users;
