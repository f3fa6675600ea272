pub mod attachments;
pub mod daemon;
pub mod hooks;
pub mod paths;
pub mod quota;
pub mod relocator;
