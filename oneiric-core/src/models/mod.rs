pub mod dream;
pub mod profile;

pub use dream::DreamRecord;
pub use profile::UserProfile;
