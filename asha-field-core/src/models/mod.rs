mod module_key;
mod profile;
mod record;
mod status;

pub use module_key::ModuleKey;
pub use profile::{Profile, Role, RosterMember};
pub use record::{missing_fields, Payload, Record};
pub use status::SyncStatus;
