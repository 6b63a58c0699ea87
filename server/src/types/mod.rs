pub mod identity;
pub mod ids;
pub mod records;

pub use identity::{Identity, Origin, Principal};
pub use ids::{hex_encode, new_record_id};
pub use records::{BlacklistEntry, Candidate, PrimaryUser, RefreshTokenRecord};
