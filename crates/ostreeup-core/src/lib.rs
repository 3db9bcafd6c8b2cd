pub mod checksum;
pub mod object_name;
pub mod objects;
pub mod repo_mode;
pub mod revision;
pub mod store;
pub mod wire;

#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use object_name::{ObjectName, ObjectType};
pub use repo_mode::RepoMode;
pub use revision::{Revision, RevisionPair};
pub use store::{StoreAdapter, StoreErr};
