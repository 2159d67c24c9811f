mod byte_count;
mod perms;
mod resource_kind;

pub use byte_count::{ByteCount, BYTES_PER_GB};
pub use perms::{Access, Perms};
pub use resource_kind::ResourceKind;
