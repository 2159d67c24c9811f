pub mod health;
pub mod reap;
pub mod serve;
pub mod version;
pub mod volumes;

pub use health::Health;
pub use reap::Reap;
pub use serve::Serve;
pub use version::Version;
pub use volumes::Volumes;
