mod admin;
pub(crate) mod quota_slice;
mod resource;
mod volume;

pub use admin::{validate_admin, Admin};
pub use quota_slice::{
    parse_ids, GroupVolume, GroupVolumePatch, QuotaSlice, SliceFilter, UserVolume,
    UserVolumePatch,
};
pub use resource::{validate_resource_name, Resource, ResourceQuery};
pub use volume::{validate_volume_name, NewVolume, Volume};
