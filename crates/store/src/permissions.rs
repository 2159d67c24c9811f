//! POSIX-style owner/group/other checks on resources.

use common::auth::Identity;

use crate::models::Resource;
use crate::types::Access;
use crate::{Result, StoreError};

/// Reduce `(uid, gids)` against the resource's `(owner, group, perms)`.
///
/// `None` is the service path and always passes; uid 0 also passes.
pub fn permits(identity: Option<&Identity>, resource: &Resource, access: Access) -> bool {
    let Some(identity) = identity else {
        return true;
    };
    if identity.uid == 0 {
        return true;
    }

    let class = if i64::from(identity.uid) == resource.uid {
        0
    } else if identity.gids.iter().any(|g| i64::from(*g) == resource.gid) {
        1
    } else {
        2
    };
    resource.perms.allows(class, access)
}

pub(crate) fn check(identity: Option<&Identity>, resource: &Resource, access: Access) -> Result<()> {
    if permits(identity, resource, access) {
        Ok(())
    } else {
        Err(StoreError::Forbidden(format!(
            "{:?} on {}/{}",
            access, resource.vname, resource.name
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Perms;

    fn resource(perms: &str) -> Resource {
        Resource {
            uid: 1000,
            gid: 2000,
            perms: perms.parse::<Perms>().unwrap(),
            ..Resource::default()
        }
    }

    fn who(uid: u32, gids: &[u32]) -> Identity {
        Identity {
            uid,
            gids: gids.to_vec(),
        }
    }

    #[test]
    fn test_owner_group_other() {
        let r = resource("rw-r-----");
        assert!(permits(Some(&who(1000, &[])), &r, Access::Write));
        assert!(permits(Some(&who(1001, &[2000])), &r, Access::Read));
        assert!(!permits(Some(&who(1001, &[2000])), &r, Access::Write));
        assert!(!permits(Some(&who(1001, &[3000])), &r, Access::Read));
    }

    #[test]
    fn test_owner_class_wins_over_group() {
        // owner bits apply even when they are narrower than group bits
        let r = resource("---rw----");
        assert!(!permits(Some(&who(1000, &[2000])), &r, Access::Read));
    }

    #[test]
    fn test_root_and_service_bypass() {
        let r = resource("---------");
        assert!(permits(Some(&who(0, &[])), &r, Access::Write));
        assert!(permits(None, &r, Access::Write));
        assert!(check(Some(&who(5, &[])), &r, Access::Read).is_err());
    }
}
