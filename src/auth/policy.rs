//! Access rules for files, groups and administrative resources.
//!
//! The functions here are pure: callers look up group membership and pass
//! it in, so every rule can be tested without a database.

use thiserror::Error;

use crate::db::Role;
use crate::file::FileMetadata;

/// The authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: i64,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: i64, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Things that can be done to a stored file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileAction {
    View,
    Download,
    Delete,
    /// Approve or reject.
    Moderate,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct PolicyError(pub &'static str);

pub fn require_admin(actor: &Actor) -> Result<(), PolicyError> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(PolicyError("admin access required"))
    }
}

/// Whether `actor` owns `file`.
pub fn owns(actor: &Actor, file: &FileMetadata) -> bool {
    file.user_id == actor.user_id
}

/// Decide a file action. `in_file_group` is whether the actor belongs to the
/// file's group; it's only consulted for view and download.
pub fn authorize_file(
    actor: &Actor,
    file: &FileMetadata,
    in_file_group: bool,
    action: FileAction,
) -> Result<(), PolicyError> {
    if actor.is_admin() {
        return Ok(());
    }
    let allowed = match action {
        FileAction::View | FileAction::Download => owns(actor, file) || in_file_group,
        FileAction::Delete => owns(actor, file),
        FileAction::Moderate => false,
    };
    if allowed {
        Ok(())
    } else if action == FileAction::Moderate {
        Err(PolicyError("only administrators can approve or reject files"))
    } else {
        Err(PolicyError("you do not have access to this file"))
    }
}

/// Uploading into a group requires membership unless admin.
pub fn authorize_upload(actor: &Actor, in_group: bool) -> Result<(), PolicyError> {
    if actor.is_admin() || in_group {
        Ok(())
    } else {
        Err(PolicyError("you are not a member of this group"))
    }
}

/// Reading a group requires membership unless admin.
pub fn authorize_group_read(actor: &Actor, in_group: bool) -> Result<(), PolicyError> {
    if actor.is_admin() || in_group {
        Ok(())
    } else {
        Err(PolicyError("you are not a member of this group"))
    }
}

/// Whether a file's owner or group membership needs to be looked up at all.
pub fn needs_membership_lookup(actor: &Actor, file: &FileMetadata) -> bool {
    !actor.is_admin() && !owns(actor, file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::ApprovalState;

    fn file_owned_by(user_id: i64) -> FileMetadata {
        FileMetadata {
            id: 1,
            user_id,
            group_id: 10,
            original_name: "a.txt".to_string(),
            stored_name: "x.txt".to_string(),
            mime_type: "text/plain".to_string(),
            size: 1,
            description: None,
            status: ApprovalState::Pending,
            rejection_reason: None,
            created_at: "2024-01-01 00:00:00".to_string(),
        }
    }

    const ADMIN: Actor = Actor {
        user_id: 1,
        role: Role::Admin,
    };
    const OWNER: Actor = Actor {
        user_id: 2,
        role: Role::Regular,
    };
    const OTHER: Actor = Actor {
        user_id: 3,
        role: Role::Regular,
    };

    #[test]
    fn test_admin_can_do_everything() {
        let file = file_owned_by(2);
        for action in [
            FileAction::View,
            FileAction::Download,
            FileAction::Delete,
            FileAction::Moderate,
        ] {
            assert!(authorize_file(&ADMIN, &file, false, action).is_ok());
        }
        assert!(require_admin(&ADMIN).is_ok());
        assert!(authorize_upload(&ADMIN, false).is_ok());
        assert!(authorize_group_read(&ADMIN, false).is_ok());
    }

    #[test]
    fn test_owner_rights() {
        let file = file_owned_by(2);
        assert!(authorize_file(&OWNER, &file, false, FileAction::View).is_ok());
        assert!(authorize_file(&OWNER, &file, false, FileAction::Download).is_ok());
        assert!(authorize_file(&OWNER, &file, false, FileAction::Delete).is_ok());
        assert!(authorize_file(&OWNER, &file, true, FileAction::Moderate).is_err());
        assert!(!needs_membership_lookup(&OWNER, &file));
    }

    #[test]
    fn test_group_member_can_view_not_delete() {
        let file = file_owned_by(2);
        assert!(needs_membership_lookup(&OTHER, &file));
        assert!(authorize_file(&OTHER, &file, true, FileAction::View).is_ok());
        assert!(authorize_file(&OTHER, &file, true, FileAction::Download).is_ok());
        assert!(authorize_file(&OTHER, &file, true, FileAction::Delete).is_err());
    }

    #[test]
    fn test_outsider_denied() {
        let file = file_owned_by(2);
        assert!(authorize_file(&OTHER, &file, false, FileAction::View).is_err());
        assert!(authorize_upload(&OTHER, false).is_err());
        assert!(authorize_group_read(&OTHER, false).is_err());
        assert_eq!(
            require_admin(&OTHER),
            Err(PolicyError("admin access required"))
        );
    }
}
