/// Authorization policy
///
/// Pure predicates over the caller's [`AuthContext`] and the resource being
/// touched. Nothing here reads the database; services load the resource first
/// (so a missing resource is reported as not found) and then ask the policy.
///
/// # Permission Model
///
/// | Action | Allowed |
/// |---|---|
/// | view a task, list/add its comments | owner, supporter, admin |
/// | owner-level status changes | owner |
/// | approve / reject | admin |
/// | delete a task | owner, admin |
/// | edit / delete a comment | author, admin |
/// | dashboard stats | supporter, admin |
/// | user management | admin |
///
/// `admin` is protected: no role change or deletion ever applies to an admin.
///
/// # Example
///
/// ```
/// use dailytask_shared::auth::authorization::{check_role_change, RoleChange, RoleChangeDenial};
/// use dailytask_shared::models::user::UserRole;
///
/// // An admin promoting a supporter to admin is fine
/// assert!(check_role_change(UserRole::Admin, UserRole::Supporter, RoleChange::PromoteAdmin).is_ok());
///
/// // Nobody can touch another admin
/// assert_eq!(
///     check_role_change(UserRole::Admin, UserRole::Admin, RoleChange::Demote),
///     Err(RoleChangeDenial::AdminProtected),
/// );
/// ```

use super::middleware::AuthContext;
use crate::models::comment::Comment;
use crate::models::task::Task;
use crate::models::user::UserRole;

/// Error type for authorization checks
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthzError {
    /// Caller's role is too low
    #[error("Insufficient permissions: requires {required}, has {actual}")]
    InsufficientRole { required: UserRole, actual: UserRole },

    /// Caller doesn't own the resource
    #[error("Not authorized to access this resource")]
    NotAuthorized,
}

/// Task operations subject to policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskAction {
    /// Generic status update by the owner
    UpdateStatus,

    /// Owner sends a reviewed task back to pending
    Revert,

    Approve,

    Reject,

    Delete,
}

/// Whether the caller owns the task (case-insensitive email match)
pub fn owns_task(user: &AuthContext, task: &Task) -> bool {
    task.is_owned_by(&user.email)
}

/// Owner, supporter or admin
pub fn can_view_task(user: &AuthContext, task: &Task) -> bool {
    user.is_reviewer() || owns_task(user, task)
}

pub fn can_mutate_task(user: &AuthContext, task: &Task, action: TaskAction) -> bool {
    match action {
        TaskAction::UpdateStatus | TaskAction::Revert => owns_task(user, task),
        TaskAction::Approve | TaskAction::Reject => user.is_admin(),
        TaskAction::Delete => user.is_admin() || owns_task(user, task),
    }
}

/// Author or admin
pub fn can_modify_comment(user: &AuthContext, comment: &Comment) -> bool {
    user.is_admin() || comment.is_authored_by(&user.email)
}

pub fn can_manage_users(user: &AuthContext) -> bool {
    user.is_admin()
}

pub fn can_view_stats(user: &AuthContext) -> bool {
    user.is_reviewer()
}

/// Whether the caller may list every task rather than only completed ones
pub fn can_view_all_tasks(user: &AuthContext) -> bool {
    user.is_reviewer()
}

/// Requires at least `required`
pub fn require_role(user: &AuthContext, required: UserRole) -> Result<(), AuthzError> {
    if user.role >= required {
        Ok(())
    } else {
        Err(AuthzError::InsufficientRole {
            required,
            actual: user.role,
        })
    }
}

pub fn require_task_action(
    user: &AuthContext,
    task: &Task,
    action: TaskAction,
) -> Result<(), AuthzError> {
    if can_mutate_task(user, task, action) {
        Ok(())
    } else {
        Err(AuthzError::NotAuthorized)
    }
}

/// Admin-initiated role changes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleChange {
    PromoteAdmin,
    PromoteSupporter,
    Demote,
}

impl RoleChange {
    pub fn target_role(&self) -> UserRole {
        match self {
            RoleChange::PromoteAdmin => UserRole::Admin,
            RoleChange::PromoteSupporter => UserRole::Supporter,
            RoleChange::Demote => UserRole::User,
        }
    }
}

/// Why a role change or user deletion was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RoleChangeDenial {
    #[error("Only admins can manage users")]
    NotAdmin,

    #[error("Admin accounts cannot be modified")]
    AdminProtected,

    #[error("User already has the {0} role")]
    AlreadyHasRole(UserRole),

    #[error("User has no elevated role to remove")]
    NotElevated,
}

impl RoleChangeDenial {
    /// Denials caused by the caller's privileges rather than the request
    pub fn is_forbidden(&self) -> bool {
        matches!(self, RoleChangeDenial::NotAdmin | RoleChangeDenial::AdminProtected)
    }
}

/// Decides whether `actor` may apply `change` to a user currently holding `current`
///
/// - the actor must be an admin
/// - an admin target is never changed
/// - a change to the role the target already has is refused
/// - demote only applies to supporters
pub fn check_role_change(
    actor: UserRole,
    current: UserRole,
    change: RoleChange,
) -> Result<(), RoleChangeDenial> {
    if actor != UserRole::Admin {
        return Err(RoleChangeDenial::NotAdmin);
    }

    if current == UserRole::Admin {
        return Err(RoleChangeDenial::AdminProtected);
    }

    let target = change.target_role();
    if current == target {
        return Err(RoleChangeDenial::AlreadyHasRole(target));
    }

    match change {
        RoleChange::Demote if current < UserRole::Supporter => Err(RoleChangeDenial::NotElevated),
        _ => Ok(()),
    }
}

/// Decides whether `actor` may delete a user holding `target`
pub fn check_user_deletion(actor: UserRole, target: UserRole) -> Result<(), RoleChangeDenial> {
    if actor != UserRole::Admin {
        return Err(RoleChangeDenial::NotAdmin);
    }

    if target == UserRole::Admin {
        return Err(RoleChangeDenial::AdminProtected);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::middleware::AuthMethod;
    use crate::models::task::tests::sample_task;
    use crate::models::task::TaskStatus;
    use uuid::Uuid;

    fn ctx(email: &str, role: UserRole) -> AuthContext {
        AuthContext {
            user_id: Uuid::new_v4(),
            email: email.to_string(),
            name: None,
            role,
            method: AuthMethod::Local,
        }
    }

    #[test]
    fn test_view_task() {
        let task = sample_task("u1@x.com", TaskStatus::Pending);

        assert!(can_view_task(&ctx("U1@X.com", UserRole::User), &task));
        assert!(can_view_task(&ctx("sup@x.com", UserRole::Supporter), &task));
        assert!(can_view_task(&ctx("admin@x.com", UserRole::Admin), &task));
        assert!(!can_view_task(&ctx("u2@x.com", UserRole::User), &task));
        assert!(!can_view_task(&ctx("g@x.com", UserRole::Guest), &task));
    }

    #[test]
    fn test_review_actions_are_admin_only() {
        let task = sample_task("u1@x.com", TaskStatus::Pending);
        let owner = ctx("u1@x.com", UserRole::User);
        let supporter = ctx("sup@x.com", UserRole::Supporter);
        let admin = ctx("admin@x.com", UserRole::Admin);

        for action in [TaskAction::Approve, TaskAction::Reject] {
            assert!(!can_mutate_task(&owner, &task, action));
            assert!(!can_mutate_task(&supporter, &task, action));
            assert!(can_mutate_task(&admin, &task, action));
        }
    }

    #[test]
    fn test_owner_actions() {
        let task = sample_task("u1@x.com", TaskStatus::Review);
        let owner = ctx("U1@x.COM", UserRole::User);
        let admin = ctx("admin@x.com", UserRole::Admin);
        let other = ctx("u2@x.com", UserRole::User);

        assert!(can_mutate_task(&owner, &task, TaskAction::UpdateStatus));
        assert!(can_mutate_task(&owner, &task, TaskAction::Revert));
        assert!(!can_mutate_task(&admin, &task, TaskAction::UpdateStatus));
        assert!(!can_mutate_task(&other, &task, TaskAction::Revert));

        assert!(can_mutate_task(&owner, &task, TaskAction::Delete));
        assert!(can_mutate_task(&admin, &task, TaskAction::Delete));
        assert_eq!(
            require_task_action(&other, &task, TaskAction::Delete),
            Err(AuthzError::NotAuthorized)
        );
    }

    #[test]
    fn test_dashboard_and_user_management() {
        assert!(can_view_stats(&ctx("s@x.com", UserRole::Supporter)));
        assert!(can_view_stats(&ctx("a@x.com", UserRole::Admin)));
        assert!(!can_view_stats(&ctx("u@x.com", UserRole::User)));

        assert!(can_manage_users(&ctx("a@x.com", UserRole::Admin)));
        assert!(!can_manage_users(&ctx("s@x.com", UserRole::Supporter)));

        assert!(require_role(&ctx("s@x.com", UserRole::Supporter), UserRole::Supporter).is_ok());
        assert_eq!(
            require_role(&ctx("u@x.com", UserRole::User), UserRole::Admin),
            Err(AuthzError::InsufficientRole {
                required: UserRole::Admin,
                actual: UserRole::User
            })
        );
    }

    #[test]
    fn test_comment_modification() {
        let now = chrono::Utc::now();
        let comment = Comment {
            id: Uuid::new_v4(),
            task_id: Uuid::new_v4(),
            author_email: "sup@x.com".to_string(),
            author_name: None,
            content: "ok".to_string(),
            created_at: now,
            updated_at: now,
        };

        assert!(can_modify_comment(&ctx("SUP@x.com", UserRole::Supporter), &comment));
        assert!(can_modify_comment(&ctx("admin@x.com", UserRole::Admin), &comment));
        assert!(!can_modify_comment(&ctx("u1@x.com", UserRole::User), &comment));
    }

    #[test]
    fn test_role_change_rules() {
        use RoleChange::*;

        assert_eq!(
            check_role_change(UserRole::Supporter, UserRole::User, PromoteSupporter),
            Err(RoleChangeDenial::NotAdmin)
        );

        for change in [PromoteAdmin, PromoteSupporter, Demote] {
            assert_eq!(
                check_role_change(UserRole::Admin, UserRole::Admin, change),
                Err(RoleChangeDenial::AdminProtected)
            );
        }

        assert_eq!(
            check_role_change(UserRole::Admin, UserRole::Supporter, PromoteSupporter),
            Err(RoleChangeDenial::AlreadyHasRole(UserRole::Supporter))
        );
        assert_eq!(
            check_role_change(UserRole::Admin, UserRole::User, Demote),
            Err(RoleChangeDenial::AlreadyHasRole(UserRole::User))
        );
        assert_eq!(
            check_role_change(UserRole::Admin, UserRole::Guest, Demote),
            Err(RoleChangeDenial::NotElevated)
        );

        assert!(check_role_change(UserRole::Admin, UserRole::User, PromoteSupporter).is_ok());
        assert!(check_role_change(UserRole::Admin, UserRole::Guest, PromoteSupporter).is_ok());
        assert!(check_role_change(UserRole::Admin, UserRole::Supporter, PromoteAdmin).is_ok());
        assert!(check_role_change(UserRole::Admin, UserRole::Supporter, Demote).is_ok());
    }

    #[test]
    fn test_user_deletion_rules() {
        assert_eq!(
            check_user_deletion(UserRole::Admin, UserRole::Admin),
            Err(RoleChangeDenial::AdminProtected)
        );
        assert_eq!(
            check_user_deletion(UserRole::Supporter, UserRole::User),
            Err(RoleChangeDenial::NotAdmin)
        );
        assert!(check_user_deletion(UserRole::Admin, UserRole::Supporter).is_ok());
        assert!(RoleChangeDenial::AdminProtected.is_forbidden());
        assert!(!RoleChangeDenial::NotElevated.is_forbidden());
    }
}
