use crate::models::{role::Role, session::Principal};

/// The account created first; it can never be demoted.
pub const BOOTSTRAP_ADMIN_ID: i32 = 1;

/// Admins and privileged readers may see restricted content.
pub fn has_elevated_access(role: Role) -> bool {
    matches!(role, Role::Admin | Role::Privileged)
}

pub fn is_admin(role: Role) -> bool {
    matches!(role, Role::Admin)
}

/// Why a profile update was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum UpdateDenied {
    #[error("only admins may edit other users")]
    NotOwner,
    #[error("the bootstrap admin cannot be demoted")]
    BootstrapDemotion,
    #[error("only admins may grant the admin role")]
    Escalation,
}

/// Decides whether `actor` may set user `target_id`'s role to `requested_role`
/// (along with the rest of the profile).
pub fn authorize_user_update(
    actor: &Principal,
    target_id: i32,
    requested_role: Role,
) -> Result<(), UpdateDenied> {
    if actor.subject_id != target_id && !is_admin(actor.role) {
        return Err(UpdateDenied::NotOwner);
    }
    if target_id == BOOTSTRAP_ADMIN_ID && !is_admin(requested_role) {
        return Err(UpdateDenied::BootstrapDemotion);
    }
    if !is_admin(actor.role) && is_admin(requested_role) {
        return Err(UpdateDenied::Escalation);
    }
    Ok(())
}
