use serde::{Deserialize, Serialize};
use std::fmt;

/// The access level attached to a user, a session, or a signed claim.
///
/// The numeric values are the storage and wire encoding; they carry no
/// ordering meaning. Use the predicates in `services::authorization` instead
/// of comparing variants numerically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum Role {
    /// No account, or an account whose access request is still pending.
    Anonymous,
    /// A regular reader.
    NonPrivileged,
    /// Full administrative capability.
    Admin,
    /// A reader allowed to see restricted content.
    Privileged,
}

impl Role {
    /// Every role, in wire-value order.
    pub const ALL: [Role; 4] = [
        Role::Anonymous,
        Role::NonPrivileged,
        Role::Admin,
        Role::Privileged,
    ];

    /// The integer stored in the `users.role` column and in claims.
    pub fn code(self) -> i32 {
        match self {
            Role::Anonymous => -1,
            Role::NonPrivileged => 0,
            Role::Admin => 1,
            Role::Privileged => 2,
        }
    }
}

impl From<Role> for i32 {
    fn from(role: Role) -> Self {
        role.code()
    }
}

impl TryFrom<i32> for Role {
    type Error = UnknownRole;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(Role::Anonymous),
            0 => Ok(Role::NonPrivileged),
            1 => Ok(Role::Admin),
            2 => Ok(Role::Privileged),
            other => Err(UnknownRole(other)),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Anonymous => "anonymous",
            Role::NonPrivileged => "non-privileged",
            Role::Admin => "admin",
            Role::Privileged => "privileged",
        };
        f.write_str(name)
    }
}

/// A role code outside the closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown role code {0}")]
pub struct UnknownRole(pub i32);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip() {
        for role in Role::ALL {
            assert_eq!(Role::try_from(role.code()), Ok(role));
        }
        assert_eq!(Role::try_from(3), Err(UnknownRole(3)));
    }

    #[test]
    fn serializes_as_integer() {
        assert_eq!(sonic_rs::to_string(&Role::Privileged).unwrap(), "2");
        let parsed: Role = sonic_rs::from_str("-1").unwrap();
        assert_eq!(parsed, Role::Anonymous);
        assert!(sonic_rs::from_str::<Role>("7").is_err());
    }
}
