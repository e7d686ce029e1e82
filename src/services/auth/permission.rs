//! Role-based permission check.
//!
//! A user's permissions are the union across all of its roles (no role inheritance).
//! A route's required set is satisfied by holding any one of its permissions.
use std::collections::HashSet;

use crate::repos::user_repo::UserRecord;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionSet<'a>(HashSet<&'a str>);

impl<'a> PermissionSet<'a> {
    pub fn of(user: &'a UserRecord) -> Self {
        Self(
            user.roles
                .iter()
                .flat_map(|role| role.permissions.iter())
                .map(|p| p.name.as_str())
                .collect(),
        )
    }

    pub fn contains(&self, permission: &str) -> bool {
        self.0.contains(permission)
    }

    pub fn grants_any<S: AsRef<str>>(&self, required: &[S]) -> bool {
        required.iter().any(|p| self.contains(p.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sorted names, for responses and logs.
    pub fn sorted(&self) -> Vec<&'a str> {
        let mut names: Vec<&str> = self.0.iter().copied().collect();
        names.sort_unstable();
        names
    }
}

/// `true` iff the user holds at least one of `required`. An empty requirement grants nothing.
pub fn authorize<S: AsRef<str>>(user: &UserRecord, required: &[S]) -> bool {
    PermissionSet::of(user).grants_any(required)
}
