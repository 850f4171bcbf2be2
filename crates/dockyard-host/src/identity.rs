use std::fmt;

use nix::unistd::{Gid, Uid, User, getegid, geteuid};

/// The user/group a provisioning run assigns ownership to.
///
/// Resolved once at the start of a run and passed around explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub uid: Uid,
    pub gid: Gid,
    /// Login name, when the uid has a passwd entry
    pub user: Option<String>,
}

impl Identity {
    /// The effective identity of the current process.
    ///
    /// # Errors
    ///
    /// [`IdentityError::Lookup`] if the user database cannot be queried.
    /// A uid without a passwd entry is not an error.
    pub fn current() -> Result<Self, IdentityError> {
        let uid = geteuid();
        let gid = getegid();
        let user = User::from_uid(uid)
            .map_err(|e| IdentityError::Lookup {
                uid: uid.as_raw(),
                source: e,
            })?
            .map(|u| u.name);

        tracing::debug!(uid = uid.as_raw(), gid = gid.as_raw(), user = ?user, "identity resolved");
        Ok(Self { uid, gid, user })
    }

    pub fn from_raw(uid: u32, gid: u32) -> Self {
        Self {
            uid: Uid::from_raw(uid),
            gid: Gid::from_raw(gid),
            user: None,
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.user {
            Some(name) => write!(f, "uid={}({name}) gid={}", self.uid, self.gid),
            None => write!(f, "uid={} gid={}", self.uid, self.gid),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("failed to look up user {uid}")]
    Lookup { uid: u32, source: nix::Error },
}
