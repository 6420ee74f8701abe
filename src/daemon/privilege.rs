//! uid/gid resolution and privilege drop (§4.6), hard-failing on lookup
//! or drop errors rather than continuing as root.
//!
//! Grounded in the original `nrpe_ng/server.py` (`setup()`'s
//! `sys.exit(1)` on `KeyError` for `nrpe_user`/`nrpe_group`); restructured
//! from the teacher's soft-fail, continue-as-root `drop_privileges()`
//! since this daemon's supervisor must never run commands as root by
//! accident (§4.6 requires the drop to be unconditional once configured).

use std::ffi::CString;

use nix::errno::Errno;
use nix::unistd::{initgroups, setgid, setuid, Gid, Group, Uid, User};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PrivilegeError {
    #[error("invalid nrpe_user: {0}")]
    UnknownUser(String),
    #[error("invalid nrpe_group: {0}")]
    UnknownGroup(String),
    #[error("failed to look up {0}: {1}")]
    Lookup(&'static str, Errno),
    #[error("failed to initialize supplementary groups: {0}")]
    InitGroups(Errno),
    #[error("failed to set gid: {0}")]
    SetGid(Errno),
    #[error("failed to set uid: {0}")]
    SetUid(Errno),
}

/// The uid/gid pair the agent will run as once privileges are dropped.
pub struct Identity {
    pub uid: Uid,
    pub gid: Gid,
    pub user_name: String,
}

/// Resolve `nrpe_user`/`nrpe_group` to a uid/gid pair. Any lookup failure
/// is fatal at startup (§7 "TLS material error"-equivalent: a bind/setup
/// error, not a config error, since it depends on the host's user
/// database rather than the file's syntax).
pub fn resolve(user: &str, group: &str) -> Result<Identity, PrivilegeError> {
    let u = User::from_name(user)
        .map_err(|e| PrivilegeError::Lookup("nrpe_user", e))?
        .ok_or_else(|| PrivilegeError::UnknownUser(user.to_string()))?;
    let g = Group::from_name(group)
        .map_err(|e| PrivilegeError::Lookup("nrpe_group", e))?
        .ok_or_else(|| PrivilegeError::UnknownGroup(group.to_string()))?;
    Ok(Identity {
        uid: u.uid,
        gid: g.gid,
        user_name: u.name,
    })
}

/// Drop from root to `identity`: initialize supplementary groups from the
/// target user's `/etc/group` memberships, then drop gid, then uid. This
/// is the only safe order — dropping uid first would leave the process
/// unable to change its gid anymore.
pub fn drop_to(identity: &Identity) -> Result<(), PrivilegeError> {
    let user_cstr =
        CString::new(identity.user_name.as_str()).expect("username must not contain a NUL byte");
    initgroups(&user_cstr, identity.gid).map_err(PrivilegeError::InitGroups)?;
    setgid(identity.gid).map_err(PrivilegeError::SetGid)?;
    setuid(identity.uid).map_err(PrivilegeError::SetUid)?;
    Ok(())
}
