//! Startup check that the ICMP socket mode matches the process privileges.

use nix::unistd::geteuid;

use crate::{Error, Result};

/// Whether the process runs with an effective uid of root.
pub fn running_as_root() -> bool {
    geteuid().is_root()
}

/// Fail when `privileged` disagrees with the effective user.
///
/// Only meaningful when ICMP targets are configured; callers skip it otherwise.
pub fn check_privileges(privileged: bool) -> Result<()> {
    check(privileged, running_as_root())
}

fn check(privileged: bool, is_root: bool) -> Result<()> {
    match (privileged, is_root) {
        (true, false) => Err(Error::Privilege(
            "running privileged mode with unprivileged user".to_string(),
        )),
        (false, true) => Err(Error::Privilege(
            "running unprivileged mode with privileged user".to_string(),
        )),
        _ => Ok(()),
    }
}
