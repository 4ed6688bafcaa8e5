//! Root privilege handling
//!
//! Link changes need CAP_NET_ADMIN. Instead of failing halfway through setup,
//! `up` re-launches itself through sudo before anything is touched.

use crate::error::{Error, Result};
use nix::unistd::geteuid;
use std::ffi::OsString;
use std::os::unix::process::CommandExt;
use std::process::Command;
use tracing::info;

/// Passed to the re-launched process so it never loops
const NO_ELEVATE_FLAG: &str = "--no-elevate";

pub fn is_root() -> bool {
    geteuid().is_root()
}

/// Command line that re-runs this process under sudo
pub fn sudo_command(program: OsString, args: impl IntoIterator<Item = OsString>) -> Command {
    let mut cmd = Command::new("sudo");
    cmd.arg(program).arg(NO_ELEVATE_FLAG).args(args);
    cmd
}

/// Replace this process with itself under sudo
///
/// Only returns on failure.
pub fn reexec_with_sudo() -> Error {
    let program = match std::env::current_exe() {
        Ok(path) => path.into_os_string(),
        Err(e) => return Error::Elevation(format!("cannot locate own executable: {}", e)),
    };
    info!("not running as root, re-launching with sudo");
    let err = sudo_command(program, std::env::args_os().skip(1)).exec();
    Error::Elevation(format!("sudo: {}", err))
}

/// Re-launch through sudo unless already root or told not to
pub fn ensure_root(no_elevate: bool) -> Result<()> {
    if is_root() || no_elevate {
        return Ok(());
    }
    Err(reexec_with_sudo())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sudo_command_line() {
        let cmd = sudo_command(
            OsString::from("/usr/local/bin/bridgespoof"),
            ["up", "--first", "eth1"].map(OsString::from),
        );
        assert_eq!(cmd.get_program(), "sudo");
        let args: Vec<_> = cmd.get_args().collect();
        assert_eq!(
            args,
            ["/usr/local/bin/bridgespoof", "--no-elevate", "up", "--first", "eth1"]
        );
    }

    #[test]
    fn test_no_elevate_skips_reexec() {
        assert!(ensure_root(true).is_ok());
    }
}
