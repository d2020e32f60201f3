use std::process::{Command, ExitStatus};

use anyhow::{Context, Result, anyhow};
use tracing::{info, warn};

#[cfg(unix)]
use std::os::unix::process::CommandExt;

/// External media player launched with the chosen source URL appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Player {
    program: String,
    args: Vec<String>,
}

impl Player {
    /// `None` when the setting is blank, meaning sources are only printed.
    pub(crate) fn from_setting(raw: &str) -> Option<Self> {
        let mut words = raw.split_whitespace().map(str::to_string);
        let program = words.next()?;
        Some(Self {
            program,
            args: words.collect(),
        })
    }

    fn command(&self, source: &str, title: &str) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if self.program.ends_with("mpv") {
            cmd.arg(format!("--force-media-title={title}"));
        }
        cmd.arg(source);
        cmd
    }

    /// Runs the player in the foreground and waits for it to exit. Ctrl-C is
    /// delivered to the player only.
    pub(crate) fn play(&self, source: &str, title: &str) -> Result<()> {
        info!(player = %self.program, title, "launching player");
        let status = with_sigint_ignored(|| run_foreground(self.command(source, title), &self.program))?;
        if !status.success() {
            warn!(player = %self.program, ?status, "player exited with failure");
            return Err(anyhow!("{} exited with {status}", self.program));
        }
        Ok(())
    }
}

#[cfg(unix)]
struct IgnoredSignal {
    signum: libc::c_int,
    previous: libc::sigaction,
}

#[cfg(unix)]
impl IgnoredSignal {
    fn install(signum: libc::c_int) -> Result<Self> {
        unsafe {
            let mut ignore: libc::sigaction = std::mem::zeroed();
            ignore.sa_sigaction = libc::SIG_IGN;
            libc::sigemptyset(&mut ignore.sa_mask);

            let mut previous: libc::sigaction = std::mem::zeroed();
            if libc::sigaction(signum, &ignore, &mut previous) != 0 {
                return Err(anyhow!("could not ignore signal {signum}"));
            }
            Ok(Self { signum, previous })
        }
    }
}

#[cfg(unix)]
impl Drop for IgnoredSignal {
    fn drop(&mut self) {
        unsafe {
            let _ = libc::sigaction(self.signum, &self.previous, std::ptr::null_mut());
        }
    }
}

/// Gives the terminal to the child's process group and takes it back on drop.
#[cfg(unix)]
struct ForegroundHandoff {
    tty: libc::c_int,
    owner: libc::pid_t,
    handed_off: bool,
}

#[cfg(unix)]
impl ForegroundHandoff {
    fn give_to(&mut self, child_group: libc::pid_t) {
        self.handed_off = unsafe { libc::tcsetpgrp(self.tty, child_group) == 0 };
    }
}

#[cfg(unix)]
impl Drop for ForegroundHandoff {
    fn drop(&mut self) {
        if self.handed_off {
            unsafe {
                let _ = libc::tcsetpgrp(self.tty, self.owner);
            }
        }
    }
}

#[cfg(unix)]
fn with_sigint_ignored<F, T>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    let _guard = IgnoredSignal::install(libc::SIGINT)?;
    f()
}

#[cfg(not(unix))]
fn with_sigint_ignored<F, T>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    f()
}

#[cfg(unix)]
fn run_foreground(mut cmd: Command, program: &str) -> Result<ExitStatus> {
    let tty = libc::STDIN_FILENO;
    let owner = unsafe { libc::tcgetpgrp(tty) };
    if owner == -1 {
        // No controlling terminal, e.g. when piped.
        return cmd
            .status()
            .with_context(|| format!("failed to launch {program}"));
    }

    let _sigttou = IgnoredSignal::install(libc::SIGTTOU)?;
    let mut handoff = ForegroundHandoff {
        tty,
        owner,
        handed_off: false,
    };

    unsafe {
        cmd.pre_exec(|| {
            libc::signal(libc::SIGINT, libc::SIG_DFL);
            libc::signal(libc::SIGQUIT, libc::SIG_DFL);
            libc::signal(libc::SIGTSTP, libc::SIG_DFL);
            if libc::setpgid(0, 0) != 0 {
                return Err(std::io::Error::last_os_error());
            }
            Ok(())
        });
    }

    let mut child = cmd
        .spawn()
        .with_context(|| format!("failed to spawn {program}"))?;
    handoff.give_to(child.id() as libc::pid_t);
    child
        .wait()
        .with_context(|| format!("failed waiting on {program}"))
}

#[cfg(not(unix))]
fn run_foreground(mut cmd: Command, program: &str) -> Result<ExitStatus> {
    cmd.status()
        .with_context(|| format!("failed to launch {program}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_setting_means_no_player() {
        assert_eq!(Player::from_setting(""), None);
        assert_eq!(Player::from_setting("   "), None);
    }

    #[test]
    fn setting_splits_program_and_arguments() {
        let player = Player::from_setting("vlc --fullscreen").expect("player");
        assert_eq!(player.program, "vlc");
        let cmd = player.command("https://cdn.test/a.m3u8", "Show 1");
        let args = cmd
            .get_args()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect::<Vec<_>>();
        assert_eq!(args, vec!["--fullscreen", "https://cdn.test/a.m3u8"]);
    }

    #[test]
    fn mpv_gets_a_media_title() {
        let player = Player::from_setting("mpv").expect("player");
        let cmd = player.command("u", "Show 2");
        let args = cmd
            .get_args()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect::<Vec<_>>();
        assert_eq!(args, vec!["--force-media-title=Show 2", "u"]);
    }

    #[cfg(unix)]
    #[test]
    fn failing_player_is_reported() {
        let player = Player::from_setting("false").expect("player");
        assert!(player.play("u", "t").is_err());
    }
}
