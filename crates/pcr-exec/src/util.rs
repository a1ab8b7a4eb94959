use std::{process::Stdio, time::Duration};

use tokio::{
    io::{AsyncRead, AsyncReadExt},
    process::{Child, Command},
};

use crate::error::ExecError;

pub fn cmd_program(program: &str, args: &[String]) -> Command {
    let mut cmd = Command::new(program);
    cmd.args(args.iter().map(|s| s.as_str()));
    cmd
}

pub fn cmd_shell(script: &str) -> Command {
    cfg_if::cfg_if! {
        if #[cfg(target_family = "windows")] {
            let mut cmd = Command::new("cmd");
            cmd.arg("/C").arg(script);
        } else {
            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(script);
        }
    }
    cmd
}

/// Build the command for a check: argv split POSIX-style, or handed to the shell as is.
///
/// Output is piped, stdin closed, and the child is killed if the handle is dropped.
pub fn build_command(command: &str, shell: bool) -> Result<Command, ExecError> {
    let mut cmd = if shell {
        if command.trim().is_empty() {
            return Err(ExecError::MissingProgram);
        }
        cmd_shell(command)
    } else {
        let argv =
            shlex::split(command).ok_or_else(|| ExecError::InvalidCommand(command.to_string()))?;
        let (program, args) = argv.split_first().ok_or(ExecError::MissingProgram)?;
        cmd_program(program, args)
    };

    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    Ok(cmd)
}

/// Read a pipe to the end; a broken pipe yields whatever was read so far.
pub async fn drain<R>(pipe: Option<R>) -> Vec<u8>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        let _ = pipe.read_to_end(&mut buf).await;
    }
    buf
}

/// Join the lines of captured output with single spaces.
pub fn single_line(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .lines()
        .collect::<Vec<_>>()
        .join(" ")
}

/// SIGTERM, wait up to `grace`, then SIGKILL.
///
/// A child that already exited is not an error.
#[cfg(target_family = "unix")]
pub async fn kill_graceful(child: &mut Child, grace: Duration) -> std::io::Result<()> {
    if child.try_wait()?.is_some() {
        return Ok(());
    }
    if let Some(id) = child.id() {
        let rc = unsafe { libc::kill(id as libc::pid_t, libc::SIGTERM) };
        if rc != 0 {
            let err = std::io::Error::last_os_error();
            if err.raw_os_error() != Some(libc::ESRCH) {
                return Err(err);
            }
        }
        if tokio::time::timeout(grace, child.wait()).await.is_ok() {
            return Ok(());
        }
    }
    if child.try_wait()?.is_some() {
        return Ok(());
    }
    child.kill().await
}

#[cfg(target_family = "windows")]
pub async fn kill_graceful(child: &mut Child, _grace: Duration) -> std::io::Result<()> {
    if child.try_wait()?.is_some() {
        return Ok(());
    }
    child.kill().await
}
