//! Tool runner: one external command per unit.

use std::collections::BTreeSet;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::time::{sleep, timeout};

use super::{collect_valid, supervise, UnitContext, UnitOutcome};
use crate::domain::NormalizedDomain;
use crate::error::SourceError;
use crate::plugins::ToolPlugin;

const TERM_GRACE_MS: u64 = 200;
const KILL_GRACE_MS: u64 = 800;
const STDERR_SUMMARY_BYTES: usize = 512;

/// Run a tool plugin against `ctx.domain`.
pub async fn invoke(plugin: &ToolPlugin, ctx: &UnitContext<'_>) -> UnitOutcome {
    supervise(ctx, async {
        match execute(plugin, ctx.domain.as_str(), ctx.timeout).await {
            Ok(found) => UnitOutcome::Success(found),
            Err(err) => UnitOutcome::from_error(&plugin.name, err),
        }
    })
    .await
}

async fn execute(
    plugin: &ToolPlugin,
    domain: &str,
    limit: Duration,
) -> Result<BTreeSet<NormalizedDomain>, SourceError> {
    let argv = plugin.build_command(domain);
    let Some((program, args)) = argv.split_first() else {
        return Err(SourceError::PluginContractViolation(format!(
            "tool plugin '{}' has an empty command",
            plugin.name
        )));
    };

    let mut cmd = Command::new(program);
    cmd.args(args);
    configure_process_group(&mut cmd);
    cmd.kill_on_drop(true);
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    let mut child = cmd.spawn().map_err(|err| match err.kind() {
        std::io::ErrorKind::NotFound => SourceError::ExecutableNotFound(program.clone()),
        _ => SourceError::Io(err),
    })?;

    let mut group = ProcessGroupGuard::new(child.id());
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let finished = {
        let run = async { tokio::join!(child.wait(), read_pipe(stdout), read_pipe(stderr)) };
        timeout(limit, run).await
    };

    let (status, stdout, stderr) = match finished {
        Ok((status, stdout, stderr)) => (status?, stdout?, stderr?),
        Err(_) => {
            terminate_process_tree(&mut child).await;
            group.disarm();
            return Err(SourceError::Timeout(limit));
        }
    };
    group.disarm();

    if !status.success() {
        let code = exit_code(status);
        return Err(SourceError::ToolExecution {
            code,
            stderr: summarize_stderr(&stderr, code),
        });
    }

    let stdout = String::from_utf8_lossy(&stdout);
    Ok(collect_valid(&plugin.name, stdout.lines()))
}

fn configure_process_group(cmd: &mut Command) {
    #[cfg(unix)]
    {
        cmd.process_group(0);
    }
    #[cfg(not(unix))]
    {
        let _ = cmd;
    }
}

async fn read_pipe<R>(pipe: Option<R>) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

fn exit_code(status: ExitStatus) -> i32 {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    status.code().unwrap_or(-1)
}

fn summarize_stderr(stderr: &[u8], code: i32) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    if text.is_empty() {
        return format!("process exited with code {} without error output", code);
    }

    let mut start = text.len().saturating_sub(STDERR_SUMMARY_BYTES);
    while !text.is_char_boundary(start) {
        start += 1;
    }
    text[start..].to_string()
}

#[cfg(unix)]
fn signal_group(pid: u32, signal: libc::c_int) -> bool {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    // SAFETY: kill(2) has no memory-safety preconditions; a negative pid
    // addresses the group created by process_group(0).
    unsafe { libc::kill(-pid, signal) == 0 }
}

/// SIGKILLs the tool's whole process group when dropped while armed.
///
/// `kill_on_drop` only reaches the direct child; this covers anything it
/// forked when the unit future is dropped by cancellation or the batch
/// deadline.
struct ProcessGroupGuard {
    pid: Option<u32>,
}

impl ProcessGroupGuard {
    fn new(pid: Option<u32>) -> Self {
        Self { pid }
    }

    /// The child has been waited on; leave its group alone.
    fn disarm(&mut self) {
        self.pid = None;
    }
}

impl Drop for ProcessGroupGuard {
    fn drop(&mut self) {
        let Some(pid) = self.pid.take() else {
            return;
        };
        #[cfg(unix)]
        {
            if signal_group(pid, libc::SIGKILL) {
                tracing::debug!(pid, "Killed abandoned tool process group");
            }
        }
        #[cfg(not(unix))]
        {
            let _ = pid;
        }
    }
}

/// SIGTERM the tool's process group, then SIGKILL whatever survives the grace
/// period.
async fn terminate_process_tree(child: &mut Child) {
    let Some(pid) = child.id() else {
        let _ = child.kill().await;
        return;
    };

    #[cfg(unix)]
    {
        if signal_group(pid, libc::SIGTERM) {
            sleep(Duration::from_millis(TERM_GRACE_MS)).await;
            signal_group(pid, libc::SIGKILL);
        }
    }
    #[cfg(not(unix))]
    {
        let _ = pid;
        sleep(Duration::from_millis(TERM_GRACE_MS)).await;
    }

    if timeout(Duration::from_millis(KILL_GRACE_MS), child.wait())
        .await
        .is_err()
    {
        let _ = child.kill().await;
        let _ = child.wait().await;
    }
}
