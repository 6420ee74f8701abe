//! The command supervisor (§4.3): spawn, hard wall-clock timeout, two-stage
//! SIGTERM→SIGKILL escalation, zombie-free reaping.

use std::collections::HashMap;
use std::os::unix::process::ExitStatusExt;
use std::process::Stdio;
use std::time::Duration;

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio::time::{sleep, timeout};

use crate::command::CommandTemplate;
use crate::defaults::EXEC_PATH;

const TERMINATE_ATTEMPTS: u32 = 3;
const TERMINATE_SPACING: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("failed to spawn command: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Why `execute` returned the outcome it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Timeout,
}

#[derive(Debug, Clone)]
pub struct Outcome {
    pub status: Status,
    pub exit_code: i32,
    pub output: Vec<u8>,
}

/// Run `prefix + template.resolve(args)` under `timeout_duration`, escalating
/// to SIGTERM then SIGKILL on timeout. Never leaves a zombie behind.
pub async fn execute(
    template: &CommandTemplate,
    prefix: &[String],
    args: &HashMap<String, String>,
    timeout_duration: Duration,
) -> Result<Outcome, SupervisorError> {
    let mut argv: Vec<String> = prefix.to_vec();
    argv.extend(template.resolve(args));

    let Some((program, rest)) = argv.split_first() else {
        return Ok(Outcome {
            status: Status::Ok,
            exit_code: 127,
            output: b"empty command\n".to_vec(),
        });
    };

    let mut cmd = Command::new(program);
    cmd.args(rest)
        .env_clear()
        .env("PATH", EXEC_PATH)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    let mut child = cmd.spawn()?;
    let mut stdout_pipe = child.stdout.take().expect("stdout was piped");
    let output_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        let _ = stdout_pipe.read_to_end(&mut buf).await;
        buf
    });

    match timeout(timeout_duration, child.wait()).await {
        Ok(Ok(exit_status)) => {
            let output = output_task.await.unwrap_or_default();
            Ok(normal_outcome(exit_status, output))
        }
        Ok(Err(e)) => Err(SupervisorError::Spawn(e)),
        Err(_elapsed) => {
            terminate_hard(&mut child).await;
            let output = output_task.await.unwrap_or_default();
            Ok(Outcome {
                status: Status::Timeout,
                exit_code: -(Signal::SIGKILL as i32),
                output,
            })
        }
    }
}

fn normal_outcome(exit_status: std::process::ExitStatus, mut output: Vec<u8>) -> Outcome {
    if let Some(signal_num) = exit_status.signal() {
        if output.is_empty() {
            output = format!("Terminated by signal {}\n", signal_num).into_bytes();
        }
        Outcome {
            status: Status::Ok,
            exit_code: -signal_num,
            output,
        }
    } else {
        Outcome {
            status: Status::Ok,
            exit_code: exit_status.code().unwrap_or(-1),
            output,
        }
    }
}

/// Two-stage terminate→kill escalation: up to three `SIGTERM` attempts one
/// second apart, then up to three `SIGKILL` attempts, then a final
/// blocking reap so no zombie is left behind regardless of outcome.
async fn terminate_hard(child: &mut Child) {
    let Some(raw_pid) = child.id() else {
        // Already reaped.
        return;
    };
    let pid = Pid::from_raw(raw_pid as i32);

    if send_and_wait(child, pid, Signal::SIGTERM).await {
        return;
    }
    if send_and_wait(child, pid, Signal::SIGKILL).await {
        return;
    }

    // Still here: block until the kernel reaps it (SIGKILL cannot be
    // blocked or ignored, so this cannot hang indefinitely).
    let _ = child.wait().await;
}

/// Send `sig` up to [`TERMINATE_ATTEMPTS`] times, waiting
/// [`TERMINATE_SPACING`] between attempts and checking for exit each time.
/// Returns `true` once the child has exited.
async fn send_and_wait(child: &mut Child, pid: Pid, sig: Signal) -> bool {
    for _ in 0..TERMINATE_ATTEMPTS {
        if signal::kill(pid, sig).is_err() {
            // ESRCH: already gone.
            let _ = child.try_wait();
            return true;
        }
        sleep(TERMINATE_SPACING).await;
        if matches!(child.try_wait(), Ok(Some(_))) {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn runs_simple_command_to_completion() {
        let template = CommandTemplate::parse("/bin/echo hello").unwrap();
        let outcome = execute(&template, &[], &HashMap::new(), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(outcome.status, Status::Ok);
        assert_eq!(outcome.exit_code, 0);
        assert_eq!(outcome.output, b"hello\n");
    }

    #[tokio::test]
    async fn nonzero_exit_code_is_reported() {
        let template = CommandTemplate::parse("/bin/sh -c 'exit 3'").unwrap();
        let outcome = execute(&template, &[], &HashMap::new(), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(outcome.exit_code, 3);
    }

    #[tokio::test]
    async fn timeout_escalates_and_reaps() {
        let template = CommandTemplate::parse("/bin/sleep 10").unwrap();
        let started = std::time::Instant::now();
        let outcome = execute(&template, &[], &HashMap::new(), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(outcome.status, Status::Timeout);
        assert!(started.elapsed() < Duration::from_secs(8));
    }

    #[tokio::test]
    async fn spawn_failure_surfaces_as_error() {
        let template = CommandTemplate::parse("/no/such/binary").unwrap();
        let result = execute(&template, &[], &HashMap::new(), Duration::from_secs(5)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn command_prefix_is_prepended() {
        let template = CommandTemplate::parse("hello").unwrap();
        let prefix = vec!["/bin/echo".to_string()];
        let outcome = execute(&template, &prefix, &HashMap::new(), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(outcome.output, b"hello\n");
    }
}
