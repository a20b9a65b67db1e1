use std::fs::File;
use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::{Child, Command};
use tracing::{debug, error, warn};

use super::error::SandboxError;
use super::{Escalation, ExecutionResult, ResourceLimits, RunOptions, Sandbox};

/// Runs the child directly, confined by `setrlimit` and a wall-clock
/// timeout with kill escalation.
#[derive(Debug, Default, Clone, Copy)]
pub struct RlimitSandbox;

#[cfg(all(target_os = "linux", target_env = "gnu"))]
type Resource = libc::__rlimit_resource_t;
#[cfg(all(unix, not(all(target_os = "linux", target_env = "gnu"))))]
type Resource = libc::c_int;

/// Lower both soft and hard limit to `value`, clamped to the current hard limit.
#[cfg(unix)]
fn apply_rlimit_value(resource: Resource, value: u64) -> io::Result<()> {
    let mut current = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    // SAFETY: `current` is a valid out-pointer.
    if unsafe { libc::getrlimit(resource, &mut current) } != 0 {
        return Err(io::Error::last_os_error());
    }

    let value = (value as libc::rlim_t).min(current.rlim_max);
    let limit = libc::rlimit {
        rlim_cur: value,
        rlim_max: value,
    };
    // SAFETY: plain syscall on a valid struct.
    if unsafe { libc::setrlimit(resource, &limit) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Runs in the forked child; only async-signal-safe calls.
#[cfg(unix)]
fn apply_limits(limits: &ResourceLimits) -> io::Result<()> {
    apply_rlimit_value(libc::RLIMIT_CPU, limits.cpu_time)?;
    apply_rlimit_value(libc::RLIMIT_STACK, limits.stack)?;
    apply_rlimit_value(libc::RLIMIT_NOFILE, limits.open_files)?;

    #[cfg(target_os = "linux")]
    {
        if let Some(bytes) = limits.address_space {
            apply_rlimit_value(libc::RLIMIT_AS, bytes)?;
        }
        if let Some(bytes) = limits.file_size {
            apply_rlimit_value(libc::RLIMIT_FSIZE, bytes)?;
        }
    }
    Ok(())
}

fn open_stdio(path: Option<&std::path::Path>, write: bool) -> io::Result<Stdio> {
    match (path, write) {
        (None, _) => Ok(Stdio::null()),
        (Some(path), false) => File::open(path).map(Stdio::from),
        (Some(path), true) => File::create(path).map(Stdio::from),
    }
}

#[cfg(unix)]
fn terminate(pid: u32) {
    // SAFETY: signalling our own child by pid.
    let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
    if rc != 0 {
        warn!(pid, error = %io::Error::last_os_error(), "SIGTERM failed");
    }
}

/// Poll a terminated child with doubling backoff until it exits or the
/// backoff passes `ceiling`.
async fn reap(
    child: &mut Child,
    pid: u32,
    policy: &Escalation,
    ceiling: Duration,
) -> Result<ExitStatus, SandboxError> {
    let started = Instant::now();
    let mut backoff = policy.initial_backoff;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) => {}
            Err(e) => {
                return Err(SandboxError::Execution(format!(
                    "failed to poll process {pid}: {e}"
                )));
            }
        }
        if backoff > ceiling {
            error!(pid, waited = ?started.elapsed(), "Process survived termination");
            return Err(SandboxError::Undead {
                pid,
                waited: started.elapsed(),
            });
        }
        tokio::time::sleep(backoff).await;
        backoff *= 2;
    }
}

fn describe(status: ExitStatus) -> (Option<i32>, Option<i32>) {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        (status.code(), status.signal())
    }
    #[cfg(not(unix))]
    {
        (status.code(), None)
    }
}

#[async_trait]
impl Sandbox for RlimitSandbox {
    async fn execute(
        &self,
        argv: &[String],
        run_options: &RunOptions,
    ) -> Result<ExecutionResult, SandboxError> {
        let (program, args) = argv.split_first().ok_or_else(|| {
            SandboxError::Initialization("execute requires at least one program argument".into())
        })?;

        let stdio_err = |what: &str, e: io::Error| {
            SandboxError::Initialization(format!("failed to open {what}: {e}"))
        };
        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(open_stdio(run_options.stdin.as_deref(), false).map_err(|e| stdio_err("stdin", e))?)
            .stdout(open_stdio(run_options.stdout.as_deref(), true).map_err(|e| stdio_err("stdout", e))?)
            .stderr(open_stdio(run_options.stderr.as_deref(), true).map_err(|e| stdio_err("stderr", e))?)
            .kill_on_drop(true);
        if let Some(dir) = &run_options.current_dir {
            command.current_dir(dir);
        }

        let limits = run_options.resource_limits;
        #[cfg(unix)]
        // SAFETY: the hook only calls getrlimit/setrlimit.
        unsafe {
            command.pre_exec(move || apply_limits(&limits));
        }

        let started = Instant::now();
        let mut child = command.spawn().map_err(|e| {
            SandboxError::Execution(format!("failed to spawn {program}: {e}"))
        })?;
        let pid = child.id().unwrap_or_default();
        debug!(pid, program = %program, "Spawned");

        let policy = run_options.escalation;
        let wall = policy.wall_timeout(&limits);
        let (status, timed_out) = match tokio::time::timeout(wall, child.wait()).await {
            Ok(status) => (
                status.map_err(|e| SandboxError::Execution(format!("failed to wait: {e}")))?,
                false,
            ),
            Err(_) => {
                warn!(pid, wall = ?wall, "Wall timeout, terminating");
                #[cfg(unix)]
                terminate(pid);
                #[cfg(not(unix))]
                let _ = child.start_kill();
                (reap(&mut child, pid, &policy, policy.ceiling(&limits)).await?, true)
            }
        };

        let (exit_code, signal) = describe(status);
        let message = match (timed_out, signal) {
            (true, _) => format!("Timed out after {}s of wall time, terminated", wall.as_secs()),
            (false, Some(sig)) => format!("Killed by signal {sig}"),
            (false, None) => String::new(),
        };

        Ok(ExecutionResult {
            exit_code,
            signal,
            timed_out,
            wall_time: started.elapsed(),
            message,
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn limits(cpu_time: u64) -> ResourceLimits {
        ResourceLimits {
            cpu_time,
            stack: 8 * 1024 * 1024,
            open_files: 30,
            address_space: None,
            file_size: None,
        }
    }

    fn argv(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_captures_exit_code_and_output() {
        let dir = tempfile::tempdir().unwrap();
        let mut options = RunOptions::new(limits(2), Escalation::default());
        options.stdout = Some(dir.path().join("out"));

        let result = RlimitSandbox
            .execute(&argv(&["sh", "-c", "echo hello; exit 3"]), &options)
            .await
            .unwrap();
        assert_eq!(result.exit_code, Some(3));
        assert!(!result.timed_out);
        assert_eq!(std::fs::read(dir.path().join("out")).unwrap(), b"hello\n");
    }

    #[tokio::test]
    async fn test_stdin_is_bound_to_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("in"), b"abc").unwrap();
        let mut options = RunOptions::new(limits(2), Escalation::default());
        options.stdin = Some(dir.path().join("in"));
        options.stdout = Some(dir.path().join("out"));

        let result = RlimitSandbox.execute(&argv(&["cat"]), &options).await.unwrap();
        assert!(result.success());
        assert_eq!(std::fs::read(dir.path().join("out")).unwrap(), b"abc");
    }

    #[tokio::test]
    async fn test_open_files_limit_applies() {
        let dir = tempfile::tempdir().unwrap();
        let mut options = RunOptions::new(limits(2), Escalation::default());
        options.stdout = Some(dir.path().join("out"));

        RlimitSandbox
            .execute(&argv(&["sh", "-c", "ulimit -n"]), &options)
            .await
            .unwrap();
        let out = std::fs::read_to_string(dir.path().join("out")).unwrap();
        assert_eq!(out.trim(), "30");
    }

    #[tokio::test]
    async fn test_blocked_process_is_terminated() {
        let policy = Escalation {
            initial_backoff: Duration::from_millis(50),
            ..Escalation::default()
        };
        let options = RunOptions::new(limits(1), policy);

        let started = Instant::now();
        let result = RlimitSandbox
            .execute(&argv(&["sleep", "100"]), &options)
            .await
            .unwrap();
        assert!(result.timed_out);
        assert!(!result.success());
        assert_eq!(result.signal, Some(libc::SIGTERM));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_spinning_process_hits_cpu_limit() {
        let options = RunOptions::new(limits(1), Escalation::default());

        let started = Instant::now();
        let result = RlimitSandbox
            .execute(&argv(&["sh", "-c", "while :; do :; done"]), &options)
            .await
            .unwrap();
        assert!(!result.success());
        assert!(result.signal.is_some());
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_process_ignoring_term_is_undead() {
        let policy = Escalation {
            wall_factor: 1,
            ceiling_factor: 1,
            initial_backoff: Duration::from_millis(50),
        };
        let options = RunOptions::new(limits(1), policy);

        let err = RlimitSandbox
            .execute(
                &argv(&["sh", "-c", "trap '' TERM; while :; do sleep 1; done"]),
                &options,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SandboxError::Undead { .. }));
    }

    #[tokio::test]
    async fn test_empty_argv_is_rejected() {
        let options = RunOptions::new(limits(1), Escalation::default());
        let err = RlimitSandbox.execute(&[], &options).await.unwrap_err();
        assert!(matches!(err, SandboxError::Initialization(_)));
    }
}
