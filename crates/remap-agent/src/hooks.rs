//! Service control around the configuration swap.
//!
//! The agent does not supervise SCION services itself. Operators plug in
//! shell commands (e.g. `systemctl stop scionlab.target`) that run right
//! before and after the active directory is replaced.

use std::process::Command;

use crate::error::RemapError;
use crate::protocol::HookResult;

/// Stops and restarts the services that read the active configuration.
pub trait ServiceControl {
    fn stop(&mut self) -> Result<(), RemapError>;
    fn start(&mut self) -> Result<(), RemapError>;
}

/// No services to manage.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoServiceControl;

impl ServiceControl for NoServiceControl {
    fn stop(&mut self) -> Result<(), RemapError> {
        Ok(())
    }

    fn start(&mut self) -> Result<(), RemapError> {
        Ok(())
    }
}

/// Runs optional stop/start commands through the platform shell and keeps
/// the result of every command it ran.
#[derive(Debug, Default, Clone)]
pub struct ShellServiceControl {
    stop_cmd: Option<String>,
    start_cmd: Option<String>,
    results: Vec<HookResult>,
}

impl ShellServiceControl {
    pub fn new(stop_cmd: Option<String>, start_cmd: Option<String>) -> Self {
        Self {
            stop_cmd,
            start_cmd,
            results: Vec::new(),
        }
    }

    /// Commands run so far, in order.
    pub fn results(&self) -> &[HookResult] {
        &self.results
    }

    fn run(&mut self, phase: &'static str, cmd: Option<String>) -> Result<(), RemapError> {
        let Some(cmd) = cmd else {
            return Ok(());
        };
        tracing::info!(phase, command = %cmd, "Running service hook");

        let (status, output) = match shell(&cmd).output() {
            Ok(out) => {
                let mut text = String::from_utf8_lossy(&out.stdout).into_owned();
                text.push_str(&String::from_utf8_lossy(&out.stderr));
                (Some(out.status), text.trim().to_string())
            }
            Err(e) => (None, format!("cannot spawn shell: {e}")),
        };
        let success = status.is_some_and(|s| s.success());
        self.results.push(HookResult {
            success,
            command: cmd.clone(),
            output: (!output.is_empty()).then(|| output.clone()),
        });

        if success {
            if !output.is_empty() {
                tracing::debug!(phase, output = %output, "Service hook output");
            }
            return Ok(());
        }

        let exit = match status.and_then(|s| s.code()) {
            Some(code) => format!("exit status {code}"),
            None => "no exit status".to_string(),
        };
        tracing::error!(phase, command = %cmd, %exit, output = %output, "Service hook failed");
        let detail = if output.is_empty() {
            String::new()
        } else {
            format!(": {output}")
        };
        Err(RemapError::Hook(format!("{phase} command `{cmd}` failed ({exit}){detail}")))
    }
}

impl ServiceControl for ShellServiceControl {
    fn stop(&mut self) -> Result<(), RemapError> {
        self.run("stop", self.stop_cmd.clone())
    }

    fn start(&mut self) -> Result<(), RemapError> {
        self.run("start", self.start_cmd.clone())
    }
}

#[cfg(windows)]
fn shell(cmd: &str) -> Command {
    let mut command = Command::new("cmd");
    command.args(["/C", cmd]);
    command
}

#[cfg(not(windows))]
fn shell(cmd: &str) -> Command {
    let mut command = Command::new("sh");
    command.args(["-c", cmd]);
    command
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hook_output_is_recorded() {
        let mut ctl = ShellServiceControl::new(Some("echo stopped".into()), None);
        ctl.stop().unwrap();
        let results = ctl.results();
        assert_eq!(results.len(), 1);
        assert!(results[0].success);
        assert_eq!(results[0].command, "echo stopped");
        assert!(results[0].output.as_deref().unwrap().contains("stopped"));
    }

    #[test]
    fn unset_commands_are_noops() {
        let mut ctl = ShellServiceControl::default();
        assert!(ctl.stop().is_ok());
        assert!(ctl.start().is_ok());
        assert!(ctl.results().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn failing_stop_reports_exit_status() {
        let mut ctl = ShellServiceControl::new(Some("echo busy >&2; exit 3".into()), None);
        let err = ctl.stop().unwrap_err();
        match &err {
            RemapError::Hook(msg) => {
                assert!(msg.contains("exit status 3"), "{msg}");
                assert!(msg.contains("busy"), "{msg}");
            }
            other => panic!("expected Hook, got: {other}"),
        }
        assert_eq!(err.exit_code(), 2);
        assert!(!ctl.results()[0].success);
    }

    #[test]
    fn unknown_command_fails() {
        let mut ctl =
            ShellServiceControl::new(None, Some("remap-hook-command-that-does-not-exist-4711".into()));
        assert!(matches!(ctl.start(), Err(RemapError::Hook(_))));
    }
}
