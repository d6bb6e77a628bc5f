//! Infrastructure implementation of the `AgentLauncher` port.

use std::path::Path;
use std::process::Stdio;

use tokio::process::Child;

use crate::application::ports::AgentLauncher;
use crate::domain::SupervisorError;

/// Production launcher: spawns the agent with piped output through tokio.
///
/// `kill_on_drop` guarantees the agent never outlives the supervisor's
/// handle, including when the monitor task is aborted at runtime shutdown.
pub struct TokioAgentLauncher;

impl AgentLauncher for TokioAgentLauncher {
    fn launch(&self, program: &Path, args: &[String]) -> Result<Child, SupervisorError> {
        tokio::process::Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SupervisorError::Launch {
                program: program.to_path_buf(),
                source,
            })
    }
}
