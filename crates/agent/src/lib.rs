//! Agent-side command surface: Docker container control, OS package
//! upgrades, sandboxed script execution, one-shot shell commands, and an
//! interactive terminal session — all reachable through `AgentDispatcher`.

mod config;
mod dispatch;
mod docker;
mod error;
mod proc;
mod script;
mod shell_exec;
mod terminal;
mod update_exec;

pub use config::AgentConfig;
pub use dispatch::{extract_container_id, AgentDispatcher, DispatchStatus, StatusPhase};
pub use docker::{ContainerSummary, DockerGateway};
pub use error::{DispatchError, ScriptError, ShellExecError, TerminalError};
pub use script::{run as run_script, Shell, ScriptFrame, ScriptRun};
pub use shell_exec::{run as run_shell_command, ShellExecResult};
pub use terminal::{TerminalManager, TerminalSessionState};
pub use update_exec::run_update;
