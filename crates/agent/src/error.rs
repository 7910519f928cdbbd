use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("payload exceeds the 32 KiB command size limit")]
    PayloadTooLarge,
    #[error("payload is not valid JSON: {0}")]
    InvalidJson(String),
    #[error("missing or invalid containerId")]
    InvalidContainerId,
    #[error("unknown command type: {0}")]
    UnknownCommand(String),
    #[error("docker error: {0}")]
    Docker(#[from] bollard::errors::Error),
}

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("failed to write script to temp file: {0}")]
    TempFile(#[from] std::io::Error),
    #[error("unsupported shell: {0}")]
    UnsupportedShell(String),
    #[error("script exceeded its maximum duration and was killed")]
    TimedOut,
    #[error("script exited with non-zero status {0}")]
    NonZeroExit(i32),
}

#[derive(Debug, Error)]
pub enum ShellExecError {
    #[error("failed to spawn command: {0}")]
    Spawn(std::io::Error),
    #[error("command exceeded its maximum duration and was killed")]
    TimedOut,
}

#[derive(Debug, Error)]
pub enum TerminalError {
    #[error("a terminal session is already open for this agent")]
    AlreadyOpen,
    #[error("no terminal session is open")]
    NotOpen,
    #[error("failed to spawn shell: {0}")]
    Spawn(std::io::Error),
    #[error("failed to write to shell stdin: {0}")]
    Write(std::io::Error),
}
