use thiserror::Error;

/// Why the engine stopped for good. Once set it is never cleared.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AbortReason {
    #[error("out of memory: {used} bytes in use, limit is {limit}")]
    OutOfMemory { used: usize, limit: usize },
    #[error("stack overflow: call depth exceeded {limit}")]
    StackOverflow { limit: usize },
    #[error("fatal script error: {0}")]
    Script(String),
    #[error("aborted by host: {0}")]
    Host(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("memory limit of {limit} bytes exceeded")]
pub struct OutOfMemory {
    pub limit: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollectError {
    #[error("garbage collection requested while {0} frame(s) are active")]
    FrameActive(usize),
    #[error("engine is aborted")]
    Aborted,
}

/// Structural faults in an action stream. These are logged and recovered
/// from inside the interpreter; they never reach the host.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScriptError {
    #[error("action at {pc} overruns the script end {end}")]
    Truncated { pc: usize, end: usize },
    #[error("jump target {target} lies outside {start}..={end}")]
    JumpOutOfRange {
        target: usize,
        start: usize,
        end: usize,
    },
    #[error("malformed {action} arguments: {reason}")]
    Malformed {
        action: &'static str,
        reason: &'static str,
    },
    #[error("register {0} out of range")]
    Register(usize),
}

impl ScriptError {
    pub fn malformed(action: &'static str, reason: &'static str) -> Self {
        ScriptError::Malformed { action, reason }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid setting: {0}")]
pub struct SettingsError(pub &'static str);
