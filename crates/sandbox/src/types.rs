use crate::config::ResourceLimits;

/// A fully resolved request to run one program inside one container.
///
/// Built once per request by a language adapter and never mutated. The
/// program and arguments are handed to the runtime as separate argv entries;
/// no shell ever sees them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxInvocation {
    /// Container image the backend lives in.
    pub image: String,
    /// Entry point inside the image.
    pub program: String,
    pub args: Vec<String>,
    pub limits: ResourceLimits,
}

impl SandboxInvocation {
    pub fn new(image: impl Into<String>, program: impl Into<String>, limits: ResourceLimits) -> Self {
        Self {
            image: image.into(),
            program: program.into(),
            args: Vec::new(),
            limits,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

/// How a single invocation ended. Exactly one per invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// Exit status 0; `output` is the captured stdout.
    Success { output: Vec<u8> },
    /// The wall-clock budget ran out and the process was force-killed.
    TimedOut,
    /// The process died from a signal the invoker did not send.
    Terminated { signal: Option<i32> },
    NonZeroExit { code: i32, stderr: Vec<u8> },
    /// Combined output passed the cap; capture stopped and the process was killed.
    OutputLimitExceeded { limit: usize },
    SpawnError { cause: String },
}

impl ExecutionOutcome {
    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Success { .. } => "success",
            Self::TimedOut => "timed_out",
            Self::Terminated { .. } => "terminated",
            Self::NonZeroExit { .. } => "non_zero_exit",
            Self::OutputLimitExceeded { .. } => "output_limit_exceeded",
            Self::SpawnError { .. } => "spawn_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_keeps_argument_order() {
        let inv = SandboxInvocation::new("img:v1", "/bin/prog", ResourceLimits::default())
            .arg("first")
            .args(["second", "third"]);
        assert_eq!(inv.image, "img:v1");
        assert_eq!(inv.program, "/bin/prog");
        assert_eq!(inv.args, vec!["first", "second", "third"]);
    }

    #[test]
    fn argument_values_are_kept_verbatim() {
        let code = "x = 1; $(rm -rf /) `echo hi` \"quoted\"";
        let inv = SandboxInvocation::new("img", "prog", ResourceLimits::default()).arg(code);
        assert_eq!(inv.args, vec![code]);
    }

    #[test]
    fn outcome_kind_labels() {
        assert_eq!(
            ExecutionOutcome::Success { output: vec![] }.kind(),
            "success"
        );
        assert_eq!(ExecutionOutcome::TimedOut.kind(), "timed_out");
        assert_eq!(
            ExecutionOutcome::NonZeroExit {
                code: 42,
                stderr: vec![]
            }
            .kind(),
            "non_zero_exit"
        );
    }
}
