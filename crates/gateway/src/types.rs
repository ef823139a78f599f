use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// Languages with a backend image. TypeScript and C++ are dialect variants
/// served by the JavaScript and C backends respectively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    JavaScript,
    TypeScript,
    Java,
    Ruby,
    C,
    Cpp,
}

impl Language {
    pub const ALL: [Language; 6] = [
        Language::JavaScript,
        Language::TypeScript,
        Language::Java,
        Language::Ruby,
        Language::C,
        Language::Cpp,
    ];

    /// Suffix used in endpoint paths (`/exec_<stem>`).
    pub fn path_stem(self) -> &'static str {
        match self {
            Language::JavaScript => "js",
            Language::TypeScript => "ts",
            Language::Java => "java",
            Language::Ruby => "ruby",
            Language::C => "c",
            Language::Cpp => "cpp",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path_stem())
    }
}

/// How the response body is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transport {
    /// Raw backend output on success, JSON envelope on failure.
    Plain,
    /// Always a validated JSON envelope, optionally wrapped in a caller-named function.
    Callback,
}

/// Language-specific knobs carried in `options_json`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecOptions {
    /// Render primitive values as heap objects (Java backend only).
    pub heap_primitives: bool,
}

impl ExecOptions {
    /// Parse the `options_json` blob. Unknown keys are ignored and values are
    /// tested for truthiness the way the visualizer encodes them.
    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        let value: Value = serde_json::from_str(raw)?;
        Ok(Self {
            heap_primitives: value.get("heap_primitives").is_some_and(is_truthy),
        })
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// One execution request as received. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRequest {
    pub language: Language,
    pub code: String,
    pub options: ExecOptions,
    pub transport: Transport,
}

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

pub const UNCAUGHT_EXCEPTION: &str = "uncaught_exception";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEvent {
    pub event: String,
    pub exception_msg: String,
}

/// Uniform body consumed by the visualizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEnvelope {
    pub code: String,
    pub trace: Vec<TraceEvent>,
}

impl TraceEnvelope {
    /// Envelope carrying a single synthesized `uncaught_exception` event.
    pub fn uncaught_exception(message: impl Into<String>) -> Self {
        Self {
            code: String::new(),
            trace: vec![TraceEvent {
                event: UNCAUGHT_EXCEPTION.to_string(),
                exception_msg: message.into(),
            }],
        }
    }
}
