use sandbox::{ResourceLimits, SandboxInvocation};

use super::LanguageAdapter;
use crate::types::{ExecutionRequest, Language};

const PYTHON: &str = "python";
const DRIVER: &str = "/tmp/opt-cpp-backend/run_cpp_backend.py";

/// C and C++ run on the same backend; the last argument picks the dialect.
pub struct CCppAdapter {
    image: String,
}

impl CCppAdapter {
    pub fn new(image: String) -> Self {
        Self { image }
    }
}

fn dialect(language: Language) -> &'static str {
    if language == Language::Cpp { "cpp" } else { "c" }
}

impl LanguageAdapter for CCppAdapter {
    fn image(&self) -> &str {
        &self.image
    }

    fn build(&self, request: &ExecutionRequest, limits: ResourceLimits) -> SandboxInvocation {
        SandboxInvocation::new(&self.image, PYTHON, limits)
            .arg(DRIVER)
            .arg(request.code.as_str())
            .arg(dialect(request.language))
    }
}
