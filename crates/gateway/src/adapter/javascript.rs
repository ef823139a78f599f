use sandbox::{ResourceLimits, SandboxInvocation};

use super::LanguageAdapter;
use crate::types::{ExecutionRequest, Language};

// Paths inside the image (must match the backend Dockerfile).
const NODE: &str = "/tmp/javascript/node-v6.0.0-linux-x64/bin/node";
const LOGGER: &str = "/tmp/javascript/jslogger.js";

/// JavaScript and TypeScript share one backend; TypeScript adds a flag.
pub struct JavaScriptAdapter {
    image: String,
}

impl JavaScriptAdapter {
    pub fn new(image: String) -> Self {
        Self { image }
    }
}

impl LanguageAdapter for JavaScriptAdapter {
    fn image(&self) -> &str {
        &self.image
    }

    fn build(&self, request: &ExecutionRequest, limits: ResourceLimits) -> SandboxInvocation {
        let mut invocation = SandboxInvocation::new(&self.image, NODE, limits)
            .arg("--expose-debug-as=Debug")
            .arg(LOGGER);
        if request.language == Language::TypeScript {
            invocation = invocation.arg("--typescript=true");
        }
        invocation
            .arg("--jsondump=true")
            .arg(format!("--code={}", request.code))
    }
}
