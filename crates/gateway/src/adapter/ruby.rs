use sandbox::{ResourceLimits, SandboxInvocation};

use super::LanguageAdapter;
use crate::types::ExecutionRequest;

const RUBY: &str = "/tmp/ruby/ruby";
const LOGGER: &str = "/tmp/ruby/pg_logger.rb";

pub struct RubyAdapter {
    image: String,
}

impl RubyAdapter {
    pub fn new(image: String) -> Self {
        Self { image }
    }
}

impl LanguageAdapter for RubyAdapter {
    fn image(&self) -> &str {
        &self.image
    }

    fn build(&self, request: &ExecutionRequest, limits: ResourceLimits) -> SandboxInvocation {
        SandboxInvocation::new(&self.image, RUBY, limits).args([LOGGER, "-c", request.code.as_str()])
    }
}
