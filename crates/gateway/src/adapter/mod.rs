//! Language adapters: pure mappings from an [`ExecutionRequest`] to the
//! [`SandboxInvocation`] its backend image expects. No I/O happens here.

mod c_cpp;
mod java;
mod javascript;
mod ruby;

use sandbox::{ResourceLimits, SandboxInvocation};

use crate::config::ImagesConfig;
use crate::types::{ExecutionRequest, Language};

pub use c_cpp::CCppAdapter;
pub use java::JavaAdapter;
pub use javascript::JavaScriptAdapter;
pub use ruby::RubyAdapter;

pub trait LanguageAdapter: Send + Sync {
    /// Image this adapter's backend lives in. Never shared with another backend.
    fn image(&self) -> &str;

    fn build(&self, request: &ExecutionRequest, limits: ResourceLimits) -> SandboxInvocation;
}

/// One adapter per backend, selected by language.
pub struct AdapterSet {
    javascript: JavaScriptAdapter,
    java: JavaAdapter,
    ruby: RubyAdapter,
    c_cpp: CCppAdapter,
}

impl AdapterSet {
    pub fn new(images: &ImagesConfig) -> Self {
        Self {
            javascript: JavaScriptAdapter::new(images.javascript.clone()),
            java: JavaAdapter::new(images.java.clone()),
            ruby: RubyAdapter::new(images.ruby.clone()),
            c_cpp: CCppAdapter::new(images.c_cpp.clone()),
        }
    }

    pub fn for_language(&self, language: Language) -> &dyn LanguageAdapter {
        match language {
            Language::JavaScript | Language::TypeScript => &self.javascript,
            Language::Java => &self.java,
            Language::Ruby => &self.ruby,
            Language::C | Language::Cpp => &self.c_cpp,
        }
    }
}
