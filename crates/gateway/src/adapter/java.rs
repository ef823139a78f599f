use sandbox::{ResourceLimits, SandboxInvocation};
use serde_json::{Map, Value, json};

use super::LanguageAdapter;
use crate::types::ExecutionRequest;

const RUN_BACKEND: &str = "/tmp/run-java-backend.sh";

/// The Java backend takes a single JSON document as its only argument.
pub struct JavaAdapter {
    image: String,
}

impl JavaAdapter {
    pub fn new(image: String) -> Self {
        Self { image }
    }
}

/// Build the backend request document.
///
/// Note the inversion: for strings to be drawn as heap objects rather than
/// primitive values, the backend wants `showStringsAsValues: false`. When the
/// user did not ask for heap primitives the key is left out entirely.
fn backend_request(request: &ExecutionRequest) -> Value {
    let mut options = Map::new();
    if request.options.heap_primitives {
        options.insert("showStringsAsValues".into(), Value::Bool(false));
    }
    json!({
        "usercode": request.code,
        "options": options,
        "args": [],
        "stdin": "",
    })
}

impl LanguageAdapter for JavaAdapter {
    fn image(&self) -> &str {
        &self.image
    }

    fn build(&self, request: &ExecutionRequest, limits: ResourceLimits) -> SandboxInvocation {
        SandboxInvocation::new(&self.image, RUN_BACKEND, limits).arg(backend_request(request).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::tests::request;
    use crate::types::{ExecOptions, Language};

    fn build(heap_primitives: bool) -> SandboxInvocation {
        let mut req = request(Language::Java, "public class X {}");
        req.options = ExecOptions { heap_primitives };
        JavaAdapter::new("pgbovine/cokapi-java:v1".into()).build(&req, ResourceLimits::default())
    }

    fn payload(inv: &SandboxInvocation) -> Value {
        assert_eq!(inv.args.len(), 1);
        serde_json::from_str(&inv.args[0]).unwrap()
    }

    #[test]
    fn heap_primitives_true_sets_show_strings_as_values_false() {
        let inv = build(true);
        assert_eq!(inv.program, RUN_BACKEND);
        let doc = payload(&inv);
        assert_eq!(doc["options"]["showStringsAsValues"], Value::Bool(false));
    }

    #[test]
    fn heap_primitives_false_omits_option() {
        let doc = payload(&build(false));
        assert_eq!(doc["options"], json!({}));
    }

    #[test]
    fn payload_has_code_empty_args_and_stdin() {
        let doc = payload(&build(false));
        assert_eq!(doc["usercode"], "public class X {}");
        assert_eq!(doc["args"], json!([]));
        assert_eq!(doc["stdin"], "");
    }

    #[test]
    fn payload_is_compact_and_ordered() {
        let inv = build(true);
        assert_eq!(
            inv.args[0],
            r#"{"usercode":"public class X {}","options":{"showStringsAsValues":false},"args":[],"stdin":""}"#
        );
    }

    #[test]
    fn code_with_quotes_is_escaped_in_payload() {
        let req = request(Language::Java, "String s = \"a\\\"b\";");
        let inv = JavaAdapter::new("img".into()).build(&req, ResourceLimits::default());
        let doc = payload(&inv);
        assert_eq!(doc["usercode"], "String s = \"a\\\"b\";");
    }
}
