use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The manifest file name every package is expected to carry at its mount
/// root.
pub const MANIFEST_FILENAME: &str = ".gsmake.json";

/// A package manifest. `domain` is
/// serialized as `"scope"` on [`Import`]/[`TaskDecl`] records but as
/// `"domain"` at the package's own top level -- a quirk of the original wire
/// format preserved here since external manifests depend on it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Package {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub import: Vec<Import>,
    #[serde(default)]
    pub task: BTreeMap<String, TaskDecl>,
    #[serde(default)]
    pub properties: Value,
    #[serde(default)]
    pub redirect: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Import {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub scm: Option<String>,
    #[serde(rename = "scope", default)]
    pub domain: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskDecl {
    #[serde(default)]
    pub prev: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "scope", default)]
    pub domain: Option<String>,
    /// The package that contributed this declaration. Not part of the wire
    /// format; filled in by the loader once the owning package is known.
    #[serde(skip)]
    pub package: String,
}

impl Package {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// A minimal manifest synthesized for manifest-less invocations.
    pub fn anonymous(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Reads a dotted path out of `properties`: `a.b.c` looks up
    /// `properties["a"]["b"]["c"]`. Returns `None` on any missing segment or
    /// a type mismatch.
    pub fn property<T: serde::de::DeserializeOwned>(&self, path: &str) -> Option<T> {
        let mut cur = &self.properties;
        for segment in path.split('.') {
            cur = cur.get(segment)?;
        }
        serde_json::from_value(cur.clone()).ok()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_minimal_manifest() {
        let text = r#"{ "name": "github.com/u/p",
            "domain": "task|golang",
            "import": [{ "name": "github.com/a/b", "version": "v1.0", "scope": "task" }],
            "task": { "build": { "prev": "resources", "description": "compile" } } }"#;
        let pkg = Package::parse(text).unwrap();
        assert_eq!(pkg.name, "github.com/u/p");
        assert_eq!(pkg.domain, "task|golang");
        assert_eq!(pkg.import.len(), 1);
        assert_eq!(pkg.import[0].domain.as_deref(), Some("task"));
        assert_eq!(pkg.task["build"].prev, "resources");
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let text = r#"{ "name": "p", "bogus": 1 }"#;
        let pkg = Package::parse(text).unwrap();
        assert_eq!(pkg.name, "p");
    }

    #[test]
    fn property_reads_dotted_path() {
        let mut pkg = Package::anonymous("p");
        pkg.properties = serde_json::json!({"a": {"b": {"c": 42}}});
        assert_eq!(pkg.property::<i64>("a.b.c"), Some(42));
        assert_eq!(pkg.property::<i64>("a.b.missing"), None);
        assert_eq!(pkg.property::<i64>("missing"), None);
    }
}
