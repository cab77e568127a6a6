use std::collections::BTreeMap;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// `{scm, url_template, name_pattern}`.
/// `name_pattern` is a regex with named capture groups; `url_template` is
/// expanded via `${name}` substitution from the captures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    pub scm: String,
    pub url_template: String,
    pub name_pattern: String,
}

impl Site {
    /// Applies [`Self::name_pattern`] to `host_and_path` and substitutes the
    /// named captures into [`Self::url_template`], producing the synthesized
    /// `remote` value.
    pub fn expand(&self, host_and_path: &str) -> Result<String> {
        let re = Regex::new(&self.name_pattern)
            .map_err(|e| Error::Url(format!("invalid site pattern '{}': {e}", self.name_pattern)))?;
        let captures = re
            .captures(host_and_path)
            .ok_or_else(|| Error::Url(format!("'{host_and_path}' does not match any known site")))?;

        let mut result = self.url_template.clone();
        for name in re.capture_names().flatten() {
            if let Some(value) = captures.name(name) {
                result = result.replace(&format!("${{{name}}}"), value.as_str());
            }
        }
        Ok(result)
    }
}

/// The default site table seeded on first initialization, keyed by host.
/// Overridable through the metadata store's `sites` index.
pub fn default_sites() -> BTreeMap<String, Site> {
    let mut sites = BTreeMap::new();
    sites.insert(
        "github.com".to_string(),
        Site {
            scm: "git".to_string(),
            url_template: "https://${root}.git".to_string(),
            name_pattern: r"^(?P<root>github\.com/[^/]+/[^/]+)".to_string(),
        },
    );
    sites.insert(
        "gitlab.com".to_string(),
        Site {
            scm: "git".to_string(),
            url_template: "https://${root}.git".to_string(),
            name_pattern: r"^(?P<root>gitlab\.com/[^/]+/[^/]+)".to_string(),
        },
    );
    sites
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn expands_github_template() {
        let sites = default_sites();
        let site = sites.get("github.com").unwrap();
        let remote = site.expand("github.com/user/repo").unwrap();
        assert_eq!(remote, "https://github.com/user/repo.git");
    }

    #[test]
    fn expands_with_subpath_ignored_by_root_capture() {
        let sites = default_sites();
        let site = sites.get("github.com").unwrap();
        let remote = site.expand("github.com/user/repo").unwrap();
        assert_eq!(remote, "https://github.com/user/repo.git");
    }

    #[test]
    fn miss_is_an_error() {
        let sites = default_sites();
        let site = sites.get("github.com").unwrap();
        assert!(site.expand("example.com/x").is_err());
    }
}
