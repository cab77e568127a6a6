use std::fmt::{self, Display, Formatter};

use gsmake_paths::{Domain, CURRENT_VERSION};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

/// The `gsmake` rootfs scheme: a `Ref` with this scheme names a slot inside a
/// userspace rather than a source served by a user-FS driver.
pub const GSMAKE_SCHEME: &str = "gsmake";

/// The `file` user-FS driver's scheme.
pub const FILE_SCHEME: &str = "file";

/// A normalized package reference: `(scheme, host, path,
/// version, domain, remote?)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ref {
    pub scheme: String,
    pub host: String,
    pub path: String,
    pub version: Option<String>,
    pub domain: Option<Domain>,
    pub remote: Option<String>,
}

impl Ref {
    pub fn new(scheme: impl Into<String>, host: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            host: host.into(),
            path: normalize_path(&path.into()),
            version: None,
            domain: None,
            remote: None,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_domain(mut self, domain: Domain) -> Self {
        self.domain = Some(domain);
        self
    }

    pub fn with_remote(mut self, remote: impl Into<String>) -> Self {
        self.remote = Some(remote.into());
        self
    }

    /// The package identity: `(name = host+path, domain)` is unique within a
    /// userspace.
    pub fn name(&self) -> String {
        format!("{}{}", self.host, self.path)
    }

    /// The effective version, defaulting to `"current"`.
    pub fn version_or_default(&self) -> &str {
        self.version.as_deref().unwrap_or(CURRENT_VERSION)
    }

    pub fn is_gsmake(&self) -> bool {
        self.scheme == GSMAKE_SCHEME
    }

    pub fn is_file(&self) -> bool {
        self.scheme == FILE_SCHEME
    }

    /// Parses a canonical VFS URL:
    /// `scheme://host/path?version=V&domain=D[&remote=R]`.
    ///
    /// Validation of scheme-specific required parameters (e.g. `domain` for
    /// `gsmake://`, `version` for non-`file` sources) is the caller's
    /// responsibility -- [`crate::facade::Vfs::open`]/`mount` apply those
    /// rules, since they differ by context.
    pub fn parse(text: &str) -> Result<Self> {
        let url = Url::parse(text).map_err(|e| Error::Url(format!("'{text}': {e}")))?;
        let scheme = url.scheme().to_string();
        let host = url
            .host_str()
            .ok_or_else(|| Error::Url(format!("'{text}' has no host")))?
            .to_string();
        let path = normalize_path(url.path());

        let mut version = None;
        let mut domain = None;
        let mut remote = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "version" => version = Some(value.to_string()),
                "domain" => {
                    domain = Some(
                        Domain::new(value.to_string())
                            .map_err(|e| Error::Url(format!("'{text}': {e}")))?,
                    )
                }
                "remote" => remote = Some(value.to_string()),
                _ => {}
            }
        }

        Ok(Self {
            scheme,
            host,
            path,
            version,
            domain,
            remote,
        })
    }

    pub fn canonical(&self) -> String {
        self.to_string()
    }
}

fn normalize_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

impl Display for Ref {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}{}", self.scheme, self.host, self.path)?;
        let mut sep = '?';
        if let Some(version) = &self.version {
            write!(f, "{sep}version={version}")?;
            sep = '&';
        }
        if let Some(domain) = &self.domain {
            write!(f, "{sep}domain={domain}")?;
            sep = '&';
        }
        if let Some(remote) = &self.remote {
            write!(f, "{sep}remote={remote}")?;
        }
        Ok(())
    }
}
