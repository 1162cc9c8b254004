//! Repository identifiers.
//!
//! A [`Repo`] is built from whatever spelling the configuration uses for a
//! remote and normalizes it to a canonical HTTPS URL. Equality, hashing and
//! ordering use the canonical URL, so two spellings of the same repository
//! compare equal. Mirror de-duplication keys on this.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use url::Url;

use crate::error::{Error, Result};

const DEFAULT_HOST: &str = "https://github.com";

/// Short service prefixes and the hosts they stand for.
const SERVICES: &[(&str, &str)] = &[
    ("gh", "https://github.com"),
    ("gl", "https://gitlab.com"),
    ("gls", "https://gitlab.suse.de"),
    ("bb", "https://bitbucket.org"),
    ("gt", "https://gitea.com"),
    ("cb", "https://codeberg.org"),
    ("ghe", "https://github.enterprise.com"),
];

/// A remote git repository.
#[derive(Debug, Clone)]
pub struct Repo {
    /// Canonical clone URL, `https://host/org/repo.git`.
    url: String,
    /// Lowercased `org/repo` path.
    name: String,
}

impl Repo {
    /// Parse a repository from a URL, SSH address, service abbreviation
    /// (`gh://org/repo`), bare `org/repo`, or a local `file://` URL.
    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        let invalid = |message: &str| Error::InvalidRepo {
            value: value.to_string(),
            message: message.to_string(),
        };
        if value.is_empty() {
            return Err(invalid("repository value cannot be empty"));
        }

        // Local repositories keep their path untouched, case included.
        if let Some(path) = value.strip_prefix("file://") {
            let path = path.trim_end_matches('/');
            if path.is_empty() {
                return Err(invalid("file URL has no path"));
            }
            return Ok(Self {
                url: format!("file://{}", path),
                name: path.to_string(),
            });
        }

        if value.starts_with("https://") || value.starts_with("http://") {
            let url = Url::parse(value).map_err(|e| invalid(&e.to_string()))?;
            let host = url.host_str().ok_or_else(|| invalid("URL has no host"))?;
            let authority = match url.port() {
                Some(port) => format!("{}:{}", host, port),
                None => host.to_string(),
            };
            let name = normalize_name(url.path());
            if name.is_empty() {
                return Err(invalid("URL has no repository path"));
            }
            return Ok(Self::from_parts(
                &format!("{}://{}", url.scheme(), authority),
                name,
            ));
        }

        if let Some((service, rest)) = value.split_once("://") {
            let service = service.to_ascii_lowercase();
            let host = SERVICES
                .iter()
                .find(|(abbr, _)| *abbr == service)
                .map(|(_, host)| *host)
                .ok_or_else(|| invalid(&format!("unknown repository abbreviation '{}'", service)))?;
            return Ok(Self::from_parts(host, normalize_name(rest)));
        }

        if let Some((user_host, path)) = value.split_once(':') {
            if let Some((_, host)) = user_host.split_once('@') {
                return Ok(Self::from_parts(
                    &format!("https://{}", host.to_ascii_lowercase()),
                    normalize_name(path),
                ));
            }
        }

        if value.contains('/') {
            return Ok(Self::from_parts(DEFAULT_HOST, normalize_name(value)));
        }

        Err(invalid(
            "expected an HTTPS URL, SSH URL, abbreviated URL like gh://org/repo, or org/repo",
        ))
    }

    fn from_parts(host: &str, name: String) -> Self {
        Self {
            url: format!("{}/{}.git", host, name),
            name,
        }
    }

    /// Canonical clone URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Lowercased `org/repo` name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// File system safe form of the canonical URL, used as the mirror
    /// directory name.
    pub fn slug(&self) -> String {
        self.url
            .chars()
            .map(|c| match c {
                ':' | '/' | '-' | '.' => '_',
                other => other,
            })
            .collect()
    }
}

fn normalize_name(path: &str) -> String {
    let trimmed = path.trim().trim_matches('/').to_lowercase();
    let trimmed = trimmed.strip_suffix(".git").unwrap_or(&trimmed);
    trimmed.trim_end_matches('/').to_string()
}

impl FromStr for Repo {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        Repo::parse(value)
    }
}

impl fmt::Display for Repo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

impl PartialEq for Repo {
    fn eq(&self, other: &Self) -> bool {
        self.url == other.url
    }
}

impl Eq for Repo {}

impl Hash for Repo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.url.hash(state);
    }
}

impl PartialOrd for Repo {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Repo {
    fn cmp(&self, other: &Self) -> Ordering {
        self.url.cmp(&other.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_https_url() {
        let repo = Repo::parse("https://github.com/SUSE/doc-sle.git").unwrap();
        assert_eq!(repo.url(), "https://github.com/suse/doc-sle.git");
        assert_eq!(repo.name(), "suse/doc-sle");
    }

    #[test]
    fn test_parse_https_without_suffix() {
        let repo = Repo::parse("https://gitlab.com/group/docs/").unwrap();
        assert_eq!(repo.url(), "https://gitlab.com/group/docs.git");
    }

    #[test]
    fn test_parse_ssh() {
        let repo = Repo::parse("git@github.com:SUSE/doc-sle.git").unwrap();
        assert_eq!(repo.url(), "https://github.com/suse/doc-sle.git");
    }

    #[test]
    fn test_parse_abbreviations() {
        assert_eq!(
            Repo::parse("gh://SUSE/doc-sle").unwrap().url(),
            "https://github.com/suse/doc-sle.git"
        );
        assert_eq!(
            Repo::parse("gl://group/project").unwrap().url(),
            "https://gitlab.com/group/project.git"
        );
        assert_eq!(
            Repo::parse("cb://org/repo.git").unwrap().url(),
            "https://codeberg.org/org/repo.git"
        );
        assert!(Repo::parse("xx://org/repo").is_err());
    }

    #[test]
    fn test_parse_bare_name_defaults_to_github() {
        let repo = Repo::parse("openSUSE/doc-kit").unwrap();
        assert_eq!(repo.url(), "https://github.com/opensuse/doc-kit.git");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Repo::parse("").is_err());
        assert!(Repo::parse("just-a-word").is_err());
    }

    #[test]
    fn test_different_spellings_are_equal() {
        let a = Repo::parse("https://github.com/SUSE/doc-sle.git").unwrap();
        let b = Repo::parse("gh://suse/doc-sle").unwrap();
        let c = Repo::parse("git@github.com:SUSE/doc-sle").unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);

        let mut set = std::collections::HashSet::new();
        set.insert(a);
        set.insert(b);
        set.insert(c);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_parse_file_url_keeps_case() {
        let repo = Repo::parse("file:///tmp/Mirrors/Docs.git/").unwrap();
        assert_eq!(repo.url(), "file:///tmp/Mirrors/Docs.git");
        assert_eq!(repo.name(), "/tmp/Mirrors/Docs.git");
    }

    #[test]
    fn test_slug() {
        let repo = Repo::parse("gh://SUSE/doc-sle").unwrap();
        assert_eq!(repo.slug(), "https___github_com_suse_doc_sle_git");
    }
}
