//! Image reference parsing.
//!
//! Splits an image string such as `ghcr.io/org/app:1.4.2` or
//! `postgres@sha256:...` into registry, repository path, tag and digest,
//! following the Docker distribution reference grammar.
//!
//! Normalization mirrors the Docker CLI: a missing registry means
//! `docker.io`, single-component Docker Hub names live under `library/`,
//! and a missing tag means `latest`. The repository is also kept exactly as
//! written so rewritten targets pull from the same place the container did.

use std::fmt;

use crate::error::UpdaterError;

/// Registry assumed when the reference names none.
pub const DEFAULT_REGISTRY: &str = "docker.io";

/// Tag assumed when the reference names none.
pub const DEFAULT_TAG: &str = "latest";

const DOCKER_HUB_API_HOST: &str = "registry-1.docker.io";
const MAX_NAME_LEN: usize = 255;
const MAX_TAG_LEN: usize = 128;

/// A parsed image reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageReference {
    /// Repository as written, without tag or digest (`myapp`, `ghcr.io/org/app`).
    name: String,
    /// Normalized registry domain (`docker.io`, `ghcr.io`, `localhost:5000`).
    registry: String,
    /// Repository path inside the registry (`library/nginx`, `org/app`).
    path: String,
    /// Tag as written, if any.
    tag: Option<String>,
    /// Content digest (`sha256:...`), if any.
    digest: Option<String>,
}

impl ImageReference {
    /// Parses an image string.
    ///
    /// Fails only on syntactically invalid input. A missing tag is not an
    /// error; neither is a missing registry. Bare image IDs (`sha256:<hex>`)
    /// are rejected because they name no repository to update from.
    pub fn parse(image: &str) -> Result<Self, UpdaterError> {
        let malformed = |reason: &str| UpdaterError::MalformedReference {
            reference: image.to_owned(),
            reason: reason.to_owned(),
        };

        if image.is_empty() {
            return Err(malformed("empty reference"));
        }
        if image.chars().any(char::is_whitespace) {
            return Err(malformed("contains whitespace"));
        }
        if is_image_id(image) {
            return Err(malformed("image ID is not a repository reference"));
        }

        let (name_part, digest) = match image.split_once('@') {
            Some((name, digest)) => {
                validate_digest(digest).map_err(|reason| malformed(&reason))?;
                (name, Some(digest.to_owned()))
            }
            None => (image, None),
        };

        // A ':' after the last '/' separates the tag; earlier ones belong to a registry port.
        let last_slash = name_part.rfind('/').map_or(0, |i| i + 1);
        let (name, tag) = match name_part[last_slash..].rfind(':') {
            Some(i) => {
                let split = last_slash + i;
                let tag = &name_part[split + 1..];
                validate_tag(tag).map_err(|reason| malformed(&reason))?;
                (&name_part[..split], Some(tag.to_owned()))
            }
            None => (name_part, None),
        };

        if name.is_empty() {
            return Err(malformed("missing repository name"));
        }
        if name.len() > MAX_NAME_LEN {
            return Err(malformed("repository name too long"));
        }

        let (registry, remainder) = split_registry(name);
        validate_registry(&registry).map_err(|reason| malformed(&reason))?;

        for component in remainder.split('/') {
            validate_path_component(component).map_err(|reason| malformed(&reason))?;
        }

        let path = if registry == DEFAULT_REGISTRY && !remainder.contains('/') {
            format!("library/{remainder}")
        } else {
            remainder.to_owned()
        };

        Ok(Self {
            name: name.to_owned(),
            registry,
            path,
            tag,
            digest,
        })
    }

    /// Repository as written, without tag or digest.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Normalized registry domain.
    pub fn registry(&self) -> &str {
        &self.registry
    }

    /// Repository path inside the registry, as used by the distribution API.
    pub fn repository_path(&self) -> &str {
        &self.path
    }

    /// Host that serves the distribution API for this registry.
    pub fn registry_host(&self) -> &str {
        if self.registry == DEFAULT_REGISTRY {
            DOCKER_HUB_API_HOST
        } else {
            &self.registry
        }
    }

    /// Tag used for semantic matching.
    ///
    /// `None` for digest-addressed references, which are never semver-matched.
    /// A bare reference reports the implicit `latest`.
    pub fn tag(&self) -> Option<&str> {
        if self.digest.is_some() {
            return None;
        }
        Some(self.tag.as_deref().unwrap_or(DEFAULT_TAG))
    }

    /// Content digest, if the reference is digest-addressed.
    pub fn digest(&self) -> Option<&str> {
        self.digest.as_deref()
    }

    /// Whether the reference pins an exact digest.
    pub fn is_digest_pinned(&self) -> bool {
        self.digest.is_some()
    }

    /// Same repository addressed by a different tag.
    pub fn with_tag(&self, tag: &str) -> Self {
        Self {
            name: self.name.clone(),
            registry: self.registry.clone(),
            path: self.path.clone(),
            tag: Some(tag.to_owned()),
            digest: None,
        }
    }

    /// Whether both references name the same repository, regardless of spelling.
    pub fn same_repository(&self, other: &Self) -> bool {
        self.registry == other.registry && self.path == other.path
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if let Some(tag) = &self.tag {
            write!(f, ":{tag}")?;
        }
        if let Some(digest) = &self.digest {
            write!(f, "@{digest}")?;
        }
        Ok(())
    }
}

impl std::str::FromStr for ImageReference {
    type Err = UpdaterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Whether the string is a local image ID rather than a reference.
fn is_image_id(image: &str) -> bool {
    let hex = image.strip_prefix("sha256:").unwrap_or(image);
    hex.len() == 64 && hex.chars().all(|c| c.is_ascii_hexdigit())
}

/// Splits the leading registry domain off a repository name.
///
/// The first component is a domain only if it looks like one: it contains
/// a `.` or a `:` or is exactly `localhost`.
fn split_registry(name: &str) -> (String, &str) {
    match name.split_once('/') {
        Some((first, rest))
            if first.contains('.') || first.contains(':') || first == "localhost" =>
        {
            let registry = match first {
                "index.docker.io" | "registry-1.docker.io" => DEFAULT_REGISTRY,
                other => other,
            };
            (registry.to_owned(), rest)
        }
        _ => (DEFAULT_REGISTRY.to_owned(), name),
    }
}

fn validate_registry(registry: &str) -> Result<(), String> {
    let (host, port) = match registry.rsplit_once(':') {
        Some((host, port)) => (host, Some(port)),
        None => (registry, None),
    };
    if host.is_empty()
        || !host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
    {
        return Err(format!("invalid registry host '{registry}'"));
    }
    if let Some(port) = port
        && (port.is_empty() || port.parse::<u16>().is_err())
    {
        return Err(format!("invalid registry port in '{registry}'"));
    }
    Ok(())
}

/// Path components are lowercase alphanumerics joined by `.`, `_`, `__`
/// or runs of `-`.
fn validate_path_component(component: &str) -> Result<(), String> {
    if component.is_empty() {
        return Err("empty path component".to_owned());
    }

    let bytes = component.as_bytes();
    let is_alnum = |b: u8| b.is_ascii_lowercase() || b.is_ascii_digit();

    if !is_alnum(bytes[0]) || !is_alnum(bytes[bytes.len() - 1]) {
        return Err(format!(
            "path component '{component}' must start and end with a lowercase letter or digit"
        ));
    }

    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if is_alnum(b) {
            i += 1;
            continue;
        }
        let separator_len = match b {
            b'.' => 1,
            b'_' if bytes.get(i + 1) == Some(&b'_') => 2,
            b'_' => 1,
            b'-' => bytes[i..].iter().take_while(|&&c| c == b'-').count(),
            _ => {
                return Err(format!(
                    "path component '{component}' contains invalid character '{}'",
                    b as char
                ));
            }
        };
        i += separator_len;
        if i >= bytes.len() || !is_alnum(bytes[i]) {
            return Err(format!(
                "path component '{component}' has adjacent separators"
            ));
        }
    }
    Ok(())
}

fn validate_tag(tag: &str) -> Result<(), String> {
    if tag.is_empty() {
        return Err("empty tag".to_owned());
    }
    if tag.len() > MAX_TAG_LEN {
        return Err(format!("tag longer than {MAX_TAG_LEN} characters"));
    }
    let mut chars = tag.chars();
    let first_ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_');
    if !first_ok || !chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')) {
        return Err(format!("invalid tag '{tag}'"));
    }
    Ok(())
}

fn validate_digest(digest: &str) -> Result<(), String> {
    let Some((algorithm, hex)) = digest.split_once(':') else {
        return Err(format!("digest '{digest}' is missing an algorithm"));
    };
    let algorithm_ok = !algorithm.is_empty()
        && algorithm
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '+' | '.' | '_' | '-'));
    if !algorithm_ok {
        return Err(format!("invalid digest algorithm '{algorithm}'"));
    }
    if hex.len() < 32 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(format!("invalid digest value in '{digest}'"));
    }
    if algorithm == "sha256" && (hex.len() != 64 || hex.chars().any(|c| c.is_ascii_uppercase())) {
        return Err("sha256 digest must be 64 lowercase hex characters".to_owned());
    }
    Ok(())
}
