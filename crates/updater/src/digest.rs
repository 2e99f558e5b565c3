//! Digest comparison.
//!
//! Decides whether a freshly pulled image differs from the one a container
//! runs. Registry content digests are preferred over local image IDs since
//! only the former are stable across hosts.

use crate::docker::ImageDetails;
use crate::reference::ImageReference;

/// Reduces `repo@sha256:X`, `sha256:X` or a bare 64-hex `X` to lowercase `sha256:X`.
pub fn normalize(digest: &str) -> String {
    let digest = digest.trim();
    let digest = digest.rsplit_once('@').map_or(digest, |(_, d)| d);
    let lower = digest.to_ascii_lowercase();
    if !lower.contains(':') && lower.len() == 64 && lower.bytes().all(|b| b.is_ascii_hexdigit()) {
        return format!("sha256:{lower}");
    }
    lower
}

/// Whether `after` differs from `before`.
///
/// A missing `before` (nothing known locally) always counts as changed.
pub fn changed(before: Option<&str>, after: &str) -> bool {
    match before {
        Some(before) => normalize(before) != normalize(after),
        None => true,
    }
}

impl ImageDetails {
    /// Canonical identity of the image as seen from `reference`'s repository.
    ///
    /// Picks the repo digest of the same repository when there is one, then
    /// any repo digest, then the local image ID.
    pub fn content_digest(&self, reference: &ImageReference) -> Option<String> {
        let same_repository = self.repo_digests.iter().find(|entry| {
            entry
                .split_once('@')
                .and_then(|(repo, _)| ImageReference::parse(repo).ok())
                .is_some_and(|repo| repo.same_repository(reference))
        });

        same_repository
            .or_else(|| self.repo_digests.first())
            .map(|d| normalize(d))
            .or_else(|| (!self.id.is_empty()).then(|| normalize(&self.id)))
    }
}
