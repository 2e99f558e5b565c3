//! Version constraint resolution.
//!
//! Picks the highest registry tag that satisfies an update policy relative to
//! the version a container currently runs. Tags are read as semantic versions
//! leniently: a leading `v` is accepted and missing minor/patch components
//! count as zero, so `v1.2` and `15` participate. Anything else is ignored.

use std::cmp::Ordering;

use semver::{BuildMetadata, Prerelease, Version};

use crate::policy::UpdatePolicy;

/// A tag chosen by [`resolve`], with the version it parsed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Tag exactly as listed by the registry, used for the pull.
    pub tag: String,
    /// Parsed version.
    pub version: Version,
}

/// Parses an image tag as a semantic version.
///
/// Returns `None` for tags like `latest`, `dev` or `1.2.3.4`.
pub fn parse_tag_version(tag: &str) -> Option<Version> {
    let tag = tag
        .strip_prefix('v')
        .or_else(|| tag.strip_prefix('V'))
        .unwrap_or(tag);

    let (rest, build) = match tag.split_once('+') {
        Some((rest, build)) => (rest, Some(build)),
        None => (tag, None),
    };
    let (core, pre) = match rest.split_once('-') {
        Some((core, pre)) => (core, Some(pre)),
        None => (rest, None),
    };

    let mut numbers = [0u64; 3];
    let mut count = 0;
    for part in core.split('.') {
        if count == numbers.len() || part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        numbers[count] = part.parse().ok()?;
        count += 1;
    }

    let mut version = Version::new(numbers[0], numbers[1], numbers[2]);
    if let Some(pre) = pre {
        version.pre = Prerelease::new(pre).ok()?;
    }
    if let Some(build) = build {
        version.build = BuildMetadata::new(build).ok()?;
    }
    Some(version)
}

/// Whether `candidate` is an acceptable upgrade from `current` under `policy`.
///
/// Pre-release candidates are only eligible while `current` is itself a
/// pre-release of the same `major.minor.patch` (`1.3.0-rc.1` to `1.3.0-rc.2`).
pub fn satisfies(current: &Version, candidate: &Version, policy: UpdatePolicy) -> bool {
    if candidate.cmp_precedence(current) != Ordering::Greater {
        return false;
    }
    if !candidate.pre.is_empty() && !same_release_line(current, candidate) {
        return false;
    }
    match policy {
        UpdatePolicy::Digest => false,
        UpdatePolicy::Patch => candidate.major == current.major && candidate.minor == current.minor,
        UpdatePolicy::Minor => candidate.major == current.major,
        UpdatePolicy::Major => true,
    }
}

fn same_release_line(current: &Version, candidate: &Version) -> bool {
    !current.pre.is_empty()
        && current.major == candidate.major
        && current.minor == candidate.minor
        && current.patch == candidate.patch
}

/// Selects the highest tag satisfying `policy`, or `None` when already up to date.
///
/// Ordering follows semver precedence, so build metadata is ignored. When two
/// tags have equal precedence (`1.3.0` and `v1.3.0`) the first one listed wins.
pub fn resolve<I, S>(current: &Version, policy: UpdatePolicy, tags: I) -> Option<Candidate>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    if policy == UpdatePolicy::Digest {
        return None;
    }

    let mut best: Option<Candidate> = None;
    for tag in tags {
        let tag = tag.as_ref();
        let Some(version) = parse_tag_version(tag) else {
            continue;
        };
        if !satisfies(current, &version, policy) {
            continue;
        }
        let better = best
            .as_ref()
            .is_none_or(|b| version.cmp_precedence(&b.version) == Ordering::Greater);
        if better {
            best = Some(Candidate {
                tag: tag.to_owned(),
                version,
            });
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    const TAGS: [&str; 5] = ["1.2.3", "1.2.4", "1.3.0", "2.0.0", "dev"];

    fn v(s: &str) -> Version {
        parse_tag_version(s).unwrap()
    }

    #[test]
    fn parses_plain_semver() {
        assert_eq!(v("1.2.3"), Version::new(1, 2, 3));
    }

    #[test]
    fn parses_lenient_forms() {
        assert_eq!(v("v1.2.3"), Version::new(1, 2, 3));
        assert_eq!(v("1.2"), Version::new(1, 2, 0));
        assert_eq!(v("15"), Version::new(15, 0, 0));
        assert_eq!(v("V2"), Version::new(2, 0, 0));
    }

    #[test]
    fn parses_prerelease_and_build() {
        let version = v("1.4.0-rc.1+build.7");
        assert_eq!(version.pre.as_str(), "rc.1");
        assert_eq!(version.build.as_str(), "build.7");
    }

    #[test]
    fn rejects_non_semver_tags() {
        for tag in ["latest", "dev", "", "1.2.3.4", "1..2", "v", "stable-alpine", "1.x"] {
            assert!(parse_tag_version(tag).is_none(), "{tag} should not parse");
        }
    }

    #[test]
    fn minor_scenario_picks_highest_same_major() {
        let picked = resolve(&v("1.2.3"), UpdatePolicy::Minor, TAGS).unwrap();
        assert_eq!(picked.tag, "1.3.0");
    }

    #[test]
    fn patch_stays_within_minor() {
        let picked = resolve(&v("1.2.3"), UpdatePolicy::Patch, TAGS).unwrap();
        assert_eq!(picked.tag, "1.2.4");
    }

    #[test]
    fn major_picks_global_maximum() {
        let picked = resolve(&v("1.2.3"), UpdatePolicy::Major, TAGS).unwrap();
        assert_eq!(picked.tag, "2.0.0");
    }

    #[test]
    fn digest_policy_never_resolves() {
        assert!(resolve(&v("1.2.3"), UpdatePolicy::Digest, TAGS).is_none());
    }

    #[test]
    fn up_to_date_returns_none() {
        assert!(resolve(&v("2.0.0"), UpdatePolicy::Major, TAGS).is_none());
        assert!(resolve(&v("1.2.4"), UpdatePolicy::Patch, TAGS).is_none());
    }

    #[test]
    fn non_semver_tags_never_match() {
        let tags = ["latest", "dev", "nightly"];
        for policy in [UpdatePolicy::Patch, UpdatePolicy::Minor, UpdatePolicy::Major] {
            assert!(resolve(&v("0.0.1"), policy, tags).is_none());
        }
    }

    #[test]
    fn patch_never_changes_major_or_minor() {
        let tags = ["1.2.9", "1.3.0", "1.10.1", "2.2.5", "0.2.99"];
        let current = v("1.2.3");
        let picked = resolve(&current, UpdatePolicy::Patch, tags).unwrap();
        assert_eq!((picked.version.major, picked.version.minor), (1, 2));
        assert_eq!(picked.tag, "1.2.9");
    }

    #[test]
    fn minor_on_zero_major_keeps_major() {
        let picked = resolve(&v("0.3.1"), UpdatePolicy::Minor, ["0.4.0", "1.0.0"]).unwrap();
        assert_eq!(picked.tag, "0.4.0");
    }

    #[test]
    fn prerelease_tags_are_not_upgrades_from_a_release() {
        assert!(resolve(&v("1.2.3"), UpdatePolicy::Patch, ["1.2.4-rc.1"]).is_none());

        let picked = resolve(&v("1.2.3"), UpdatePolicy::Major, ["2.0.0", "3.0.0-beta.1"]).unwrap();
        assert_eq!(picked.tag, "2.0.0");

        let picked = resolve(&v("1.2.3"), UpdatePolicy::Minor, ["1.3.0-rc.1", "1.2.4"]).unwrap();
        assert_eq!(picked.tag, "1.2.4");
    }

    #[test]
    fn prerelease_moves_within_its_own_release() {
        let current = v("1.3.0-rc.1");
        let tags = ["1.3.0-rc.2", "1.3.1-rc.1", "1.2.9"];
        let picked = resolve(&current, UpdatePolicy::Patch, tags).unwrap();
        assert_eq!(picked.tag, "1.3.0-rc.2");

        let picked = resolve(&current, UpdatePolicy::Patch, ["1.3.0-rc.2", "1.3.0"]).unwrap();
        assert_eq!(picked.tag, "1.3.0");
    }

    #[test]
    fn build_metadata_does_not_count_as_newer() {
        assert!(resolve(&v("1.2.3"), UpdatePolicy::Major, ["1.2.3+build.5"]).is_none());
    }

    #[test]
    fn equal_precedence_keeps_first_listed() {
        let picked = resolve(&v("1.0.0"), UpdatePolicy::Major, ["v1.1.0", "1.1.0", "1.1.0+b"]).unwrap();
        assert_eq!(picked.tag, "v1.1.0");
    }

    #[test]
    fn keeps_original_tag_spelling() {
        let picked = resolve(&v("15"), UpdatePolicy::Major, ["16", "v15.1"]).unwrap();
        assert_eq!(picked.tag, "16");
        assert_eq!(picked.version, Version::new(16, 0, 0));
    }
}
