//! Detection of the daemon's own container.
//!
//! The daemon must never replace the container it runs in. How that is
//! recognised depends on the environment, so the check sits behind
//! [`SelfDetector`]. The default [`HostnameSelfDetector`] relies on Docker
//! setting a container's hostname to the short form of its ID.

use tracing::debug;

const PROC_HOSTNAME: &str = "/proc/sys/kernel/hostname";

/// Decides whether a container is the one this process runs in.
pub trait SelfDetector: Send + Sync {
    /// Returns `true` if `container_id` identifies the daemon's own container.
    fn is_self(&self, container_id: &str) -> bool;
}

impl<F> SelfDetector for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn is_self(&self, container_id: &str) -> bool {
        self(container_id)
    }
}

/// Matches when the host name is a prefix of the container ID.
#[derive(Debug, Clone, Default)]
pub struct HostnameSelfDetector {
    hostname: String,
}

impl HostnameSelfDetector {
    /// Uses an explicit host name.
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into().trim().to_ascii_lowercase(),
        }
    }

    /// Reads the host name from the kernel, falling back to `$HOSTNAME`.
    pub fn from_environment() -> Self {
        let hostname = std::fs::read_to_string(PROC_HOSTNAME)
            .ok()
            .or_else(|| std::env::var("HOSTNAME").ok())
            .unwrap_or_default();
        debug!(hostname = %hostname.trim(), "resolved own host name");
        Self::new(hostname)
    }
}

impl SelfDetector for HostnameSelfDetector {
    fn is_self(&self, container_id: &str) -> bool {
        !self.hostname.is_empty() && container_id.to_ascii_lowercase().starts_with(&self.hostname)
    }
}
