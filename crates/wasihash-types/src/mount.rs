//! Mount table: the sandbox's restricted view of the host filesystem.
//!
//! Each entry maps a guest-visible root (e.g. `/output`) to a host directory.
//! Guest paths are always `/`-separated regardless of the host platform.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// A single guest root -> host directory binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mount {
    /// Root name as seen inside the sandbox.
    pub guest: String,
    /// Directory on the host backing that root.
    pub host: PathBuf,
}

/// Ordered mapping from guest root name to host directory.
///
/// Insertion order is preserved so preopened file descriptors are assigned
/// deterministically. Inserting an existing guest root replaces its host
/// directory in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MountTable {
    mounts: Vec<Mount>,
}

impl MountTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `guest` to `host`, overriding any existing binding for `guest`.
    pub fn insert(&mut self, guest: impl Into<String>, host: impl Into<PathBuf>) {
        let guest = guest.into();
        let host = host.into();
        match self.mounts.iter_mut().find(|m| m.guest == guest) {
            Some(existing) => existing.host = host,
            None => self.mounts.push(Mount { guest, host }),
        }
    }

    /// Builder-style variant of [`MountTable::insert`].
    pub fn with(mut self, guest: impl Into<String>, host: impl Into<PathBuf>) -> Self {
        self.insert(guest, host);
        self
    }

    /// Host directory bound to `guest`, if any.
    pub fn host_dir(&self, guest: &str) -> Option<&Path> {
        self.mounts
            .iter()
            .find(|m| m.guest == guest)
            .map(|m| m.host.as_path())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Mount> {
        self.mounts.iter()
    }

    pub fn len(&self) -> usize {
        self.mounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mounts.is_empty()
    }

    /// Map a guest path back to the host path it resolves to.
    ///
    /// The longest matching guest root wins. Returns `None` when the path is
    /// not under any mount.
    pub fn to_host_path(&self, guest_path: &str) -> Option<PathBuf> {
        self.mounts
            .iter()
            .filter_map(|m| {
                let root = m.guest.trim_end_matches('/');
                let rest = guest_path.strip_prefix(root)?;
                if rest.is_empty() {
                    Some((root.len(), m.host.clone()))
                } else if let Some(rel) = rest.strip_prefix('/') {
                    let mut host = m.host.clone();
                    for part in rel.split('/').filter(|p| !p.is_empty() && *p != ".") {
                        host.push(part);
                    }
                    Some((root.len(), host))
                } else {
                    None
                }
            })
            .max_by_key(|(len, _)| *len)
            .map(|(_, host)| host)
    }
}

/// Join a relative host path onto a guest root using `/` separators.
///
/// `.` components are dropped; everything else is kept verbatim so the
/// sandbox, not the host, decides whether a path escapes its mount.
pub fn guest_join(root: &str, relative: &Path) -> String {
    let mut joined = root.trim_end_matches('/').to_string();
    for component in relative.components() {
        let part = component.as_os_str().to_string_lossy();
        if part == "." {
            continue;
        }
        joined.push('/');
        joined.push_str(&part);
    }
    joined
}
