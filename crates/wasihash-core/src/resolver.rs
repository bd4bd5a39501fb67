//! Path virtualization: host paths -> sandbox mounts and guest paths.
//!
//! The sandbox sees exactly two roots: the output root, always backed by the
//! module directory where temp files live, and the input root, backed by the
//! working directory or, for absolute inputs, by the file's own directory.

use std::path::{Path, PathBuf};

use uuid::Uuid;
use wasihash_types::config::HasherConfig;
use wasihash_types::error::HashError;
use wasihash_types::mount::{MountTable, guest_join};
use wasihash_types::request::VirtualConfig;

/// Resolves caller-supplied paths into per-request [`VirtualConfig`]s.
///
/// Holds no process-global state: the working directory and module
/// directory are injected, so tests can point it at fixture roots.
#[derive(Debug, Clone)]
pub struct PathResolver {
    workdir: PathBuf,
    module_dir: PathBuf,
    input_mount: String,
    output_mount: String,
}

impl PathResolver {
    /// Create a resolver with the default `/input` and `/output` mount names.
    pub fn new(workdir: impl Into<PathBuf>, module_dir: impl Into<PathBuf>) -> Self {
        let defaults = HasherConfig::default();
        Self {
            workdir: workdir.into(),
            module_dir: module_dir.into(),
            input_mount: defaults.input_mount,
            output_mount: defaults.output_mount,
        }
    }

    /// Build a resolver from config, using `fallback_workdir` when the config
    /// does not pin one.
    pub fn from_config(config: &HasherConfig, fallback_workdir: &Path) -> Self {
        Self {
            workdir: config.effective_workdir(fallback_workdir),
            module_dir: config.effective_module_dir(),
            input_mount: config.input_mount.clone(),
            output_mount: config.output_mount.clone(),
        }
    }

    /// Mount table used for relative inputs: output root first, then input.
    pub fn default_mounts(&self) -> MountTable {
        MountTable::new()
            .with(&self.output_mount, &self.module_dir)
            .with(&self.input_mount, &self.workdir)
    }

    /// Produce the virtualization config for `source_path`, or fail with
    /// [`HashError::FileNotFound`] if the file is missing.
    ///
    /// Only existence checks touch the filesystem; no temp file is created.
    pub fn resolve(&self, source_path: impl AsRef<Path>) -> Result<VirtualConfig, HashError> {
        let source_path = source_path.as_ref();
        if source_path.as_os_str().is_empty() {
            return Err(self.not_found(source_path, &self.workdir));
        }

        let is_absolute = source_path.is_absolute();
        let mut mount_table = self.default_mounts();

        let (workdir, virtual_input_path) = if is_absolute {
            let (Some(parent), Some(file_name)) = (source_path.parent(), source_path.file_name())
            else {
                return Err(self.not_found(source_path, &self.workdir));
            };
            if !source_path.exists() {
                return Err(self.not_found(source_path, parent));
            }
            mount_table.insert(&self.input_mount, parent);
            (
                parent.to_path_buf(),
                guest_join(&self.input_mount, Path::new(file_name)),
            )
        } else {
            if !self.workdir.join(source_path).exists() {
                return Err(self.not_found(source_path, &self.workdir));
            }
            (
                self.workdir.clone(),
                guest_join(&self.input_mount, source_path),
            )
        };

        let temp_id = Uuid::new_v4();
        let temp_name = temp_id.to_string();

        let config = VirtualConfig {
            source_path: source_path.to_path_buf(),
            is_absolute,
            workdir,
            temp_id,
            temp_file_path: self.module_dir.join(&temp_name),
            virtual_input_path,
            virtual_output_path: guest_join(&self.output_mount, Path::new(&temp_name)),
            mount_table,
        };

        tracing::debug!(
            source = %config.source_path.display(),
            input = %config.virtual_input_path,
            output = %config.virtual_output_path,
            "resolved virtual paths"
        );

        Ok(config)
    }

    fn not_found(&self, path: &Path, workdir: &Path) -> HashError {
        HashError::FileNotFound {
            path: path.to_path_buf(),
            workdir: workdir.to_path_buf(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tempfile::TempDir;

    struct Fixture {
        workdir: TempDir,
        module_dir: TempDir,
        resolver: PathResolver,
    }

    fn fixture() -> Fixture {
        let workdir = TempDir::new().unwrap();
        let module_dir = TempDir::new().unwrap();
        let resolver = PathResolver::new(workdir.path(), module_dir.path());
        Fixture {
            workdir,
            module_dir,
            resolver,
        }
    }

    #[test]
    fn test_resolve_relative_uses_default_mounts() {
        let fx = fixture();
        std::fs::create_dir(fx.workdir.path().join("docs")).unwrap();
        std::fs::write(fx.workdir.path().join("docs/a.txt"), "hello").unwrap();

        let config = fx.resolver.resolve("docs/a.txt").unwrap();

        assert!(!config.is_absolute);
        assert_eq!(config.workdir, fx.workdir.path());
        assert_eq!(config.virtual_input_path, "/input/docs/a.txt");
        assert_eq!(config.mount_table, fx.resolver.default_mounts());
        assert_eq!(
            config.mount_table.host_dir("/output"),
            Some(fx.module_dir.path())
        );
    }

    #[test]
    fn test_resolve_relative_missing_is_file_not_found() {
        let fx = fixture();
        let err = fx.resolver.resolve("nope.txt").unwrap_err();
        match err {
            HashError::FileNotFound { path, workdir } => {
                assert_eq!(path, PathBuf::from("nope.txt"));
                assert_eq!(workdir, fx.workdir.path());
            }
            other => panic!("expected FileNotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_resolve_absolute_outside_workdir_mounts_parent() {
        let fx = fixture();
        let outside = TempDir::new().unwrap();
        let file = outside.path().join("elsewhere.bin");
        std::fs::write(&file, [1u8, 2, 3]).unwrap();

        let config = fx.resolver.resolve(&file).unwrap();

        assert!(config.is_absolute);
        assert_eq!(config.workdir, outside.path());
        assert_eq!(config.virtual_input_path, "/input/elsewhere.bin");
        assert_eq!(config.mount_table.host_dir("/input"), Some(outside.path()));
        assert_eq!(
            config.mount_table.host_dir("/output"),
            Some(fx.module_dir.path())
        );
        assert_eq!(config.mount_table.len(), 2);
    }

    #[test]
    fn test_resolve_absolute_missing_is_file_not_found() {
        let fx = fixture();
        let missing = fx.workdir.path().join("missing.txt");
        let err = fx.resolver.resolve(&missing).unwrap_err();
        assert!(matches!(err, HashError::FileNotFound { .. }));
    }

    #[test]
    fn test_resolve_empty_path_is_file_not_found() {
        let fx = fixture();
        assert!(matches!(
            fx.resolver.resolve(""),
            Err(HashError::FileNotFound { .. })
        ));
    }

    #[test]
    fn test_resolve_output_paths_share_temp_id() {
        let fx = fixture();
        std::fs::write(fx.workdir.path().join("a.txt"), "a").unwrap();

        let config = fx.resolver.resolve("a.txt").unwrap();
        let id = config.temp_id.to_string();

        assert_eq!(config.virtual_output_path, format!("/output/{id}"));
        assert_eq!(config.temp_file_path, fx.module_dir.path().join(&id));
    }

    #[test]
    fn test_resolve_generates_unique_temp_ids() {
        let fx = fixture();
        std::fs::write(fx.workdir.path().join("a.txt"), "a").unwrap();

        let ids: HashSet<Uuid> = (0..64)
            .map(|_| fx.resolver.resolve("a.txt").unwrap().temp_id)
            .collect();
        assert_eq!(ids.len(), 64);
    }

    #[test]
    fn test_resolve_has_no_side_effects() {
        let fx = fixture();
        std::fs::write(fx.workdir.path().join("a.txt"), "a").unwrap();

        let config = fx.resolver.resolve("a.txt").unwrap();

        assert!(!config.temp_file_path.exists());
        assert_eq!(std::fs::read_dir(fx.module_dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_from_config_respects_mount_names() {
        let fx = fixture();
        std::fs::write(fx.workdir.path().join("a.txt"), "a").unwrap();
        let config = HasherConfig {
            module_dir: Some(fx.module_dir.path().to_path_buf()),
            input_mount: "/in".to_string(),
            output_mount: "/out".to_string(),
            ..HasherConfig::default()
        };

        let resolver = PathResolver::from_config(&config, fx.workdir.path());
        let resolved = resolver.resolve("a.txt").unwrap();

        assert_eq!(resolved.virtual_input_path, "/in/a.txt");
        assert!(resolved.virtual_output_path.starts_with("/out/"));
        assert_eq!(resolved.mount_table.host_dir("/in"), Some(fx.workdir.path()));
    }
}
