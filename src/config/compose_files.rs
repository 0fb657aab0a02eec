// ABOUTME: Discovery of the compose files making up a project.
// ABOUTME: Root docker-compose.yml first, then application files found under apps/conf.

use nonempty::NonEmpty;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{Error, Result};

pub const ROOT_COMPOSE_FILE: &str = "docker-compose.yml";
pub const APPS_CONF_DIR: &str = "conf";
pub const APPS_DEV_CONF_DIR: &str = "conf.dev";

/// Compose files in the order they are passed to compose with `-f`.
///
/// Files inside each directory are sorted so the merge order is stable.
pub fn discover(project_dir: &Path, apps_dir: &Path, dev: bool) -> Result<NonEmpty<PathBuf>> {
    let root = project_dir.join(ROOT_COMPOSE_FILE);
    if !root.exists() {
        return Err(Error::ComposeFileNotFound(root));
    }

    let mut files = NonEmpty::new(root);
    let mut dirs = vec![apps_dir.join(APPS_CONF_DIR)];
    if dev {
        dirs.push(apps_dir.join(APPS_DEV_CONF_DIR));
    }
    for path in dirs.iter().flat_map(|dir| yaml_files_in(dir)) {
        files.push(path);
    }

    Ok(files)
}

fn yaml_files_in(dir: &Path) -> Vec<PathBuf> {
    if !dir.is_dir() {
        return Vec::new();
    }

    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            matches!(
                path.extension().and_then(|e| e.to_str()),
                Some("yml" | "yaml")
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "version: '3'\n").unwrap();
    }

    #[test]
    fn root_file_comes_first_then_sorted_app_files() {
        let dir = tempfile::tempdir().unwrap();
        let apps = dir.path().join("apps");
        touch(&dir.path().join(ROOT_COMPOSE_FILE));
        touch(&apps.join("conf/web.yml"));
        touch(&apps.join("conf/db.yaml"));
        touch(&apps.join("conf/README.md"));
        touch(&apps.join("conf.dev/debug.yml"));

        let files = discover(dir.path(), &apps, false).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["docker-compose.yml", "db.yaml", "web.yml"]);

        let dev = discover(dir.path(), &apps, true).unwrap();
        assert_eq!(dev.len(), 4);
        assert!(dev.last().ends_with("conf.dev/debug.yml"));
    }

    #[test]
    fn missing_root_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = discover(dir.path(), &dir.path().join("apps"), false).unwrap_err();
        assert!(matches!(err, Error::ComposeFileNotFound(_)));
    }
}
