// ABOUTME: Service selector: filters declared services with a small expression language.
// ABOUTME: Loads selectors from profile files and orders matches by start priority.

mod error;
mod eval;
mod lexer;
mod parser;

pub use error::{ProfileError, SelectorError};
pub use eval::Value;

use std::path::{Path, PathBuf};
use tracing::{debug, error};

use crate::service::{ServiceDeclaration, ServiceLocator};

/// Selector matching every declared service.
pub const DEFAULT_SELECTOR: &str = "service is not None";

/// A compiled selector expression.
///
/// Expressions see two names: `service`, the service definition as a
/// mapping, and `name`, the service name. Only literals, comparisons,
/// membership tests, boolean logic, subscripts, `+`/`-` and a handful of
/// string methods are accepted.
#[derive(Debug, Clone)]
pub struct ServiceSelector {
    source: String,
    compiled: Result<parser::Expr, SelectorError>,
}

impl ServiceSelector {
    pub fn new(source: impl Into<String>) -> Self {
        let source = source.into();
        let compiled = parser::parse(&source);
        Self { source, compiled }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Syntax or forbidden-construct error found while compiling, if any.
    pub fn compile_error(&self) -> Option<&SelectorError> {
        self.compiled.as_ref().err()
    }

    /// Evaluate against one service definition.
    pub fn evaluate(
        &self,
        name: &str,
        definition: &serde_yaml::Value,
    ) -> Result<bool, SelectorError> {
        let expr = self.compiled.as_ref().map_err(Clone::clone)?;
        let scope = eval::Scope::new(name, definition);
        eval::evaluate(expr, &scope).map(|value| value.is_truthy())
    }

    /// Like [`evaluate`](Self::evaluate), but failures exclude the service
    /// and are logged.
    pub fn is_service_matching(&self, name: &str, definition: &serde_yaml::Value) -> bool {
        match self.evaluate(name, definition) {
            Ok(matched) => matched,
            Err(e) => {
                error!(
                    service = name,
                    selector = %self.source,
                    error = %e,
                    "cannot evaluate selector, skipping service"
                );
                false
            }
        }
    }

    /// Matching services in ascending priority order.
    ///
    /// Services with equal priority keep their definition order.
    pub fn find_matching_services(&self, locator: &ServiceLocator) -> Vec<ServiceDeclaration> {
        let mut matched: Vec<ServiceDeclaration> = locator
            .all()
            .into_iter()
            .filter(|svc| self.is_service_matching(svc.name(), svc.definition()))
            .collect();

        matched.sort_by_key(ServiceDeclaration::priority);
        debug!(
            selector = %self.source,
            matched = matched.len(),
            "selected services"
        );
        matched
    }
}

impl Default for ServiceSelector {
    fn default() -> Self {
        Self::new(DEFAULT_SELECTOR)
    }
}

/// Reads named selector profiles from `{apps}/profile/{name}.profile.py`.
#[derive(Debug, Clone)]
pub struct ProfileLoader {
    apps_path: PathBuf,
}

impl ProfileLoader {
    pub fn new(apps_path: impl AsRef<Path>) -> Self {
        Self {
            apps_path: apps_path.as_ref().to_path_buf(),
        }
    }

    pub fn profile_path(&self, name: &str) -> PathBuf {
        self.apps_path
            .join("profile")
            .join(format!("{}.profile.py", name))
    }

    /// Load a profile, or the match-all selector when no profile is named.
    pub fn load(&self, name: Option<&str>) -> Result<ServiceSelector, ProfileError> {
        let name = match name.map(str::trim) {
            None | Some("") => return Ok(ServiceSelector::default()),
            Some(name) => name,
        };

        let path = self.profile_path(name);
        match std::fs::read_to_string(&path) {
            Ok(source) => Ok(ServiceSelector::new(source.trim())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ProfileError::NotFound {
                name: name.to_string(),
                path,
            }),
            Err(source) => Err(ProfileError::Read { path, source }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn locator(yaml: &str) -> ServiceLocator {
        ServiceLocator::new(serde_yaml::from_str(yaml).unwrap())
    }

    #[test]
    fn default_selector_matches_everything() {
        let services = locator("a: {}\nb:\n  image: x\n");
        let names: Vec<String> = ServiceSelector::default()
            .find_matching_services(&services)
            .iter()
            .map(|s| s.name().to_string())
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn evaluation_errors_exclude_only_that_service() {
        let services = locator("with_ports:\n  ports: ['80']\nwithout_ports: {}\n");
        let selector = ServiceSelector::new("len := service['ports']");
        assert!(selector.compile_error().is_some());
        assert!(selector.find_matching_services(&services).is_empty());

        let selector = ServiceSelector::new("service['ports'][0] == '80'");
        let matched = selector.find_matching_services(&services);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].name(), "with_ports");
    }

    #[test]
    fn missing_profile_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let loader = ProfileLoader::new(dir.path());
        let err = loader.load(Some("gateways")).unwrap_err();
        assert!(matches!(err, ProfileError::NotFound { ref name, .. } if name == "gateways"));
    }

    #[test]
    fn loads_profile_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("profile")).unwrap();
        std::fs::write(
            dir.path().join("profile/gateways.profile.py"),
            "name.startswith('gateway')\n",
        )
        .unwrap();

        let selector = ProfileLoader::new(dir.path()).load(Some("gateways")).unwrap();
        assert_eq!(selector.source(), "name.startswith('gateway')");
    }

    #[test]
    fn empty_profile_name_means_all() {
        let loader = ProfileLoader::new("/nonexistent");
        assert_eq!(loader.load(Some("")).unwrap().source(), DEFAULT_SELECTOR);
        assert_eq!(loader.load(None).unwrap().source(), DEFAULT_SELECTOR);
    }
}
