// ABOUTME: Lookup of service declarations by name or routed domain.
// ABOUTME: Wraps the services section of the merged compose configuration.

use serde_yaml::{Mapping, Value};
use thiserror::Error;

use super::declaration::ServiceDeclaration;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LookupError {
    #[error("service \"{0}\" not found in any of the loaded docker-compose files")]
    ServiceNotFound(String),

    #[error("no service found matching those criteria: {0}")]
    NoMatch(String),
}

/// All declared services of the project.
#[derive(Debug, Clone, Default)]
pub struct ServiceLocator {
    services: Mapping,
}

impl ServiceLocator {
    pub fn new(services: Mapping) -> Self {
        Self { services }
    }

    /// Build from a full compose document, reading its `services` section.
    pub fn from_compose(document: &Value) -> Self {
        let services = document
            .get("services")
            .and_then(Value::as_mapping)
            .cloned()
            .unwrap_or_default();
        Self::new(services)
    }

    pub fn services(&self) -> &Mapping {
        &self.services
    }

    pub fn names(&self) -> Vec<String> {
        self.services
            .keys()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect()
    }

    pub fn get_by_name(&self, name: &str) -> Result<ServiceDeclaration, LookupError> {
        self.services
            .get(name)
            .map(|definition| ServiceDeclaration::new(name, definition.clone()))
            .ok_or_else(|| LookupError::ServiceNotFound(name.to_string()))
    }

    pub fn find_by_domain(&self, domain: &str) -> Result<ServiceDeclaration, LookupError> {
        self.all()
            .into_iter()
            .find(|svc| svc.has_domain(domain))
            .ok_or_else(|| LookupError::NoMatch(format!("domain={}", domain)))
    }

    /// Every declaration in definition order.
    pub fn all(&self) -> Vec<ServiceDeclaration> {
        self.services
            .iter()
            .filter_map(|(name, definition)| {
                Some(ServiceDeclaration::new(name.as_str()?, definition.clone()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn locator() -> ServiceLocator {
        let doc: Value = serde_yaml::from_str(
            r#"
version: "3.4"
services:
  gateway:
    image: nginx
  website:
    image: wordpress
    environment:
      VIRTUAL_HOST: example.org,www.example.org
"#,
        )
        .unwrap();
        ServiceLocator::from_compose(&doc)
    }

    #[test]
    fn finds_by_name() {
        let svc = locator().get_by_name("website").unwrap();
        assert_eq!(svc.name(), "website");
        assert_eq!(svc.image(), "wordpress");
    }

    #[test]
    fn missing_name_is_reported() {
        let err = locator().get_by_name("mailer").unwrap_err();
        assert_eq!(err, LookupError::ServiceNotFound("mailer".to_string()));
        assert_eq!(
            err.to_string(),
            "service \"mailer\" not found in any of the loaded docker-compose files"
        );
    }

    #[test]
    fn finds_by_domain() {
        assert_eq!(
            locator().find_by_domain("www.example.org").unwrap().name(),
            "website"
        );
        assert!(matches!(
            locator().find_by_domain("nope.org"),
            Err(LookupError::NoMatch(_))
        ));
    }

    #[test]
    fn keeps_definition_order() {
        assert_eq!(locator().names(), vec!["gateway", "website"]);
    }

    #[test]
    fn document_without_services_is_empty() {
        let doc: Value = serde_yaml::from_str("version: '3'\n").unwrap();
        assert!(ServiceLocator::from_compose(&doc).all().is_empty());
    }
}
