// ABOUTME: Diagnostics accumulator for non-fatal warnings during service operations.
// ABOUTME: Collects warnings that shouldn't fail a command but should be shown to users.

/// Collects non-fatal warnings during service operations.
#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    /// Record a warning, auto-logging it via tracing.
    pub fn warn(&mut self, warning: Warning) {
        tracing::warn!("{}", warning.message);
        self.warnings.push(warning);
    }

    /// Get all collected warnings.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Check if any warnings were collected.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn of_kind(&self, kind: WarningKind) -> impl Iterator<Item = &Warning> {
        self.warnings.iter().filter(move |w| w.kind == kind)
    }
}

/// A non-fatal warning.
#[derive(Debug, Clone)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    /// An old image could not be removed after a deployment.
    pub fn image_cleanup(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::ImageCleanup,
            message: message.into(),
        }
    }

    /// A service failed while the rest of a batch went on.
    pub fn service_failed(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::ServiceFailed,
            message: message.into(),
        }
    }

    /// The container has no health check, so readiness was assumed.
    pub fn health_unverified(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::HealthUnverified,
            message: message.into(),
        }
    }
}

/// Categories of warnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    /// Removing a previous image failed; it stays on disk.
    ImageCleanup,
    /// One service of a batch failed to start.
    ServiceFailed,
    /// Readiness could not be checked.
    HealthUnverified,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostics_starts_empty() {
        let diag = Diagnostics::default();
        assert!(!diag.has_warnings());
        assert!(diag.warnings().is_empty());
    }

    #[test]
    fn diagnostics_collects_warnings_by_kind() {
        let mut diag = Diagnostics::default();

        diag.warn(Warning::image_cleanup("image nginx:1.18 is still in use"));
        diag.warn(Warning::service_failed("website: not healthy"));
        diag.warn(Warning::image_cleanup("image redis:5 not found"));

        assert!(diag.has_warnings());
        assert_eq!(diag.warnings().len(), 3);
        assert_eq!(diag.of_kind(WarningKind::ImageCleanup).count(), 2);
        assert_eq!(diag.warnings()[1].kind, WarningKind::ServiceFailed);
    }
}
