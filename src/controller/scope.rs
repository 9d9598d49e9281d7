//! # Scope
//!
//! Everything one reconcile pass knows about a SecurityConfig: the resolved
//! feature configuration and the outcome recorded for every owned resource.
//! A Scope is built by the resolver at the start of a pass, mutated only by
//! that pass, and dropped at its end.

use crate::crd::{AccessPolicy, SecurityConfig};

#[derive(Debug, Clone)]
pub struct Scope {
    pub security_config: SecurityConfig,
    pub token_exchange: TokenExchangeConfig,
    pub authz: AuthzConfig,
    pub descendants: Vec<Descendant>,
    pub invalid_config: bool,
    pub validation_error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenExchangeConfig {
    pub enabled: bool,
    /// Copy of the Application's access policy
    pub access_policy: Option<AccessPolicy>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthzConfig {
    pub enabled: bool,
    /// Set only when authz is enabled and exactly one bundle source is configured
    pub bundle: Option<BundleSource>,
}

/// Where OPA pulls its policy bundle from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BundleSource {
    /// OCI registry; OPA finds the bundle through the discovery server
    Registry { reference: String },
    /// Bundle on a local volume; OPA is pointed at it directly
    LocalVolume { reference: String },
}

impl BundleSource {
    /// `<path>/<resource>:<version>`, or `<path>:<version>` without a resource
    #[must_use]
    pub fn reference(&self) -> &str {
        match self {
            BundleSource::Registry { reference } | BundleSource::LocalVolume { reference } => {
                reference
            }
        }
    }
}

impl AuthzConfig {
    /// Bundle reference, if any
    #[must_use]
    pub fn bundle_url(&self) -> Option<&str> {
        self.bundle.as_ref().map(BundleSource::reference)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success(String),
    Error(String),
}

/// Outcome of converging one owned resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descendant {
    /// `<Kind>-<name>`
    pub id: String,
    pub kind: String,
    pub name: String,
    pub outcome: Outcome,
    /// Whether the resource was desired to exist in this pass
    pub desired: bool,
}

impl Descendant {
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self.outcome, Outcome::Error(_))
    }

    #[must_use]
    pub fn message(&self) -> &str {
        match &self.outcome {
            Outcome::Success(m) | Outcome::Error(m) => m,
        }
    }
}

#[must_use]
pub fn descendant_id(kind: &str, name: &str) -> String {
    format!("{kind}-{name}")
}

impl Scope {
    #[must_use]
    pub fn new(security_config: SecurityConfig) -> Self {
        Self {
            security_config,
            token_exchange: TokenExchangeConfig::default(),
            authz: AuthzConfig::default(),
            descendants: Vec::new(),
            invalid_config: false,
            validation_error: None,
        }
    }

    #[must_use]
    pub fn namespace(&self) -> &str {
        self.security_config.metadata.namespace.as_deref().unwrap_or_default()
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.security_config.metadata.name.as_deref().unwrap_or_default()
    }

    #[must_use]
    pub fn application_ref(&self) -> &str {
        &self.security_config.spec.application_ref
    }

    /// Record an outcome, replacing any earlier record with the same id
    pub fn replace_descendant(&mut self, kind: &str, name: &str, desired: bool, outcome: Outcome) {
        let descendant = Descendant {
            id: descendant_id(kind, name),
            kind: kind.to_string(),
            name: name.to_string(),
            outcome,
            desired,
        };
        match self.descendants.iter_mut().find(|d| d.id == descendant.id) {
            Some(existing) => *existing = descendant,
            None => self.descendants.push(descendant),
        }
    }

    #[must_use]
    pub fn descendant(&self, id: &str) -> Option<&Descendant> {
        self.descendants.iter().find(|d| d.id == id)
    }

    /// Error messages of every failed descendant, in record order
    #[must_use]
    pub fn errors(&self) -> Vec<&str> {
        self.descendants
            .iter()
            .filter(|d| d.is_error())
            .map(Descendant::message)
            .collect()
    }

    pub fn mark_invalid(&mut self, message: impl Into<String>) {
        self.invalid_config = true;
        self.validation_error = Some(message.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::SecurityConfigSpec;

    fn scope() -> Scope {
        Scope::new(SecurityConfig::new(
            "sc",
            SecurityConfigSpec {
                application_ref: "app".to_string(),
                ..Default::default()
            },
        ))
    }

    #[test]
    fn test_replace_descendant_overwrites_in_place() {
        let mut scope = scope();
        scope.replace_descendant("Jwker", "app", true, Outcome::Error("Unable to get".into()));
        scope.replace_descendant("ConfigMap", "app-opa-config", true, Outcome::Success("ok".into()));
        scope.replace_descendant("Jwker", "app", true, Outcome::Success("done".into()));

        assert_eq!(scope.descendants.len(), 2);
        assert_eq!(scope.descendants[0].id, "Jwker-app");
        assert_eq!(scope.descendants[0].message(), "done");
        assert!(scope.errors().is_empty());
    }

    #[test]
    fn test_errors_in_record_order() {
        let mut scope = scope();
        scope.replace_descendant("Jwker", "app", true, Outcome::Error("a".into()));
        scope.replace_descendant("Service", "s", true, Outcome::Success("ok".into()));
        scope.replace_descendant("Deployment", "d", true, Outcome::Error("b".into()));
        assert_eq!(scope.errors(), vec!["a", "b"]);
    }

    #[test]
    fn test_bundle_url_follows_source() {
        let authz = AuthzConfig {
            enabled: true,
            bundle: Some(BundleSource::LocalVolume {
                reference: "/bundles/app:v1".to_string(),
            }),
        };
        assert_eq!(authz.bundle_url(), Some("/bundles/app:v1"));
        assert_eq!(AuthzConfig::default().bundle_url(), None);
    }
}
