//! Ordered validator registry.
//!
//! Validators run in registration order. Each one is stored under a label
//! that keys its entries in `meta.validators` and that hooks use to scope
//! themselves. Unlabeled validators get a synthetic label `"{kind}#{n}"`,
//! where `n` is the 1-based registration position, so the key is stable
//! across runs and processes.

use std::fmt;
use std::sync::Arc;

use crate::error::ConfigError;
use crate::submission::ReadOnlySnapshot;

use super::outcome::ValidationOutcome;

/// A check against a frozen submission.
///
/// `Ok(Failed(..))` is the normal way to reject. Returning `Err` is treated
/// as unexpected unless the error is a `ValidationFailure`, which is then
/// recorded exactly like `Ok(Failed(..))`.
pub trait Validator: Send + Sync {
    fn check(&self, snapshot: &ReadOnlySnapshot) -> anyhow::Result<ValidationOutcome>;

    /// Type tag used when deriving a label for an unlabeled registration.
    fn kind(&self) -> &'static str {
        "validator"
    }
}

/// Adapter turning a closure into a `Validator`.
pub struct FnValidator<F> {
    kind: &'static str,
    f: F,
}

impl<F> Validator for FnValidator<F>
where
    F: Fn(&ReadOnlySnapshot) -> anyhow::Result<ValidationOutcome> + Send + Sync,
{
    fn check(&self, snapshot: &ReadOnlySnapshot) -> anyhow::Result<ValidationOutcome> {
        (self.f)(snapshot)
    }

    fn kind(&self) -> &'static str {
        self.kind
    }
}

/// Wrap a closure as a validator with kind `"fn"`.
pub fn from_fn<F>(f: F) -> FnValidator<F>
where
    F: Fn(&ReadOnlySnapshot) -> anyhow::Result<ValidationOutcome> + Send + Sync,
{
    FnValidator { kind: "fn", f }
}

/// Synthetic label for an unlabeled registration.
pub fn derive_label(kind: &str, position: usize) -> String {
    format!("{}#{}", kind, position)
}

#[derive(Clone)]
pub struct RegisteredValidator {
    pub label: String,
    pub validator: Arc<dyn Validator>,
}

impl fmt::Debug for RegisteredValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredValidator")
            .field("label", &self.label)
            .field("kind", &self.validator.kind())
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ValidatorRegistry {
    entries: Vec<RegisteredValidator>,
}

impl ValidatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a validator, returning the label it was stored under.
    pub fn register<V>(&mut self, label: Option<&str>, validator: V) -> Result<String, ConfigError>
    where
        V: Validator + 'static,
    {
        self.register_arc(label, Arc::new(validator))
    }

    pub fn register_arc(
        &mut self,
        label: Option<&str>,
        validator: Arc<dyn Validator>,
    ) -> Result<String, ConfigError> {
        let label = match label {
            Some(l) if l.trim().is_empty() => {
                return Err(ConfigError::InvalidValidator {
                    label: l.to_string(),
                    reason: "label is blank".to_string(),
                });
            }
            Some(l) => l.trim().to_string(),
            None => derive_label(validator.kind(), self.entries.len() + 1),
        };

        if self.entries.iter().any(|e| e.label == label) {
            return Err(ConfigError::InvalidValidator {
                label,
                reason: "label already registered".to_string(),
            });
        }

        log::debug!(
            "VALIDATOR_REGISTERED label={} kind={} position={}",
            label,
            validator.kind(),
            self.entries.len() + 1
        );

        self.entries.push(RegisteredValidator {
            label: label.clone(),
            validator,
        });
        Ok(label)
    }

    pub fn labels(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.label.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegisteredValidator> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::builtin::{EmailFormat, RequiredFields};

    #[test]
    fn test_registration_order_and_labels() {
        let mut registry = ValidatorRegistry::new();
        registry
            .register(Some("required"), RequiredFields::new(["email"]))
            .unwrap();
        let derived = registry.register(None, EmailFormat::default()).unwrap();
        let closure = registry
            .register(None, from_fn(|_s: &ReadOnlySnapshot| Ok(ValidationOutcome::ok())))
            .unwrap();

        assert_eq!(derived, "email#2");
        assert_eq!(closure, "fn#3");
        assert_eq!(registry.labels(), vec!["required", "email#2", "fn#3"]);
    }

    #[test]
    fn test_derived_labels_are_reproducible() {
        let build = || {
            let mut r = ValidatorRegistry::new();
            r.register(None, EmailFormat::default()).unwrap();
            r.register(None, EmailFormat::default()).unwrap();
            r.labels().into_iter().map(String::from).collect::<Vec<_>>()
        };
        assert_eq!(build(), build());
        assert_eq!(build(), vec!["email#1", "email#2"]);
    }

    #[test]
    fn test_invalid_labels_rejected() {
        let mut registry = ValidatorRegistry::new();
        let err = registry
            .register(Some("  "), EmailFormat::default())
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValidator { .. }));

        registry.register(Some("email"), EmailFormat::default()).unwrap();
        let err = registry
            .register(Some("email"), EmailFormat::default())
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValidator { .. }));
        assert_eq!(registry.len(), 1);
    }
}
