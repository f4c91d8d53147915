//! String-keyed tunable parameter registry.
//!
//! Every erosion model exposes its coefficients through a [`ParameterCollection`]
//! so a driving UI can render sliders without knowing the model. Values are
//! validated against a (min, max) range on mutation; a parameter registered
//! with min == max is unconstrained, which is how integer-ish knobs such as
//! iteration counts are encoded.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single named tunable with its valid range.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub value: f32,
    pub min: f32,
    pub max: f32,
}

impl Parameter {
    /// A parameter with min == max accepts any value.
    pub fn is_unconstrained(&self) -> bool {
        self.min == self.max
    }
}

/// Ordered, UI-facing snapshot of a collection. Mutating the snapshot does
/// not affect the registry it came from.
pub type ParameterList = Vec<Parameter>;

/// Registry mapping parameter names to their current value and range.
#[derive(Clone, Debug, Default)]
pub struct ParameterCollection {
    parameters: BTreeMap<String, Parameter>,
}

impl ParameterCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a parameter. Re-registering an existing name overwrites it.
    pub fn add_parameter(&mut self, name: &str, min: f32, max: f32, value: f32) {
        self.parameters.insert(
            name.to_string(),
            Parameter {
                name: name.to_string(),
                value,
                min,
                max,
            },
        );
    }

    /// Set a parameter value. Returns false (and leaves the stored value
    /// unchanged) when the name is unknown or the value falls outside the
    /// open interval (min, max) of a constrained parameter.
    pub fn set_param(&mut self, name: &str, value: f32) -> bool {
        if let Some(p) = self.parameters.get_mut(name) {
            if (value > p.min && value < p.max) || p.is_unconstrained() {
                p.value = value;
                return true;
            }
        }
        false
    }

    /// Current value of a parameter, or 0.0 for unknown names. Callers must
    /// not rely on errors for missing keys; the zero sentinel is the contract.
    pub fn get_param(&self, name: &str) -> f32 {
        self.parameters.get(name).map(|p| p.value).unwrap_or(0.0)
    }

    /// Snapshot of all parameters in registration-key order.
    pub fn get_params(&self) -> ParameterList {
        self.parameters.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_param_rejects_out_of_range() {
        let mut params = ParameterCollection::new();
        params.add_parameter("x", 0.0, 1.0, 0.25);

        assert!(!params.set_param("x", -0.1));
        assert_eq!(params.get_param("x"), 0.25);

        assert!(!params.set_param("x", 1.1));
        assert_eq!(params.get_param("x"), 0.25);

        assert!(params.set_param("x", 0.5));
        assert_eq!(params.get_param("x"), 0.5);
    }

    #[test]
    fn test_unconstrained_parameter_accepts_anything() {
        let mut params = ParameterCollection::new();
        params.add_parameter("iterations", 1.0, 1.0, 1000.0);

        assert!(params.set_param("iterations", 50_000.0));
        assert_eq!(params.get_param("iterations"), 50_000.0);
        assert!(params.set_param("iterations", -3.0));
    }

    #[test]
    fn test_unknown_name_fails_silently() {
        let mut params = ParameterCollection::new();
        assert!(!params.set_param("missing", 0.5));
        assert_eq!(params.get_param("missing"), 0.0);
    }

    #[test]
    fn test_duplicate_registration_overwrites() {
        let mut params = ParameterCollection::new();
        params.add_parameter("rainfall", 0.0, 15.0, 10.0);
        params.add_parameter("rainfall", 0.0, 5.0, 2.0);

        assert_eq!(params.len(), 1);
        assert_eq!(params.get_param("rainfall"), 2.0);
        assert!(!params.set_param("rainfall", 10.0));
    }

    #[test]
    fn test_snapshot_is_detached() {
        let mut params = ParameterCollection::new();
        params.add_parameter("a", 0.0, 1.0, 0.5);

        let mut list = params.get_params();
        list[0].value = 0.9;

        assert_eq!(params.get_param("a"), 0.5);
    }
}
