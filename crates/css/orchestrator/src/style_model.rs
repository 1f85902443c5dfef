//! Computed custom and regular property values per scope.

use css_variables::{ResolvedValue, StyleSet, VarError};
use std::collections::BTreeMap;

/// Outcome of resolving one property.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PropertyValue {
    /// Fully substituted value.
    Resolved(ResolvedValue),
    /// Invalid at computed-value time; the consumer falls back to the
    /// inherited or initial value.
    Invalid(VarError),
}

impl PropertyValue {
    /// Substituted text of a resolved value.
    #[inline]
    pub fn css(&self) -> Option<&str> {
        match self {
            Self::Resolved(value) => Some(value.css()),
            Self::Invalid(_) => None,
        }
    }

    #[inline]
    pub const fn error(&self) -> Option<&VarError> {
        match self {
            Self::Resolved(_) => None,
            Self::Invalid(err) => Some(err),
        }
    }
}

/// Values computed for one scope, once per rendered-link state.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ComputedValues {
    pub non_visited: BTreeMap<String, PropertyValue>,
    pub visited: BTreeMap<String, PropertyValue>,
}

impl ComputedValues {
    /// Values for `style_set`. `Both` reads the non-visited values.
    #[inline]
    pub const fn for_style_set(&self, style_set: StyleSet) -> &BTreeMap<String, PropertyValue> {
        match style_set {
            StyleSet::Visited => &self.visited,
            StyleSet::NonVisited | StyleSet::Both => &self.non_visited,
        }
    }

    #[inline]
    pub fn get(&self, name: &str, style_set: StyleSet) -> Option<&PropertyValue> {
        self.for_style_set(style_set).get(name)
    }
}
