//! Style orchestration around custom property resolution.
//!
//! Ingests stylesheets, maps their rules onto scopes, cascades the
//! declarations into a [`css_variables::DeclarationStore`] and resolves every
//! property of every scope for both rendered-link states.

#![forbid(unsafe_code)]

mod cascade;
pub mod selectors;
mod style_database;
pub mod style_model;
pub mod types;

pub use style_database::{ROOT_SCOPE, StyleDatabase};
pub use style_model::{ComputedValues, PropertyValue};
pub use types::Origin;
