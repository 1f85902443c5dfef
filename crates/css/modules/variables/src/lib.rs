//! CSS Custom Properties for Cascading Variables Module Level 1 — CSS variables.
//! Spec: <https://www.w3.org/TR/css-variables-1/>
//!
//! Resolves `var()` references in declared values:
//! - [`DeclarationStore`] holds the cascade-selected declarations per scope,
//!   each with the base URL of its stylesheet and the style set it applies to.
//! - [`Resolver`] substitutes references recursively, applying fallbacks,
//!   rejecting cycles and charging every substitution against an
//!   [`ExpansionBudget`].
//! - [`ResolutionContext`] carries the resolved style set, lookup scope and
//!   base URL through nested expansions; each nesting level restores it on exit.
//!
//! An `Err` from resolution means the property is invalid at computed-value
//! time. What to use instead (inherited or initial value) is up to the caller.

#![forbid(unsafe_code)]

pub mod ambient;
pub mod declarations;
pub mod errors;
pub mod guard;
pub mod tokens;
mod urls;
pub mod walker;

pub use css_syntax::is_custom_property_name;

pub use ambient::{AmbientState, ResolutionContext, ScopedContext, StyleSet};
pub use declarations::{CustomPropertyDeclaration, DeclarationStore, DeclaredValue, ScopeId};
pub use errors::VarError;
pub use guard::{
    ExpansionBudget, ExpansionLimits, MAX_NESTING_DEPTH, MAX_SUBSTITUTIONS, MAX_VALUE_BYTES,
};
pub use tokens::{Component, CssWideKeyword, PendingValue, Reference, Verbatim};
pub use walker::{Resolution, ResolvedValue, Resolver};

#[cfg(test)]
mod tests {
    use super::*;
    use core::error::Error;
    use cssparser::TokenSerializationType;
    use std::sync::Arc;
    use url::Url;

    /// Components as text: verbatim runs as written, references as
    /// `var(name)`, urls as `url:<raw>`.
    fn summary(components: &[Component]) -> Vec<String> {
        components
            .iter()
            .map(|component| match component {
                Component::Verbatim(text) => text.css().to_owned(),
                Component::Reference(reference) => format!("var({})", reference.name()),
                Component::Url(raw) => format!("url:{raw}"),
            })
            .collect()
    }

    #[test]
    fn parses_nested_references() -> Result<(), Box<dyn Error>> {
        let base = Arc::new(Url::parse("https://example.com/a.css")?);
        let value = PendingValue::parse("calc(var(--a) + var(--b, var(--c)))", &base)?;
        assert!(value.has_references());
        assert_eq!(value.referenced_names(), vec!["--a", "--b", "--c"]);
        let plain = PendingValue::parse("1px solid red", &base)?;
        assert!(!plain.has_references());
        assert_eq!(summary(plain.components()), vec!["1px solid red"]);
        Ok(())
    }

    #[test]
    fn rejects_malformed_values() -> Result<(), Box<dyn Error>> {
        let base = Arc::new(Url::parse("https://example.com/a.css")?);
        let cases = [
            ("var(--a, ))", VarError::InvalidSyntax),
            ("var(a)", VarError::InvalidName { name: "a".to_owned() }),
            ("var(--a b)", VarError::InvalidSyntax),
            ("red !important", VarError::InvalidSyntax),
            ("a; b", VarError::InvalidSyntax),
            (
                "var(--a, 1px ! 2px)",
                VarError::MalformedFallback {
                    name: "--a".to_owned(),
                },
            ),
            (
                "var(--a, var(b))",
                VarError::MalformedFallback {
                    name: "--a".to_owned(),
                },
            ),
        ];
        for (css, expected) in cases {
            assert_eq!(PendingValue::parse(css, &base).err(), Some(expected), "{css}");
        }
        Ok(())
    }

    #[test]
    fn keeps_block_contents_and_url_forms() -> Result<(), Box<dyn Error>> {
        let base = Arc::new(Url::parse("https://example.com/a.css")?);
        let value = PendingValue::parse("{ a; b } url(x.png) URL(\"y.png\") url(\"z\" a)", &base)?;
        assert_eq!(
            summary(value.components()),
            vec!["{ a; b } ", "url:x.png", " ", "url:y.png", " url(\"z\" a)"]
        );
        Ok(())
    }

    #[test]
    fn verbatim_runs_know_their_edge_tokens() -> Result<(), Box<dyn Error>> {
        let base = Arc::new(Url::parse("https://example.com/a.css")?);
        let value = PendingValue::parse("calc(1px + var(--a, 2 )) px", &base)?;
        let runs: Vec<(TokenSerializationType, TokenSerializationType)> = value
            .components()
            .iter()
            .filter_map(|component| match component {
                Component::Verbatim(text) => {
                    Some((text.first_token_type(), text.last_token_type()))
                }
                Component::Reference(_) | Component::Url(_) => None,
            })
            .collect();
        assert_eq!(
            runs,
            vec![
                (TokenSerializationType::Function, TokenSerializationType::WhiteSpace),
                (TokenSerializationType::Other, TokenSerializationType::Ident),
            ]
        );
        let fallback = value
            .components()
            .get(1)
            .and_then(|component| match component {
                Component::Reference(reference) => reference.fallback(),
                Component::Verbatim(_) | Component::Url(_) => None,
            })
            .ok_or("reference with fallback")?;
        assert_eq!(summary(fallback), vec!["2"]);
        Ok(())
    }

    #[test]
    fn empty_and_keyword_fallbacks_parse() -> Result<(), Box<dyn Error>> {
        let base = Arc::new(Url::parse("https://example.com/a.css")?);
        let value = PendingValue::parse("var(--a,) var(--b, revert )", &base)?;
        let references: Vec<&Reference> = value
            .components()
            .iter()
            .filter_map(|component| match component {
                Component::Reference(reference) => Some(reference),
                Component::Verbatim(_) | Component::Url(_) => None,
            })
            .collect();
        assert_eq!(references.len(), 2);
        assert_eq!(references.first().and_then(|first| first.fallback()), Some(&[][..]));
        assert_eq!(
            references
                .get(1)
                .and_then(|second| second.fallback())
                .map(summary),
            Some(vec!["revert".to_owned()])
        );
        Ok(())
    }
}
