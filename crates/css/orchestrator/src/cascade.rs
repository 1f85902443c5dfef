//! Cascade ordering of declarations collected from all stylesheets.
//! Spec: <https://www.w3.org/TR/css-cascade-4/#cascade-sort>

use crate::types::Origin;
use css_variables::StyleSet;
use std::sync::Arc;
use url::Url;

/// A declaration tagged with everything the cascade sorts on.
#[derive(Clone, Debug)]
pub struct CascadedDecl {
    pub scope_key: String,
    pub style_set: StyleSet,
    pub name: String,
    pub value: String,
    pub important: bool,
    pub origin: Origin,
    /// Declared in a style attribute.
    pub inline: bool,
    /// Position across all stylesheets in insertion order.
    pub source_order: u32,
    /// URL of the stylesheet the declaration was written in.
    pub base_url: Arc<Url>,
}

/// Weight of an origin among normal declarations.
#[inline]
const fn origin_weight(origin: Origin) -> u8 {
    match origin {
        Origin::UserAgent => 0,
        Origin::User => 1,
        Origin::Author => 2,
    }
}

/// Sort key: larger wins. Important declarations beat normal ones and
/// reverse the origin order; style attributes beat rules of the same origin.
#[inline]
const fn precedence(decl: &CascadedDecl) -> (bool, u8, bool, u32) {
    let weight = origin_weight(decl.origin);
    let weight = if decl.important { 2 - weight } else { weight };
    (decl.important, weight, decl.inline, decl.source_order)
}

/// Sort declarations so that the winner of every (scope, name, style set)
/// comes last.
#[inline]
pub fn sort_in_cascade_order(decls: &mut [CascadedDecl]) {
    decls.sort_by_key(precedence);
}
