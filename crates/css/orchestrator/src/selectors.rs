//! Mapping of rule preludes onto resolution scopes.
//!
//! Selector matching is out of scope here: a selector names its scope
//! verbatim, minus the link-state pseudo-classes, which decide the style set
//! its declarations apply to.
//! Spec: <https://www.w3.org/TR/selectors-4/#link>

use css_variables::StyleSet;
use log::debug;

/// The scope and style set one selector of a rule prelude contributes to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScopeSelector {
    /// Selector text without `:link`/`:visited`.
    key: String,
    /// Link state the rule applies to.
    style_set: StyleSet,
}

impl ScopeSelector {
    /// Scope key the declarations are stored under.
    #[inline]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Style set the declarations apply to.
    #[inline]
    pub const fn style_set(&self) -> StyleSet {
        self.style_set
    }
}

/// Split a selector list on top-level commas.
fn split_selector_list(prelude: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (index, character) in prelude.char_indices() {
        match character {
            '(' | '[' => depth += 1,
            ')' | ']' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.extend(prelude.get(start..index));
                start = index + 1;
            }
            _ => {}
        }
    }
    parts.extend(prelude.get(start..));
    parts
}

/// Remove every ASCII case-insensitive occurrence of `pseudo` from `selector`
/// that applies to the selector itself, returning whether any was found.
/// Occurrences inside functional pseudo-classes such as `:not()` and longer
/// names that merely start with `pseudo` are left alone.
fn strip_pseudo(selector: &mut String, pseudo: &str) -> bool {
    let mut found = Vec::new();
    let mut depth = 0usize;
    for (index, character) in selector.char_indices() {
        match character {
            '(' | '[' => depth += 1,
            ')' | ']' => depth = depth.saturating_sub(1),
            ':' if depth == 0 => {
                let end = index + pseudo.len();
                let named = selector
                    .get(index..end)
                    .is_some_and(|candidate| candidate.eq_ignore_ascii_case(pseudo));
                let whole = selector
                    .get(end..)
                    .and_then(|rest| rest.chars().next())
                    .is_none_or(|next| !is_name_char(next));
                if named && whole {
                    found.push(index..end);
                }
            }
            _ => {}
        }
    }
    for range in found.iter().rev() {
        selector.replace_range(range.clone(), "");
    }
    !found.is_empty()
}

fn is_name_char(character: char) -> bool {
    character.is_ascii_alphanumeric() || matches!(character, '-' | '_') || !character.is_ascii()
}

/// Classify one complex selector. Returns `None` for selectors that can never
/// match (both `:link` and `:visited`).
fn classify(selector: &str) -> Option<ScopeSelector> {
    let mut key = selector.trim().to_owned();
    let visited = strip_pseudo(&mut key, ":visited");
    let link = strip_pseudo(&mut key, ":link");
    let style_set = match (visited, link) {
        (true, true) => {
            debug!("Selector {selector:?} matches no link state; ignoring");
            return None;
        }
        (true, false) => StyleSet::Visited,
        (false, true) => StyleSet::NonVisited,
        (false, false) => StyleSet::Both,
    };
    let trimmed = key.trim();
    let key = if trimmed.is_empty() {
        "*".to_owned()
    } else {
        trimmed.split_whitespace().collect::<Vec<_>>().join(" ")
    };
    Some(ScopeSelector { key, style_set })
}

/// Scope selectors for every selector in a rule prelude.
pub fn parse_selector_list(prelude: &str) -> Vec<ScopeSelector> {
    split_selector_list(prelude)
        .into_iter()
        .filter(|selector| !selector.trim().is_empty())
        .filter_map(classify)
        .collect()
}
