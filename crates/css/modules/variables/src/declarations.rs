//! Raw declarations per cascade scope.
//!
//! The cascade itself happens outside this crate: callers insert the
//! declarations of a scope in cascade order, so the last declaration of a name
//! that applies to the resolved style set wins.

use crate::ambient::StyleSet;
use crate::errors::VarError;
use crate::tokens::PendingValue;
use css_syntax::is_custom_property_name;
use log::warn;
use std::collections::HashMap;
use std::sync::Arc;
use url::Url;

/// Handle of a scope owned by a [`DeclarationStore`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(usize);

impl ScopeId {
    #[inline]
    pub(crate) const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Position of the scope in creation order.
    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// A declaration as selected by the cascade. Immutable once stored.
#[derive(Clone, Debug)]
pub struct CustomPropertyDeclaration {
    name: String,
    value: PendingValue,
    style_set: StyleSet,
}

impl CustomPropertyDeclaration {
    /// Property name, case preserved for custom properties.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parsed value with its captured base URL.
    #[inline]
    pub fn value(&self) -> &PendingValue {
        &self.value
    }

    /// Style set the declaring rule applies to.
    #[inline]
    pub const fn style_set(&self) -> StyleSet {
        self.style_set
    }
}

/// A lookup hit: the declaration and the scope that declared it, which may be
/// an ancestor of the scope the lookup started in.
#[derive(Clone, Copy, Debug)]
pub struct DeclaredValue<'store> {
    scope: ScopeId,
    declaration: &'store CustomPropertyDeclaration,
}

impl<'store> DeclaredValue<'store> {
    /// Scope that holds the declaration.
    #[inline]
    pub const fn scope(&self) -> ScopeId {
        self.scope
    }

    /// The winning declaration.
    #[inline]
    pub const fn declaration(&self) -> &'store CustomPropertyDeclaration {
        self.declaration
    }

    /// Shorthand for `declaration().value()`.
    #[inline]
    pub fn value(&self) -> &'store PendingValue {
        &self.declaration.value
    }
}

#[derive(Debug)]
struct ScopeData {
    label: String,
    parent: Option<ScopeId>,
    /// Declarations per name, in cascade order (winner last).
    declarations: HashMap<String, Vec<CustomPropertyDeclaration>>,
    /// Names in first-declared order, for deterministic iteration.
    order: Vec<String>,
}

/// Declarations visible to resolution, grouped by scope.
#[derive(Debug, Default)]
pub struct DeclarationStore {
    scopes: Vec<ScopeData>,
}

impl DeclarationStore {
    /// An empty store.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a scope. Lookups that miss in it continue in `parent`.
    pub fn add_scope(&mut self, label: impl Into<String>, parent: Option<ScopeId>) -> ScopeId {
        let id = ScopeId::new(self.scopes.len());
        let parent = parent.filter(|candidate| candidate.index() < id.index());
        self.scopes.push(ScopeData {
            label: label.into(),
            parent,
            declarations: HashMap::new(),
            order: Vec::new(),
        });
        id
    }

    /// Label given to `scope` at creation.
    #[inline]
    pub fn scope_label(&self, scope: ScopeId) -> Option<&str> {
        self.scopes.get(scope.index()).map(|data| data.label.as_str())
    }

    /// Parent of `scope`, if any.
    #[inline]
    pub fn parent(&self, scope: ScopeId) -> Option<ScopeId> {
        self.scopes.get(scope.index()).and_then(|data| data.parent)
    }

    /// All scopes in creation order.
    pub fn scopes(&self) -> impl Iterator<Item = ScopeId> + '_ {
        (0..self.scopes.len()).map(ScopeId::new)
    }

    /// Parse and store a declaration. Later declarations of the same name win
    /// over earlier ones in the same scope.
    ///
    /// # Errors
    /// Returns the parse error when `css` is not a valid declaration value; the
    /// declaration is dropped in that case. Returns `UnknownScope` when `scope`
    /// was not created by this store.
    pub fn declare(
        &mut self,
        scope: ScopeId,
        name: &str,
        css: &str,
        base_url: &Arc<Url>,
        style_set: StyleSet,
    ) -> Result<(), VarError> {
        let Some(data) = self.scopes.get_mut(scope.index()) else {
            return Err(VarError::UnknownScope);
        };
        let value = PendingValue::parse(css, base_url).inspect_err(|err| {
            warn!("Dropping declaration {name}: {css:?} in {}: {err}", data.label);
        })?;
        let declaration = CustomPropertyDeclaration {
            name: name.to_owned(),
            value,
            style_set,
        };
        match data.declarations.get_mut(name) {
            Some(existing) => existing.push(declaration),
            None => {
                data.order.push(name.to_owned());
                data.declarations.insert(name.to_owned(), vec![declaration]);
            }
        }
        Ok(())
    }

    /// Winning declaration of `name` visible from `scope` while resolving
    /// `target`. Custom properties inherit, so for `--*` names the ancestors
    /// are searched when `scope` has none.
    pub fn get_declared_value(
        &self,
        scope: ScopeId,
        name: &str,
        target: StyleSet,
    ) -> Option<DeclaredValue<'_>> {
        let mut current = Some(scope);
        while let Some(scope_id) = current {
            let data = self.scopes.get(scope_id.index())?;
            let winner = data.declarations.get(name).and_then(|candidates| {
                candidates
                    .iter()
                    .rev()
                    .find(|candidate| candidate.style_set.applies_to(target))
            });
            if let Some(declaration) = winner {
                return Some(DeclaredValue {
                    scope: scope_id,
                    declaration,
                });
            }
            if !is_custom_property_name(name) {
                return None;
            }
            current = data.parent;
        }
        None
    }

    /// Names declared directly in `scope`, in first-declared order.
    pub fn declared_names(&self, scope: ScopeId) -> impl Iterator<Item = &str> + '_ {
        self.scopes
            .get(scope.index())
            .into_iter()
            .flat_map(|data| data.order.iter().map(String::as_str))
    }

    /// Names visible from `scope`: its own, then custom properties inherited
    /// from ancestors that it does not declare itself.
    pub fn visible_names(&self, scope: ScopeId) -> Vec<&str> {
        let mut names: Vec<&str> = self.declared_names(scope).collect();
        let mut ancestor = self.parent(scope);
        while let Some(ancestor_id) = ancestor {
            for name in self.declared_names(ancestor_id) {
                if is_custom_property_name(name) && !names.contains(&name) {
                    names.push(name);
                }
            }
            ancestor = self.parent(ancestor_id);
        }
        names
    }
}
