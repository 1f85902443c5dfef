//! Style database: stylesheets in, resolved property values per scope out.
//!
//! Every recompute pass rebuilds the declaration store from all ingested
//! stylesheets in cascade order, then resolves each scope's visible
//! properties for both link states. Scopes are independent at that point, so
//! they are resolved in parallel against the shared, read-only store.

use crate::cascade::{CascadedDecl, sort_in_cascade_order};
use crate::selectors::parse_selector_list;
use crate::style_model::{ComputedValues, PropertyValue};
use crate::types::{Declaration, Origin, Stylesheet};
use anyhow::{Context as _, Result};
use css_syntax::parse_declaration_list;
use css_variables::{
    DeclarationStore, ExpansionLimits, ResolutionContext, Resolver, ScopeId, StyleSet,
};
use log::{debug, info, warn};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use url::Url;

/// Scope every other scope descends from unless nested explicitly.
pub const ROOT_SCOPE: &str = ":root";

/// Declarations of a style attribute.
#[derive(Clone, Debug)]
struct InlineStyle {
    scope_key: String,
    declarations: Vec<Declaration>,
}

/// Scope ids handed out while building a store.
#[derive(Debug, Default)]
struct ScopeLayout {
    ids: HashMap<String, ScopeId>,
    /// (key, id) in creation order.
    order: Vec<(String, ScopeId)>,
}

impl ScopeLayout {
    fn insert(
        &mut self,
        store: &mut DeclarationStore,
        key: &str,
        parent: Option<ScopeId>,
    ) -> ScopeId {
        let id = store.add_scope(key, parent);
        self.ids.insert(key.to_owned(), id);
        self.order.push((key.to_owned(), id));
        id
    }
}

/// Custom property resolution over a set of stylesheets.
pub struct StyleDatabase {
    /// Base for stylesheet URLs and for values written in the document itself.
    document_url: Arc<Url>,
    limits: ExpansionLimits,
    sheets: Vec<Stylesheet>,
    inline_styles: Vec<InlineStyle>,
    /// Explicit child -> parent scope nesting.
    parents: HashMap<String, String>,
    computed: HashMap<String, ComputedValues>,
    /// Inputs changed since the last recompute.
    dirty: bool,
}

impl StyleDatabase {
    /// Create a database for the document at `document_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if `document_url` is not an absolute URL.
    pub fn new(document_url: &str) -> Result<Self> {
        Self::with_limits(document_url, ExpansionLimits::default())
    }

    /// Create a database whose resolutions use `limits`.
    ///
    /// # Errors
    ///
    /// Returns an error if `document_url` is not an absolute URL.
    pub fn with_limits(document_url: &str, limits: ExpansionLimits) -> Result<Self> {
        let url = Url::parse(document_url)
            .with_context(|| format!("Invalid document URL {document_url:?}"))?;
        Ok(Self {
            document_url: Arc::new(url),
            limits,
            sheets: Vec::new(),
            inline_styles: Vec::new(),
            parents: HashMap::new(),
            computed: HashMap::new(),
            dirty: true,
        })
    }

    #[inline]
    pub fn document_url(&self) -> &Url {
        &self.document_url
    }

    /// Add a stylesheet fetched from `href`, relative to the document URL.
    /// Relative `url()` references in the sheet resolve against the sheet.
    ///
    /// # Errors
    ///
    /// Returns an error if `href` cannot be resolved against the document URL.
    pub fn add_stylesheet(&mut self, href: &str, css: &str, origin: Origin) -> Result<()> {
        let url = self
            .document_url
            .join(href)
            .with_context(|| format!("Cannot resolve stylesheet URL {href:?}"))?;
        debug!("StyleDatabase: adding {origin:?} stylesheet {url}");
        self.sheets.push(Stylesheet::parse(css, &Arc::new(url), origin));
        self.dirty = true;
        Ok(())
    }

    /// Add a `<style>` element's contents; its `url()` references resolve
    /// against the document.
    pub fn add_document_style(&mut self, css: &str) {
        self.sheets
            .push(Stylesheet::parse(css, &self.document_url, Origin::Author));
        self.dirty = true;
    }

    /// Add a style attribute's declarations to `scope_key`.
    pub fn add_inline_style(&mut self, scope_key: &str, css: &str) {
        let declarations = parse_declaration_list(css)
            .into_iter()
            .map(|decl| Declaration {
                name: decl.name,
                value: decl.value,
                important: decl.important,
            })
            .collect();
        self.inline_styles.push(InlineStyle {
            scope_key: scope_key.to_owned(),
            declarations,
        });
        self.dirty = true;
    }

    /// Make `child` inherit custom properties from `parent` instead of `:root`.
    pub fn nest_scope(&mut self, child: &str, parent: &str) {
        self.parents.insert(child.to_owned(), parent.to_owned());
        self.dirty = true;
    }

    /// Resolved values of a scope as of the last recompute.
    #[inline]
    pub fn computed(&self, scope_key: &str) -> Option<&ComputedValues> {
        self.computed.get(scope_key)
    }

    /// Resolved values of every scope as of the last recompute.
    #[inline]
    pub fn computed_snapshot(&self) -> &HashMap<String, ComputedValues> {
        &self.computed
    }

    /// Recompute all scopes if any input changed. Returns whether any computed
    /// value changed.
    pub fn recompute(&mut self) -> bool {
        if !self.dirty {
            return false;
        }
        let (store, layout) = self.build_store();
        info!(
            "StyleDatabase: recomputing {} scopes from {} stylesheets",
            layout.order.len(),
            self.sheets.len()
        );
        let resolver = Resolver::with_limits(&store, self.limits);
        let document_url = &self.document_url;
        let computed: HashMap<String, ComputedValues> = layout
            .order
            .par_iter()
            .map(|(key, scope)| {
                let for_target = |target| {
                    compute_style_set(&resolver, &store, *scope, target, document_url)
                };
                let values = ComputedValues {
                    non_visited: for_target(StyleSet::NonVisited),
                    visited: for_target(StyleSet::Visited),
                };
                (key.clone(), values)
            })
            .collect();
        let invalid = computed
            .values()
            .flat_map(|values| values.non_visited.values().chain(values.visited.values()))
            .filter(|value| value.error().is_some())
            .count();
        info!("StyleDatabase: {invalid} values invalid at computed-value time");
        let changed = computed != self.computed;
        self.computed = computed;
        self.dirty = false;
        changed
    }

    /// Collect every declaration with its cascade position.
    fn cascaded_declarations(&self) -> Vec<CascadedDecl> {
        let mut decls = Vec::new();
        let mut source_order = 0u32;
        for sheet in &self.sheets {
            for rule in &sheet.rules {
                let selectors = parse_selector_list(&rule.prelude);
                for decl in &rule.declarations {
                    for selector in &selectors {
                        decls.push(CascadedDecl {
                            scope_key: selector.key().to_owned(),
                            style_set: selector.style_set(),
                            name: decl.name.clone(),
                            value: decl.value.clone(),
                            important: decl.important,
                            origin: rule.origin,
                            inline: false,
                            source_order,
                            base_url: Arc::clone(&sheet.url),
                        });
                    }
                    source_order = source_order.saturating_add(1);
                }
            }
        }
        for style in &self.inline_styles {
            for decl in &style.declarations {
                decls.push(CascadedDecl {
                    scope_key: style.scope_key.clone(),
                    style_set: StyleSet::Both,
                    name: decl.name.clone(),
                    value: decl.value.clone(),
                    important: decl.important,
                    origin: Origin::Author,
                    inline: true,
                    source_order,
                    base_url: Arc::clone(&self.document_url),
                });
                source_order = source_order.saturating_add(1);
            }
        }
        decls
    }

    /// Build the declaration store: scopes first, then declarations in
    /// cascade order so that winners are inserted last.
    fn build_store(&self) -> (DeclarationStore, ScopeLayout) {
        let mut store = DeclarationStore::new();
        let mut layout = ScopeLayout::default();
        layout.insert(&mut store, ROOT_SCOPE, None);

        let mut decls = self.cascaded_declarations();
        for decl in &decls {
            self.scope_for(&decl.scope_key, &mut layout, &mut store);
        }
        let mut nested: Vec<&String> = self.parents.keys().collect();
        nested.sort();
        for key in nested {
            self.scope_for(key, &mut layout, &mut store);
        }

        sort_in_cascade_order(&mut decls);
        let mut dropped = 0usize;
        for decl in &decls {
            let Some(scope) = layout.ids.get(&decl.scope_key).copied() else {
                continue;
            };
            if store
                .declare(scope, &decl.name, &decl.value, &decl.base_url, decl.style_set)
                .is_err()
            {
                dropped += 1;
            }
        }
        if dropped > 0 {
            info!("StyleDatabase: dropped {dropped} declarations with invalid values");
        }
        (store, layout)
    }

    /// Scope id for `key`, creating it and any missing ancestors.
    fn scope_for(
        &self,
        key: &str,
        layout: &mut ScopeLayout,
        store: &mut DeclarationStore,
    ) -> ScopeId {
        if let Some(id) = layout.ids.get(key) {
            return *id;
        }
        let mut lineage = vec![key.to_owned()];
        let mut parent = layout.ids.get(ROOT_SCOPE).copied();
        while let Some(last) = lineage.last() {
            let next = self
                .parents
                .get(last)
                .map_or(ROOT_SCOPE, String::as_str);
            if let Some(id) = layout.ids.get(next) {
                parent = Some(*id);
                break;
            }
            if lineage.iter().any(|seen| seen == next) {
                warn!(
                    "StyleDatabase: scope nesting cycle through {next:?}; attaching to {ROOT_SCOPE}"
                );
                break;
            }
            lineage.push(next.to_owned());
        }
        let mut created = parent;
        for ancestor in lineage.iter().rev() {
            created = Some(layout.insert(store, ancestor, created));
        }
        created.unwrap_or_else(|| layout.insert(store, key, None))
    }
}

/// Resolve every property visible from `scope` for one link state. Properties
/// with no declaration for that state are left out.
fn compute_style_set(
    resolver: &Resolver<'_>,
    store: &DeclarationStore,
    scope: ScopeId,
    target: StyleSet,
    document_url: &Arc<Url>,
) -> BTreeMap<String, PropertyValue> {
    store
        .visible_names(scope)
        .into_iter()
        .filter(|name| store.get_declared_value(scope, name, target).is_some())
        .map(|name| {
            let context = ResolutionContext::new(scope, target, document_url);
            let value = match resolver.resolve(context, name) {
                Ok(resolved) => PropertyValue::Resolved(resolved),
                Err(err) => PropertyValue::Invalid(err),
            };
            (name.to_owned(), value)
        })
        .collect()
}
