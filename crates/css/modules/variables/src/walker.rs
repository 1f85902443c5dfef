//! Recursive `var()` substitution.
//! Spec: <https://www.w3.org/TR/css-variables-1/#substitute-a-var>

use crate::ambient::{AmbientState, ResolutionContext, ScopedContext};
use crate::declarations::{DeclarationStore, DeclaredValue, ScopeId};
use crate::errors::VarError;
use crate::guard::{ExpansionBudget, ExpansionLimits};
use crate::tokens::{Component, CssWideKeyword, PendingValue, Reference};
use crate::urls::write_resolved_url;
use core::ops::{Deref, DerefMut};
use cssparser::TokenSerializationType;
use log::{debug, trace, warn};

/// Empty comment written between substituted tokens that would otherwise
/// merge into one token.
const TOKEN_SEPARATOR: &str = "/**/";

/// A fully substituted value: no `var()` left, every `url()` absolute.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedValue {
    css: String,
    substitutions: usize,
}

impl ResolvedValue {
    /// Substituted CSS text.
    #[inline]
    pub fn css(&self) -> &str {
        &self.css
    }

    /// Consume into the substituted CSS text.
    #[inline]
    pub fn into_css(self) -> String {
        self.css
    }

    /// Number of `var()` substitutions the resolution performed.
    #[inline]
    pub const fn substitutions(&self) -> usize {
        self.substitutions
    }

    /// The CSS-wide keyword the value consists of, if any. The consuming
    /// property applies it as its own cascade defaulting.
    #[inline]
    pub fn css_wide_keyword(&self) -> Option<CssWideKeyword> {
        CssWideKeyword::from_value(&self.css)
    }
}

/// Text produced by one expansion frame, with the serialization types of its
/// first and last tokens.
#[derive(Debug, Default)]
struct Substituted {
    css: String,
    first_token_type: TokenSerializationType,
    last_token_type: TokenSerializationType,
}

impl Substituted {
    /// Append `css`, separating it from the text before it where the two
    /// edge tokens would otherwise run together.
    /// Spec: <https://www.w3.org/TR/css-variables-1/#substitute-a-var>
    fn push(
        &mut self,
        css: &str,
        first: TokenSerializationType,
        last: TokenSerializationType,
        budget: &ExpansionBudget,
    ) -> Result<(), VarError> {
        if css.is_empty() {
            return Ok(());
        }
        let separate = self.last_token_type.needs_separator_when_before(first);
        let separator = if separate { TOKEN_SEPARATOR } else { "" };
        budget.fits(self.css.len() + separator.len() + css.len())?;
        self.first_token_type.set_if_nothing(first);
        self.css.push_str(separator);
        self.css.push_str(css);
        self.last_token_type = last;
        Ok(())
    }

    fn append(&mut self, other: &Self, budget: &ExpansionBudget) -> Result<(), VarError> {
        self.push(
            &other.css,
            other.first_token_type,
            other.last_token_type,
            budget,
        )
    }
}

/// Entry point for resolving values out of a [`DeclarationStore`].
///
/// The resolver itself holds no per-request state and can be shared between
/// threads; every request gets its own [`Resolution`].
#[derive(Clone, Copy, Debug)]
pub struct Resolver<'store> {
    store: &'store DeclarationStore,
    limits: ExpansionLimits,
}

impl<'store> Resolver<'store> {
    /// Resolver with the default substitution ceiling.
    #[inline]
    pub fn new(store: &'store DeclarationStore) -> Self {
        Self::with_limits(store, ExpansionLimits::default())
    }

    /// Resolver with a custom substitution ceiling.
    #[inline]
    pub const fn with_limits(store: &'store DeclarationStore, limits: ExpansionLimits) -> Self {
        Self { store, limits }
    }

    /// Fresh per-request state starting from `context`.
    #[inline]
    pub fn resolution(&self, context: ResolutionContext) -> Resolution<'store> {
        Resolution {
            store: self.store,
            budget: ExpansionBudget::new(self.limits),
            expanding: Vec::new(),
            cycle_closed_in: None,
            context,
        }
    }

    /// Resolve the declared value of `name` visible from the context's scope.
    ///
    /// # Errors
    /// Any [`VarError`] makes the whole value invalid at computed-value time.
    #[inline]
    pub fn resolve(
        &self,
        context: ResolutionContext,
        name: &str,
    ) -> Result<ResolvedValue, VarError> {
        self.resolution(context).resolve(name)
    }

    /// Resolve a value that is not held in the store, such as an inline style.
    ///
    /// # Errors
    /// Any [`VarError`] makes the whole value invalid at computed-value time.
    #[inline]
    pub fn resolve_value(
        &self,
        context: ResolutionContext,
        value: &PendingValue,
    ) -> Result<ResolvedValue, VarError> {
        self.resolution(context).resolve_value(value)
    }
}

/// State of one top-level resolution: the substitution budget, the custom
/// properties currently being expanded, and the ambient context.
#[derive(Debug)]
pub struct Resolution<'store> {
    store: &'store DeclarationStore,
    budget: ExpansionBudget,
    /// (scope, name) of every declaration whose expansion is in progress, outermost first.
    expanding: Vec<(ScopeId, String)>,
    /// Scope of the declaration whose re-entry raised the latest
    /// `CycleDetected`.
    cycle_closed_in: Option<ScopeId>,
    context: ResolutionContext,
}

impl AmbientState for Resolution<'_> {
    #[inline]
    fn context_mut(&mut self) -> &mut ResolutionContext {
        &mut self.context
    }
}

impl<'store> Resolution<'store> {
    /// The ambient context. Outside of a resolution call this is the context
    /// the resolution was started with.
    #[inline]
    pub const fn context(&self) -> &ResolutionContext {
        &self.context
    }

    /// Substitutions charged by the latest request.
    #[inline]
    pub const fn substitutions(&self) -> usize {
        self.budget.used()
    }

    /// Resolve the declared value of `name`. Starts a new budget.
    ///
    /// # Errors
    /// `UnresolvedReference` when `name` has no visible declaration, otherwise
    /// whatever made the expansion invalid.
    pub fn resolve(&mut self, name: &str) -> Result<ResolvedValue, VarError> {
        self.budget.reset();
        self.cycle_closed_in = None;
        let store = self.store;
        let found = store
            .get_declared_value(self.context.scope(), name, self.context.target())
            .ok_or_else(|| VarError::UnresolvedReference {
                name: name.to_owned(),
            })?;
        let expanded = self
            .expand_declaration(name, found)
            .inspect_err(|err| debug!("{name} is invalid at computed-value time: {err}"))?;
        Ok(ResolvedValue {
            css: expanded.css.trim().to_owned(),
            substitutions: self.budget.used(),
        })
    }

    /// Resolve `value` in the current context, with `value`'s own base URL.
    /// Starts a new budget.
    ///
    /// # Errors
    /// Whatever made the expansion invalid.
    pub fn resolve_value(&mut self, value: &PendingValue) -> Result<ResolvedValue, VarError> {
        self.budget.reset();
        self.cycle_closed_in = None;
        let context = self.context.with_base_url(value.base_url());
        let mut frame = ScopedContext::enter(self, context);
        let mut expanded = Substituted::default();
        frame.expand_into(value.components(), &mut expanded)?;
        Ok(ResolvedValue {
            css: expanded.css.trim().to_owned(),
            substitutions: frame.budget.used(),
        })
    }

    fn is_expanding(&self, scope: ScopeId, name: &str) -> bool {
        self.expanding
            .iter()
            .any(|(expanding_scope, expanding_name)| {
                *expanding_scope == scope && expanding_name == name
            })
    }

    /// Whether a reference's fallback may stand in after `err`.
    ///
    /// Running out of budget, depth or length never recovers. A cycle error
    /// only recovers once it has left every member of the cycle, i.e. when
    /// the declaration that closed it is no longer being expanded.
    fn fallback_may_recover(&self, err: &VarError) -> bool {
        match err {
            VarError::BudgetExceeded { .. }
            | VarError::NestingTooDeep { .. }
            | VarError::ValueTooLarge { .. } => false,
            VarError::CycleDetected { name } => self
                .cycle_closed_in
                .is_none_or(|scope| !self.is_expanding(scope, name)),
            VarError::UnresolvedReference { .. }
            | VarError::MalformedFallback { .. }
            | VarError::InvalidName { .. }
            | VarError::InvalidSyntax
            | VarError::UnknownScope => true,
        }
    }

    /// Expand the value of a found declaration in its own scope, style set
    /// and base URL.
    fn expand_declaration(
        &mut self,
        name: &str,
        found: DeclaredValue<'store>,
    ) -> Result<Substituted, VarError> {
        self.budget
            .enter(self.expanding.len())
            .inspect_err(|err| warn!("Abandoning value at {name}: {err}"))?;
        let declaration = found.declaration();
        let context = self.context.for_declaration(
            found.scope(),
            declaration.style_set(),
            declaration.value().base_url(),
        );
        let mut frame = ScopedContext::enter(self, context);
        let mut marked = Expanding::mark(&mut frame, found.scope(), name);
        let mut expanded = Substituted::default();
        marked.expand_into(declaration.value().components(), &mut expanded)?;
        Ok(expanded)
    }

    fn expand_into(
        &mut self,
        components: &[Component],
        out: &mut Substituted,
    ) -> Result<(), VarError> {
        for component in components {
            match component {
                Component::Verbatim(text) => out.push(
                    text.css(),
                    text.first_token_type(),
                    text.last_token_type(),
                    &self.budget,
                )?,
                Component::Url(raw) => {
                    let mut url = String::new();
                    write_resolved_url(self.context.base_url(), raw, &mut url);
                    out.push(
                        &url,
                        TokenSerializationType::Function,
                        TokenSerializationType::Other,
                        &self.budget,
                    )?;
                }
                Component::Reference(reference) => self.expand_reference(reference, out)?,
            }
        }
        Ok(())
    }

    fn expand_reference(
        &mut self,
        reference: &Reference,
        out: &mut Substituted,
    ) -> Result<(), VarError> {
        let name = reference.name();
        self.budget
            .charge()
            .inspect_err(|err| warn!("Abandoning value at var({name}): {err}"))?;
        trace!(
            "var({name}) in scope {:?} for {:?}",
            self.context.scope(),
            self.context.target()
        );
        let store = self.store;
        let outcome = match store.get_declared_value(
            self.context.scope(),
            name,
            self.context.target(),
        ) {
            None => Err(VarError::UnresolvedReference {
                name: name.to_owned(),
            }),
            Some(found) if self.is_expanding(found.scope(), name) => {
                self.cycle_closed_in = Some(found.scope());
                Err(VarError::CycleDetected {
                    name: name.to_owned(),
                })
            }
            Some(found) => self.expand_declaration(name, found),
        };
        let err = match outcome {
            Ok(expanded) => return out.append(&expanded, &self.budget),
            Err(err) => err,
        };
        if !self.fallback_may_recover(&err) {
            return Err(err);
        }
        let Some(fallback) = reference.fallback() else {
            return Err(err);
        };
        debug!("var({name}) falls back: {err}");
        let mut expanded = Substituted::default();
        self.expand_into(fallback, &mut expanded)?;
        out.append(&expanded, &self.budget)
    }
}

/// Marks one custom property as being expanded until dropped.
struct Expanding<'frame, 'store> {
    resolution: &'frame mut Resolution<'store>,
    depth: usize,
}

impl<'frame, 'store> Expanding<'frame, 'store> {
    fn mark(resolution: &'frame mut Resolution<'store>, scope: ScopeId, name: &str) -> Self {
        let depth = resolution.expanding.len();
        resolution.expanding.push((scope, name.to_owned()));
        Self { resolution, depth }
    }
}

impl<'store> Deref for Expanding<'_, 'store> {
    type Target = Resolution<'store>;

    fn deref(&self) -> &Resolution<'store> {
        self.resolution
    }
}

impl<'store> DerefMut for Expanding<'_, 'store> {
    fn deref_mut(&mut self) -> &mut Resolution<'store> {
        self.resolution
    }
}

impl Drop for Expanding<'_, '_> {
    fn drop(&mut self) {
        self.resolution.expanding.truncate(self.depth);
    }
}
