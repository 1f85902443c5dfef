//! Ambient resolution state: which style set is being resolved, which scope
//! lookups start from, and which base URL `url()` tokens resolve against.
//!
//! The state changes on the way into every nested expansion and must be back
//! to the caller's value on the way out, including when the nested expansion
//! fails. Changes go through [`ScopedContext`], which restores the previous
//! context when dropped.

use crate::declarations::ScopeId;
use core::mem;
use core::ops::{Deref, DerefMut};
use std::sync::Arc;
use url::Url;

/// Which rendered-link state a declaration applies to, or which one is being
/// resolved.
/// Spec: <https://www.w3.org/TR/selectors-4/#link>
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StyleSet {
    /// Unvisited links and everything that is not a link.
    NonVisited,
    /// Visited links.
    Visited,
    /// Both sets at once.
    Both,
}

impl StyleSet {
    /// Whether a declaration tagged `self` is visible while resolving `target`.
    #[inline]
    pub const fn applies_to(self, target: Self) -> bool {
        match (self, target) {
            (Self::Both, _)
            | (_, Self::Both)
            | (Self::NonVisited, Self::NonVisited)
            | (Self::Visited, Self::Visited) => true,
            (Self::NonVisited, Self::Visited) | (Self::Visited, Self::NonVisited) => false,
        }
    }

    /// Target used while expanding a declaration tagged `tag` found under `self`.
    /// A set-specific declaration pins its own set for the references it makes.
    #[inline]
    pub const fn narrowed_by(self, tag: Self) -> Self {
        match tag {
            Self::Both => self,
            Self::NonVisited | Self::Visited => tag,
        }
    }
}

/// Resolution context of one expansion frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolutionContext {
    scope: ScopeId,
    target: StyleSet,
    base_url: Arc<Url>,
}

impl ResolutionContext {
    /// Context a consumer starts a top-level resolution with.
    #[inline]
    pub fn new(scope: ScopeId, target: StyleSet, base_url: &Arc<Url>) -> Self {
        Self {
            scope,
            target,
            base_url: Arc::clone(base_url),
        }
    }

    /// Scope in which `var()` lookups start.
    #[inline]
    pub const fn scope(&self) -> ScopeId {
        self.scope
    }

    /// Style set being resolved.
    #[inline]
    pub const fn target(&self) -> StyleSet {
        self.target
    }

    /// Base URL for `url()` tokens met in this frame.
    #[inline]
    pub fn base_url(&self) -> &Arc<Url> {
        &self.base_url
    }

    /// Context for expanding a declaration found in `scope`, tagged
    /// `style_set`, written in a stylesheet at `base_url`.
    #[inline]
    pub fn for_declaration(&self, scope: ScopeId, style_set: StyleSet, base_url: &Arc<Url>) -> Self {
        Self {
            scope,
            target: self.target.narrowed_by(style_set),
            base_url: Arc::clone(base_url),
        }
    }

    /// Same context with a different base URL.
    #[inline]
    pub fn with_base_url(&self, base_url: &Arc<Url>) -> Self {
        Self {
            scope: self.scope,
            target: self.target,
            base_url: Arc::clone(base_url),
        }
    }
}

/// Owner of a current [`ResolutionContext`].
pub trait AmbientState {
    /// The context currently in effect.
    fn context_mut(&mut self) -> &mut ResolutionContext;
}

/// Replaces the ambient context for as long as it is alive, and puts the
/// previous one back on drop, whichever way the scope is left.
pub struct ScopedContext<'state, State: AmbientState> {
    state: &'state mut State,
    saved: ResolutionContext,
}

impl<'state, State: AmbientState> ScopedContext<'state, State> {
    /// Install `replacement` as the ambient context of `state`.
    #[inline]
    pub fn enter(state: &'state mut State, replacement: ResolutionContext) -> Self {
        let saved = mem::replace(state.context_mut(), replacement);
        Self { state, saved }
    }

    /// The context that will be restored.
    #[inline]
    pub fn saved(&self) -> &ResolutionContext {
        &self.saved
    }
}

impl<State: AmbientState> Deref for ScopedContext<'_, State> {
    type Target = State;

    #[inline]
    fn deref(&self) -> &State {
        self.state
    }
}

impl<State: AmbientState> DerefMut for ScopedContext<'_, State> {
    #[inline]
    fn deref_mut(&mut self) -> &mut State {
        self.state
    }
}

impl<State: AmbientState> Drop for ScopedContext<'_, State> {
    #[inline]
    fn drop(&mut self) {
        mem::swap(self.state.context_mut(), &mut self.saved);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::error::Error;

    struct Tracker {
        context: ResolutionContext,
    }

    impl AmbientState for Tracker {
        fn context_mut(&mut self) -> &mut ResolutionContext {
            &mut self.context
        }
    }

    fn base(url: &str) -> Result<Arc<Url>, Box<dyn Error>> {
        Ok(Arc::new(Url::parse(url)?))
    }

    /// Narrow to `NonVisited`, nest once more, then fail from the innermost frame.
    fn nested_failure(tracker: &mut Tracker, inner_url: &Arc<Url>) -> Result<(), &'static str> {
        let scope = tracker.context.scope();
        let narrowed = tracker
            .context
            .for_declaration(scope, StyleSet::NonVisited, inner_url);
        let mut outer = ScopedContext::enter(tracker, narrowed);
        let deeper = outer.context.with_base_url(inner_url);
        let inner = ScopedContext::enter(&mut *outer, deeper);
        if inner.context.target() == StyleSet::NonVisited {
            return Err("aborted");
        }
        Ok(())
    }

    #[test]
    fn context_is_restored_after_early_return() -> Result<(), Box<dyn Error>> {
        let document = base("https://example.com/index.html")?;
        let sheet = base("https://example.com/styles/a.css")?;
        let start = ResolutionContext::new(ScopeId::new(0), StyleSet::Both, &document);
        let mut tracker = Tracker {
            context: start.clone(),
        };
        assert_eq!(nested_failure(&mut tracker, &sheet), Err("aborted"));
        assert_eq!(tracker.context, start);
        Ok(())
    }

    #[test]
    fn guard_restores_on_normal_exit() -> Result<(), Box<dyn Error>> {
        let document = base("https://example.com/index.html")?;
        let sheet = base("https://example.com/styles/a.css")?;
        let start = ResolutionContext::new(ScopeId::new(3), StyleSet::Visited, &document);
        let mut tracker = Tracker {
            context: start.clone(),
        };
        {
            let replacement = start.with_base_url(&sheet);
            let guard = ScopedContext::enter(&mut tracker, replacement);
            assert_eq!(guard.context.base_url().as_str(), sheet.as_str());
            assert_eq!(guard.saved(), &start);
        }
        assert_eq!(tracker.context, start);
        Ok(())
    }

    #[test]
    fn style_set_visibility() {
        assert!(StyleSet::Both.applies_to(StyleSet::Visited));
        assert!(StyleSet::Visited.applies_to(StyleSet::Both));
        assert!(StyleSet::Visited.applies_to(StyleSet::Visited));
        assert!(!StyleSet::NonVisited.applies_to(StyleSet::Visited));
        assert_eq!(
            StyleSet::Both.narrowed_by(StyleSet::NonVisited),
            StyleSet::NonVisited
        );
        assert_eq!(
            StyleSet::Visited.narrowed_by(StyleSet::Both),
            StyleSet::Visited
        );
    }
}
