//! Bounds on substitution work per top-level resolution.
//!
//! Nested references can double the work at every level
//! (`--b: var(--a) var(--a); --c: var(--b) var(--b); ...`), so every single
//! substitution is charged against a fixed ceiling, not just the outermost one.
//! A count alone does not bound memory when the doubled leaf is large, so the
//! length of every substituted value is capped as well. Expansion recurses
//! once per referenced declaration, which the nesting ceiling keeps within
//! the stack of a worker thread.

use crate::errors::VarError;

/// Default ceiling on `var()` substitutions per top-level resolution.
pub const MAX_SUBSTITUTIONS: usize = 65536;

/// Default ceiling on declarations being expanded inside one another.
pub const MAX_NESTING_DEPTH: usize = 512;

/// Default ceiling on the length of a substituted value, in bytes.
pub const MAX_VALUE_BYTES: usize = 2 * 1024 * 1024;

/// Resolver configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExpansionLimits {
    /// Substitutions allowed per top-level resolution request.
    pub max_substitutions: usize,
    /// Declarations that may be in expansion at the same time.
    pub max_depth: usize,
    /// Longest value, in bytes, any expansion frame may produce.
    pub max_value_bytes: usize,
}

impl Default for ExpansionLimits {
    #[inline]
    fn default() -> Self {
        Self {
            max_substitutions: MAX_SUBSTITUTIONS,
            max_depth: MAX_NESTING_DEPTH,
            max_value_bytes: MAX_VALUE_BYTES,
        }
    }
}

/// Running substitution count for one top-level resolution.
#[derive(Clone, Debug)]
pub struct ExpansionBudget {
    used: usize,
    limits: ExpansionLimits,
}

impl ExpansionBudget {
    /// A fresh, unused budget.
    #[inline]
    pub const fn new(limits: ExpansionLimits) -> Self {
        Self { used: 0, limits }
    }

    /// Record one substitution.
    ///
    /// # Errors
    /// Returns `BudgetExceeded` once `max_substitutions` have already been
    /// charged; the count is not advanced past the ceiling.
    #[inline]
    pub fn charge(&mut self) -> Result<(), VarError> {
        let limit = self.limits.max_substitutions;
        if self.used >= limit {
            return Err(VarError::BudgetExceeded { limit });
        }
        self.used += 1;
        Ok(())
    }

    /// Check that one more declaration may start expanding while `depth`
    /// are already in progress.
    ///
    /// # Errors
    /// Returns `NestingTooDeep` when `depth` has reached `max_depth`.
    #[inline]
    pub fn enter(&self, depth: usize) -> Result<(), VarError> {
        let limit = self.limits.max_depth;
        if depth >= limit {
            return Err(VarError::NestingTooDeep { limit });
        }
        Ok(())
    }

    /// Check that a value of `len` bytes may be produced.
    ///
    /// # Errors
    /// Returns `ValueTooLarge` when `len` is over `max_value_bytes`.
    #[inline]
    pub fn fits(&self, len: usize) -> Result<(), VarError> {
        let limit = self.limits.max_value_bytes;
        if len > limit {
            return Err(VarError::ValueTooLarge { limit });
        }
        Ok(())
    }

    /// Substitutions charged so far.
    #[inline]
    pub const fn used(&self) -> usize {
        self.used
    }

    /// Start over for a new top-level request.
    #[inline]
    pub fn reset(&mut self) {
        self.used = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limited(max_substitutions: usize) -> ExpansionBudget {
        ExpansionBudget::new(ExpansionLimits {
            max_substitutions,
            ..ExpansionLimits::default()
        })
    }

    #[test]
    fn charges_up_to_the_ceiling() {
        let mut budget = limited(3);
        assert_eq!(budget.charge(), Ok(()));
        assert_eq!(budget.charge(), Ok(()));
        assert_eq!(budget.charge(), Ok(()));
        assert_eq!(
            budget.charge(),
            Err(VarError::BudgetExceeded { limit: 3 })
        );
        assert_eq!(budget.used(), 3);
    }

    #[test]
    fn reset_starts_a_new_request() {
        let mut budget = limited(1);
        assert_eq!(budget.charge(), Ok(()));
        assert_eq!(
            budget.charge(),
            Err(VarError::BudgetExceeded { limit: 1 })
        );
        budget.reset();
        assert_eq!(budget.used(), 0);
        assert_eq!(budget.charge(), Ok(()));
    }

    #[test]
    fn depth_and_length_ceilings() {
        let budget = ExpansionBudget::new(ExpansionLimits {
            max_depth: 2,
            max_value_bytes: 4,
            ..ExpansionLimits::default()
        });
        assert_eq!(budget.enter(1), Ok(()));
        assert_eq!(budget.enter(2), Err(VarError::NestingTooDeep { limit: 2 }));
        assert_eq!(budget.fits(4), Ok(()));
        assert_eq!(budget.fits(5), Err(VarError::ValueTooLarge { limit: 4 }));
    }

    #[test]
    fn default_ceilings() {
        let limits = ExpansionLimits::default();
        assert_eq!(limits.max_substitutions, 65536);
        assert_eq!(limits.max_depth, 512);
        assert_eq!(limits.max_value_bytes, 2 * 1024 * 1024);
    }
}
