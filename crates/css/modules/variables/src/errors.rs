//! Reasons a `var()` substitution makes a value invalid at computed-value time.
//! Spec: <https://www.w3.org/TR/css-variables-1/#invalid-variables>

use core::error::Error;
use core::fmt;

/// Failure of one top-level resolution. Every variant makes the whole property
/// value invalid; there is no partially substituted result.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VarError {
    /// A referenced custom property has no visible declaration and the
    /// reference has no fallback.
    UnresolvedReference {
        /// Referenced custom property name, including the leading `--`.
        name: String,
    },
    /// A custom property transitively references itself.
    /// Spec: <https://www.w3.org/TR/css-variables-1/#cycles>
    CycleDetected {
        /// The property at which the cycle was closed.
        name: String,
    },
    /// The substitution count of the current resolution went past its ceiling.
    BudgetExceeded {
        /// The ceiling that was hit.
        limit: usize,
    },
    /// Declarations referencing one another nest deeper than the ceiling.
    NestingTooDeep {
        /// The ceiling that was hit.
        limit: usize,
    },
    /// A substituted value grew past the length ceiling.
    ValueTooLarge {
        /// The ceiling that was hit, in bytes.
        limit: usize,
    },
    /// The fallback of `var(name, ...)` is not a well-formed declaration value.
    MalformedFallback {
        /// Name referenced by the `var()` carrying the broken fallback.
        name: String,
    },
    /// The first argument of a `var()` is not a custom property name.
    InvalidName {
        /// The offending argument text.
        name: String,
    },
    /// The value is not a well-formed `<declaration-value>`.
    InvalidSyntax,
    /// The declaration targets a scope that the store does not own.
    UnknownScope,
}

impl fmt::Display for VarError {
    #[inline]
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnresolvedReference { name } => {
                write!(formatter, "unresolved reference to {name} with no fallback")
            }
            Self::CycleDetected { name } => {
                write!(formatter, "custom property {name} is part of a reference cycle")
            }
            Self::BudgetExceeded { limit } => {
                write!(formatter, "more than {limit} var() substitutions in one value")
            }
            Self::NestingTooDeep { limit } => {
                write!(formatter, "var() references nest deeper than {limit} declarations")
            }
            Self::ValueTooLarge { limit } => {
                write!(formatter, "substituted value is longer than {limit} bytes")
            }
            Self::MalformedFallback { name } => {
                write!(formatter, "malformed fallback in var({name}, ...)")
            }
            Self::InvalidName { name } => {
                write!(formatter, "`{name}` is not a custom property name")
            }
            Self::InvalidSyntax => formatter.write_str("malformed declaration value"),
            Self::UnknownScope => formatter.write_str("scope does not belong to this store"),
        }
    }
}

impl Error for VarError {}
