//! Value-level shorthands.
//!
//! Each `*_v` function takes a type spelled in C++ and answers directly,
//! the way a `constexpr` value query would. They are only available with
//! the `value-shorthand` feature; without it every shorthand answers
//! [`Shorthand::Unsupported`] instead.

use callable_traits_types::{ClassTable, Predicate};

use crate::parse::{parse_type, parse_type_list};
use crate::{Result, invoke, queries};

/// The answer of a shorthand query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shorthand<T> {
    Value(T),
    /// Shorthands are disabled in this build
    Unsupported,
}

impl<T> Shorthand<T> {
    pub fn value(self) -> Option<T> {
        match self {
            Shorthand::Value(value) => Some(value),
            Shorthand::Unsupported => None,
        }
    }

    pub fn is_supported(&self) -> bool {
        matches!(self, Shorthand::Value(_))
    }
}

fn shorthand<T>(query: impl FnOnce() -> Result<T>) -> Result<Shorthand<T>> {
    if cfg!(feature = "value-shorthand") {
        query().map(Shorthand::Value)
    } else {
        Ok(Shorthand::Unsupported)
    }
}

pub fn arity_v(ty: &str, classes: &ClassTable) -> Result<Shorthand<usize>> {
    shorthand(|| queries::arity(&parse_type(ty)?, classes))
}

pub fn min_arity_v(ty: &str, classes: &ClassTable) -> Result<Shorthand<usize>> {
    shorthand(|| queries::min_arity(&parse_type(ty)?, classes))
}

pub fn max_arity_v(ty: &str, classes: &ClassTable) -> Result<Shorthand<usize>> {
    shorthand(|| queries::max_arity(&parse_type(ty)?, classes))
}

/// Any [`Predicate`], by value.
pub fn is_v(ty: &str, classes: &ClassTable, predicate: Predicate) -> Result<Shorthand<bool>> {
    shorthand(|| Ok(queries::predicate(&parse_type(ty)?, classes, predicate)))
}

pub fn has_void_return_v(ty: &str, classes: &ClassTable) -> Result<Shorthand<bool>> {
    is_v(ty, classes, Predicate::HasVoidReturn)
}

pub fn has_varargs_v(ty: &str, classes: &ClassTable) -> Result<Shorthand<bool>> {
    is_v(ty, classes, Predicate::HasVarargs)
}

pub fn is_const_qualified_v(ty: &str, classes: &ClassTable) -> Result<Shorthand<bool>> {
    is_v(ty, classes, Predicate::IsConstQualified)
}

pub fn is_volatile_qualified_v(ty: &str, classes: &ClassTable) -> Result<Shorthand<bool>> {
    is_v(ty, classes, Predicate::IsVolatileQualified)
}

pub fn is_reference_qualified_v(ty: &str, classes: &ClassTable) -> Result<Shorthand<bool>> {
    is_v(ty, classes, Predicate::IsReferenceQualified)
}

pub fn is_lvalue_qualified_v(ty: &str, classes: &ClassTable) -> Result<Shorthand<bool>> {
    is_v(ty, classes, Predicate::IsLvalueQualified)
}

pub fn is_rvalue_qualified_v(ty: &str, classes: &ClassTable) -> Result<Shorthand<bool>> {
    is_v(ty, classes, Predicate::IsRvalueQualified)
}

pub fn is_noexcept_v(ty: &str, classes: &ClassTable) -> Result<Shorthand<bool>> {
    is_v(ty, classes, Predicate::IsNoexcept)
}

pub fn is_transaction_safe_v(ty: &str, classes: &ClassTable) -> Result<Shorthand<bool>> {
    is_v(ty, classes, Predicate::IsTransactionSafe)
}

pub fn is_constexpr_v(ty: &str, classes: &ClassTable) -> Result<Shorthand<bool>> {
    is_v(ty, classes, Predicate::IsConstexpr)
}

/// `args` is a comma separated list of argument expression types.
pub fn can_invoke_v(ty: &str, args: &str, classes: &ClassTable) -> Result<Shorthand<bool>> {
    shorthand(|| {
        Ok(invoke::can_invoke(
            &parse_type(ty)?,
            &parse_type_list(args)?,
            classes,
        ))
    })
}
