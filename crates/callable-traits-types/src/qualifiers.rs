//! Function qualifiers and the algebra used to add and remove them.
//!
//! Nothing in here knows about callable shapes. Shape-specific domain checks
//! live in the transformation layer and wrap these operations.

use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// cv-qualifiers
// ============================================================================

/// A const/volatile pair, used both for top-level type qualifiers and for the
/// member qualifiers of a function type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cv {
    pub is_const: bool,
    pub is_volatile: bool,
}

impl Cv {
    pub const NONE: Cv = Cv {
        is_const: false,
        is_volatile: false,
    };
    pub const CONST: Cv = Cv {
        is_const: true,
        is_volatile: false,
    };
    pub const VOLATILE: Cv = Cv {
        is_const: false,
        is_volatile: true,
    };
    pub const CONST_VOLATILE: Cv = Cv {
        is_const: true,
        is_volatile: true,
    };

    pub fn is_empty(self) -> bool {
        !self.is_const && !self.is_volatile
    }

    pub fn union(self, other: Cv) -> Cv {
        Cv {
            is_const: self.is_const || other.is_const,
            is_volatile: self.is_volatile || other.is_volatile,
        }
    }

    /// True if every qualifier in `other` is also present in `self`.
    pub fn contains(self, other: Cv) -> bool {
        (self.is_const || !other.is_const) && (self.is_volatile || !other.is_volatile)
    }
}

impl fmt::Display for Cv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.is_const, self.is_volatile) {
            (true, true) => f.write_str("const volatile"),
            (true, false) => f.write_str("const"),
            (false, true) => f.write_str("volatile"),
            (false, false) => Ok(()),
        }
    }
}

// ============================================================================
// Reference qualifiers
// ============================================================================

/// The ref-qualifier of a member function (`&`, `&&`, or none).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefQualifier {
    #[default]
    None,
    Lvalue,
    Rvalue,
}

impl RefQualifier {
    /// Combine an existing qualifier with an added one. `&` always wins, so
    /// adding `&&` to an `&`-qualified function leaves it `&`-qualified.
    pub fn collapse(self, added: RefQualifier) -> RefQualifier {
        match (self, added) {
            (RefQualifier::Lvalue, _) | (_, RefQualifier::Lvalue) => RefQualifier::Lvalue,
            (RefQualifier::Rvalue, _) | (_, RefQualifier::Rvalue) => RefQualifier::Rvalue,
            (RefQualifier::None, RefQualifier::None) => RefQualifier::None,
        }
    }

    pub fn token(self) -> Option<&'static str> {
        match self {
            RefQualifier::None => None,
            RefQualifier::Lvalue => Some("&"),
            RefQualifier::Rvalue => Some("&&"),
        }
    }
}

// ============================================================================
// Calling conventions
// ============================================================================

/// Calling convention attached to a function type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallingConvention {
    #[default]
    Default,
    Cdecl,
    Stdcall,
    Fastcall,
    Pascal,
}

impl CallingConvention {
    pub fn keyword(self) -> Option<&'static str> {
        match self {
            CallingConvention::Default => None,
            CallingConvention::Cdecl => Some("__cdecl"),
            CallingConvention::Stdcall => Some("__stdcall"),
            CallingConvention::Fastcall => Some("__fastcall"),
            CallingConvention::Pascal => Some("pascal"),
        }
    }

    /// Accepts both the keyword spellings and plain names (`stdcall`).
    pub fn from_keyword(word: &str) -> Option<Self> {
        match word.trim_start_matches('_') {
            "cdecl" => Some(CallingConvention::Cdecl),
            "stdcall" => Some(CallingConvention::Stdcall),
            "fastcall" => Some(CallingConvention::Fastcall),
            "pascal" => Some(CallingConvention::Pascal),
            "default" => Some(CallingConvention::Default),
            _ => None,
        }
    }
}

impl fmt::Display for CallingConvention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword().unwrap_or("default"))
    }
}

// ============================================================================
// Qualifier set
// ============================================================================

/// Every attribute a function type can carry besides its return type and
/// parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QualifierSet {
    pub is_const: bool,
    pub is_volatile: bool,
    pub ref_qualifier: RefQualifier,
    pub is_noexcept: bool,
    pub is_transaction_safe: bool,
    pub is_variadic: bool,
    pub calling_convention: CallingConvention,
}

impl QualifierSet {
    pub fn cv(self) -> Cv {
        Cv {
            is_const: self.is_const,
            is_volatile: self.is_volatile,
        }
    }

    /// Qualifiers that only make sense on a member function: cv and ref.
    pub fn has_member_qualifiers(self) -> bool {
        self.is_const || self.is_volatile || self.ref_qualifier != RefQualifier::None
    }

    pub fn add_cv(mut self, cv: Cv) -> Self {
        self.is_const |= cv.is_const;
        self.is_volatile |= cv.is_volatile;
        self
    }

    pub fn remove_cv(mut self, cv: Cv) -> Self {
        self.is_const &= !cv.is_const;
        self.is_volatile &= !cv.is_volatile;
        self
    }

    pub fn add_ref(mut self, added: RefQualifier) -> Self {
        self.ref_qualifier = self.ref_qualifier.collapse(added);
        self
    }

    pub fn remove_ref(mut self) -> Self {
        self.ref_qualifier = RefQualifier::None;
        self
    }

    pub fn remove_member_qualifiers(self) -> Self {
        self.remove_cv(Cv::CONST_VOLATILE).remove_ref()
    }

    pub fn with_noexcept(mut self, is_noexcept: bool) -> Self {
        self.is_noexcept = is_noexcept;
        self
    }

    pub fn with_transaction_safe(mut self, is_transaction_safe: bool) -> Self {
        self.is_transaction_safe = is_transaction_safe;
        self
    }

    pub fn with_variadic(mut self, is_variadic: bool) -> Self {
        self.is_variadic = is_variadic;
        self
    }

    pub fn with_calling_convention(mut self, convention: CallingConvention) -> Self {
        self.calling_convention = convention;
        self
    }

    /// The suffix written after a function's parameter list, e.g.
    /// `" const && noexcept"`. Empty when there is nothing to write.
    pub fn suffix(self) -> String {
        let mut out = String::new();
        if self.is_const {
            out.push_str(" const");
        }
        if self.is_volatile {
            out.push_str(" volatile");
        }
        if let Some(token) = self.ref_qualifier.token() {
            out.push(' ');
            out.push_str(token);
        }
        if self.is_transaction_safe {
            out.push_str(" transaction_safe");
        }
        if self.is_noexcept {
            out.push_str(" noexcept");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_collapsing() {
        use RefQualifier::*;
        assert_eq!(None.collapse(Rvalue), Rvalue);
        assert_eq!(None.collapse(Lvalue), Lvalue);
        assert_eq!(Lvalue.collapse(Rvalue), Lvalue);
        assert_eq!(Rvalue.collapse(Lvalue), Lvalue);
        assert_eq!(Rvalue.collapse(Rvalue), Rvalue);
        assert_eq!(Lvalue.collapse(None), Lvalue);
    }

    #[test]
    fn test_add_rvalue_to_lvalue_is_identity() {
        let lvalue = QualifierSet::default().add_ref(RefQualifier::Lvalue);
        assert_eq!(lvalue.add_ref(RefQualifier::Rvalue), lvalue);
    }

    #[test]
    fn test_cv_algebra_over_all_combinations() {
        let all = [Cv::NONE, Cv::CONST, Cv::VOLATILE, Cv::CONST_VOLATILE];
        for start in all {
            for change in all {
                let base = QualifierSet::default().add_cv(start);
                let added = base.add_cv(change);
                assert_eq!(added.cv(), start.union(change));
                assert!(added.cv().contains(change));

                let removed = base.remove_cv(change);
                assert!(start.contains(removed.cv()));
                assert_eq!(removed.is_const, start.is_const && !change.is_const);
                assert_eq!(removed.is_volatile, start.is_volatile && !change.is_volatile);
                // removing twice changes nothing
                assert_eq!(removed.remove_cv(change), removed);
            }
        }
    }

    #[test]
    fn test_member_qualifier_removal_keeps_other_flags() {
        let quals = QualifierSet {
            is_const: true,
            ref_qualifier: RefQualifier::Rvalue,
            is_noexcept: true,
            is_variadic: true,
            calling_convention: CallingConvention::Stdcall,
            ..QualifierSet::default()
        };
        let stripped = quals.remove_member_qualifiers();
        assert!(!stripped.has_member_qualifiers());
        assert!(stripped.is_noexcept);
        assert!(stripped.is_variadic);
        assert_eq!(stripped.calling_convention, CallingConvention::Stdcall);
    }

    #[test]
    fn test_suffix_order() {
        let quals = QualifierSet {
            is_const: true,
            is_volatile: true,
            ref_qualifier: RefQualifier::Rvalue,
            is_noexcept: true,
            is_transaction_safe: true,
            ..QualifierSet::default()
        };
        assert_eq!(quals.suffix(), " const volatile && transaction_safe noexcept");
        assert_eq!(QualifierSet::default().suffix(), "");
    }

    #[test]
    fn test_calling_convention_keywords() {
        assert_eq!(
            CallingConvention::from_keyword("__stdcall"),
            Some(CallingConvention::Stdcall)
        );
        assert_eq!(
            CallingConvention::from_keyword("fastcall"),
            Some(CallingConvention::Fastcall)
        );
        assert_eq!(CallingConvention::from_keyword("__thiscall"), None);
        assert_eq!(CallingConvention::Cdecl.to_string(), "__cdecl");
    }
}
