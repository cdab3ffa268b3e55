//! The C++ type model and its canonical spelling.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::qualifiers::{Cv, QualifierSet};

/// Fundamental types, spelled the way the parser normalizes them.
pub const ARITHMETIC_TYPES: &[&str] = &[
    "bool",
    "char",
    "signed char",
    "unsigned char",
    "wchar_t",
    "char8_t",
    "char16_t",
    "char32_t",
    "short",
    "unsigned short",
    "int",
    "unsigned int",
    "long",
    "unsigned long",
    "long long",
    "unsigned long long",
    "float",
    "double",
    "long double",
];

/// Spelling used for the type of `nullptr`.
pub const NULLPTR_T: &str = "std::nullptr_t";

/// Placeholder used by generic call operators (`auto` parameters).
pub const AUTO: &str = "auto";

/// A C++ type-id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Type {
    /// Builtins, class names and template-ids (`int`, `foo`, `N<0>`).
    Named { name: String },
    /// Top-level const/volatile on a non-function type.
    Qualified { cv: Cv, inner: Box<Type> },
    Pointer { pointee: Box<Type> },
    LvalueReference { referent: Box<Type> },
    RvalueReference { referent: Box<Type> },
    /// `pointee class::*`; a member function pointer when `pointee` is a function.
    MemberPointer { class: Box<Type>, pointee: Box<Type> },
    Function(FunctionType),
}

/// A function type: return type, parameters and qualifiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionType {
    pub return_type: Box<Type>,
    pub params: Vec<Type>,
    pub qualifiers: QualifierSet,
}

impl FunctionType {
    pub fn new(return_type: Type, params: Vec<Type>) -> Self {
        Self {
            return_type: Box::new(return_type),
            params,
            qualifiers: QualifierSet::default(),
        }
    }

    pub fn with_qualifiers(mut self, qualifiers: QualifierSet) -> Self {
        self.qualifiers = qualifiers;
        self
    }

    /// The same function with its parameter list replaced.
    pub fn with_params(&self, params: Vec<Type>) -> Self {
        Self {
            return_type: self.return_type.clone(),
            params,
            qualifiers: self.qualifiers,
        }
    }

    pub fn is_abominable(&self) -> bool {
        self.qualifiers.has_member_qualifiers()
    }

    /// Spell the function around `declarator`, which is empty for a bare
    /// function type or a parenthesized pointer declarator such as `(*)`.
    fn spell(&self, declarator: String, spell_convention: bool) -> String {
        let mut out = String::new();
        if spell_convention {
            if let Some(keyword) = self.qualifiers.calling_convention.keyword() {
                out.push_str(keyword);
                if !declarator.is_empty() {
                    out.push(' ');
                }
            }
        }
        out.push_str(&declarator);
        out.push('(');
        let params: Vec<String> = self.params.iter().map(ToString::to_string).collect();
        out.push_str(&params.join(", "));
        if self.qualifiers.is_variadic {
            if !self.params.is_empty() {
                out.push_str(", ");
            }
            out.push_str("...");
        }
        out.push(')');
        out.push_str(&self.qualifiers.suffix());
        self.return_type.spell(out)
    }
}

impl Type {
    pub fn named(name: impl Into<String>) -> Self {
        Type::Named { name: name.into() }
    }

    pub fn void() -> Self {
        Type::named("void")
    }

    pub fn qualified(cv: Cv, inner: Type) -> Self {
        if cv.is_empty() {
            return inner;
        }
        match inner {
            Type::Qualified { cv: existing, inner } => Type::Qualified {
                cv: existing.union(cv),
                inner,
            },
            inner => Type::Qualified {
                cv,
                inner: Box::new(inner),
            },
        }
    }

    pub fn pointer(pointee: Type) -> Self {
        Type::Pointer {
            pointee: Box::new(pointee),
        }
    }

    pub fn lvalue_ref(referent: Type) -> Self {
        Type::LvalueReference {
            referent: Box::new(referent),
        }
    }

    pub fn rvalue_ref(referent: Type) -> Self {
        Type::RvalueReference {
            referent: Box::new(referent),
        }
    }

    pub fn member_pointer(class: Type, pointee: Type) -> Self {
        Type::MemberPointer {
            class: Box::new(class),
            pointee: Box::new(pointee),
        }
    }

    pub fn function(function: FunctionType) -> Self {
        Type::Function(function)
    }

    pub fn is_void(&self) -> bool {
        matches!(self.strip_cv(), Type::Named { name } if name == "void")
    }

    pub fn is_function(&self) -> bool {
        matches!(self, Type::Function(_))
    }

    pub fn is_reference(&self) -> bool {
        matches!(
            self,
            Type::LvalueReference { .. } | Type::RvalueReference { .. }
        )
    }

    pub fn is_arithmetic(&self) -> bool {
        matches!(self.strip_cv(), Type::Named { name } if ARITHMETIC_TYPES.contains(&name.as_str()))
    }

    pub fn is_nullptr(&self) -> bool {
        matches!(self.strip_cv(), Type::Named { name } if name == NULLPTR_T)
    }

    pub fn is_auto(&self) -> bool {
        matches!(self.strip_cv(), Type::Named { name } if name == AUTO)
    }

    /// A named type that is neither a builtin nor a placeholder.
    pub fn class_name(&self) -> Option<&str> {
        match self.strip_cv() {
            Type::Named { name }
                if !self.is_arithmetic()
                    && !self.is_void()
                    && !self.is_nullptr()
                    && !self.is_auto() =>
            {
                Some(name.as_str())
            }
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&FunctionType> {
        match self {
            Type::Function(function) => Some(function),
            _ => None,
        }
    }

    /// Top-level cv of this type (never set on functions or references).
    pub fn cv(&self) -> Cv {
        match self {
            Type::Qualified { cv, .. } => *cv,
            _ => Cv::NONE,
        }
    }

    pub fn strip_cv(&self) -> &Type {
        match self {
            Type::Qualified { inner, .. } => inner,
            other => other,
        }
    }

    pub fn strip_reference(&self) -> &Type {
        match self {
            Type::LvalueReference { referent } | Type::RvalueReference { referent } => referent,
            other => other,
        }
    }

    /// Spell this type around a declarator, inside out.
    fn spell(&self, declarator: String) -> String {
        match self {
            Type::Named { name } => join(name, declarator),
            Type::Qualified { cv, inner } => match inner.as_ref() {
                Type::Pointer { pointee } => spell_pointer_like(pointee, format!("* {cv}"), declarator),
                Type::MemberPointer { class, pointee } => {
                    spell_pointer_like(pointee, format!("{class}::* {cv}"), declarator)
                }
                other => join(&format!("{cv} {other}"), declarator),
            },
            Type::Pointer { pointee } => spell_pointer_like(pointee, "*".to_string(), declarator),
            Type::LvalueReference { referent } => {
                spell_pointer_like(referent, "&".to_string(), declarator)
            }
            Type::RvalueReference { referent } => {
                spell_pointer_like(referent, "&&".to_string(), declarator)
            }
            Type::MemberPointer { class, pointee } => {
                spell_pointer_like(pointee, format!("{class}::*"), declarator)
            }
            Type::Function(function) => function.spell(declarator, true),
        }
    }
}

fn spell_pointer_like(target: &Type, operator: String, declarator: String) -> String {
    let mut decl = operator;
    if !declarator.is_empty() {
        let ends_in_word = decl.ends_with(|c: char| c.is_alphanumeric() || c == '_');
        let starts_with_word = declarator.starts_with(|c: char| c.is_alphanumeric() || c == '_');
        if ends_in_word && starts_with_word {
            decl.push(' ');
        }
        decl.push_str(&declarator);
    }
    match target {
        Type::Function(function) => {
            let mut grouped = String::from("(");
            if let Some(keyword) = function.qualifiers.calling_convention.keyword() {
                grouped.push_str(keyword);
                grouped.push(' ');
            }
            grouped.push_str(&decl);
            grouped.push(')');
            function.spell(grouped, false)
        }
        other => other.spell(decl),
    }
}

fn join(base: &str, declarator: String) -> String {
    if declarator.is_empty() {
        base.to_string()
    } else if declarator.starts_with(['*', '&', '(']) {
        format!("{base}{declarator}")
    } else {
        format!("{base} {declarator}")
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.spell(String::new()))
    }
}

impl fmt::Display for FunctionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.spell(String::new(), true))
    }
}
