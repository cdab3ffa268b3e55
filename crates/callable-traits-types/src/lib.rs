//! Shared types for callable-traits.
//!
//! This crate defines the model every other crate works on: the C++ type
//! model ([`Type`], [`FunctionType`]), qualifiers ([`QualifierSet`]), the
//! result of classification ([`CallableShape`]) and extraction
//! ([`Signature`]), function-object declarations ([`ClassTable`]), and the
//! request/response protocol used by the command line front end.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub mod qualifiers;
pub mod ty;

pub use qualifiers::{CallingConvention, Cv, QualifierSet, RefQualifier};
pub use ty::{ARITHMETIC_TYPES, AUTO, FunctionType, NULLPTR_T, Type};

// ============================================================================
// Classification and Signatures
// ============================================================================

/// The structural category of a type. Exactly one applies to any type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum CallableShape {
    /// An unqualified function type, `int(char)`
    FreeFunction,
    /// `int(*)(char)`
    FunctionPointer,
    /// `int(&)(char)` or `int(&&)(char)`
    FunctionReference,
    /// `int(foo::*)(char) const`
    MemberFunctionPointer { owner: Type },
    /// A class with exactly one non-template call operator
    FunctionObject { class: String },
    /// A function type carrying cv or ref qualifiers, `int(char) const &`
    Abominable,
    NotCallable,
}

impl CallableShape {
    pub fn is_callable(&self) -> bool {
        !matches!(self, CallableShape::NotCallable)
    }

    /// Shapes whose signature comes straight from a function type.
    pub fn is_function_bearing(&self) -> bool {
        matches!(
            self,
            CallableShape::FreeFunction
                | CallableShape::FunctionPointer
                | CallableShape::FunctionReference
                | CallableShape::MemberFunctionPointer { .. }
                | CallableShape::Abominable
        )
    }
}

impl fmt::Display for CallableShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallableShape::FreeFunction => f.write_str("free function"),
            CallableShape::FunctionPointer => f.write_str("function pointer"),
            CallableShape::FunctionReference => f.write_str("function reference"),
            CallableShape::MemberFunctionPointer { owner } => {
                write!(f, "member function pointer of `{owner}`")
            }
            CallableShape::FunctionObject { class } => write!(f, "function object `{class}`"),
            CallableShape::Abominable => f.write_str("abominable function"),
            CallableShape::NotCallable => f.write_str("not callable"),
        }
    }
}

/// Everything known about a classified callable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub return_type: Type,
    /// Declared parameters, excluding the object of a member function
    pub params: Vec<Type>,
    pub qualifiers: QualifierSet,
    pub shape: CallableShape,
    /// Parameters without a default argument
    pub min_arity: usize,
    /// All declared parameters; C varargs are reported by `has_varargs`
    pub max_arity: usize,
}

impl Signature {
    pub fn has_varargs(&self) -> bool {
        self.qualifiers.is_variadic
    }

    /// True if `count` arguments can be passed, ignoring their types.
    pub fn accepts_arity(&self, count: usize) -> bool {
        count >= self.min_arity && (count <= self.max_arity || self.has_varargs())
    }

    pub fn summary(&self) -> SignatureSummary {
        SignatureSummary {
            return_type: self.return_type.to_string(),
            params: self.params.iter().map(ToString::to_string).collect(),
            qualifiers: self.qualifiers,
            shape: self.shape.clone(),
            min_arity: self.min_arity,
            max_arity: self.max_arity,
        }
    }
}

/// A [`Signature`] with every type spelled out, for the protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureSummary {
    pub return_type: String,
    pub params: Vec<String>,
    pub qualifiers: QualifierSet,
    pub shape: CallableShape,
    pub min_arity: usize,
    pub max_arity: usize,
}

// ============================================================================
// Function Object Declarations
// ============================================================================

/// One `operator()` of a class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallOperator {
    /// Member function type, carrying the operator's cv/ref qualifiers
    pub function: FunctionType,
    /// Number of trailing parameters with a default argument
    pub default_args: usize,
    pub is_constexpr: bool,
    /// Declared as a template (or with `auto` parameters)
    pub is_template: bool,
}

impl CallOperator {
    pub fn new(function: FunctionType) -> Self {
        Self {
            function,
            default_args: 0,
            is_constexpr: false,
            is_template: false,
        }
    }

    pub fn min_arity(&self) -> usize {
        self.function.params.len().saturating_sub(self.default_args)
    }
}

/// A class declaration, reduced to what callability depends on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassDecl {
    pub name: String,
    /// Direct base classes
    #[serde(default)]
    pub bases: Vec<String>,
    #[serde(default)]
    pub call_operators: Vec<CallOperator>,
    /// Bases whose call operators `using base::operator();` brings into scope
    #[serde(default)]
    pub using_call_operators: Vec<String>,
    /// Whether the class is a literal type (needed for constexpr calls)
    #[serde(default = "default_true")]
    pub is_literal: bool,
}

fn default_true() -> bool {
    true
}

impl ClassDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bases: Vec::new(),
            call_operators: Vec::new(),
            using_call_operators: Vec::new(),
            is_literal: true,
        }
    }

    pub fn with_call_operator(mut self, operator: CallOperator) -> Self {
        self.call_operators.push(operator);
        self
    }

    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.bases.push(base.into());
        self
    }

    /// The call operator, if there is exactly one and it is not a template.
    pub fn single_call_operator(&self) -> Option<&CallOperator> {
        match self.call_operators.as_slice() {
            [operator] if !operator.is_template => Some(operator),
            _ => None,
        }
    }
}

/// All classes known to a query, keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassTable {
    pub classes: HashMap<String, ClassDecl>,
}

impl ClassTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, class: ClassDecl) {
        self.classes.insert(class.name.clone(), class);
    }

    pub fn with(mut self, class: ClassDecl) -> Self {
        self.insert(class);
        self
    }

    pub fn extend(&mut self, other: ClassTable) {
        self.classes.extend(other.classes);
    }

    pub fn get(&self, name: &str) -> Option<&ClassDecl> {
        self.classes.get(name)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Call operators visible in the class `name`: its own declarations and
    /// those named by `using base::operator();`, or else those found through
    /// its base classes. `None` if the class is unknown or the lookup is
    /// ambiguous between different bases.
    pub fn call_operators(&self, name: &str) -> Option<Vec<&CallOperator>> {
        self.lookup_call_operators(name, &mut Vec::new())
    }

    fn lookup_call_operators<'a>(
        &'a self,
        name: &str,
        seen: &mut Vec<&'a str>,
    ) -> Option<Vec<&'a CallOperator>> {
        let class = self.get(name)?;
        if seen.contains(&class.name.as_str()) {
            return Some(Vec::new());
        }
        seen.push(&class.name);

        let mut declared: Vec<&CallOperator> = class.call_operators.iter().collect();
        for base in &class.using_call_operators {
            if self.get(base).is_some() {
                declared.extend(self.lookup_call_operators(base, seen)?);
            }
        }
        if !declared.is_empty() || !class.using_call_operators.is_empty() {
            return Some(declared);
        }

        let mut found: Option<Vec<&'a CallOperator>> = None;
        for base in &class.bases {
            if self.get(base).is_none() {
                continue;
            }
            let inherited = self.lookup_call_operators(base, seen)?;
            if inherited.is_empty() {
                continue;
            }
            match &found {
                // the same declarations reached along two paths
                Some(existing) if same_declarations(existing, &inherited) => {}
                Some(_) => return None,
                None => found = Some(inherited),
            }
        }
        Some(found.unwrap_or_default())
    }

    /// The call operator visible in `name`, if there is exactly one and it
    /// is not a template.
    pub fn single_call_operator(&self, name: &str) -> Option<&CallOperator> {
        match self.call_operators(name)?.as_slice() {
            [operator] if !operator.is_template => Some(*operator),
            _ => None,
        }
    }

    /// True if `derived` is `base` or inherits from it, directly or not.
    pub fn is_same_or_derived(&self, derived: &str, base: &str) -> bool {
        let mut pending = vec![derived];
        let mut seen = Vec::new();
        while let Some(name) = pending.pop() {
            if name == base {
                return true;
            }
            if seen.contains(&name) {
                continue;
            }
            seen.push(name);
            if let Some(class) = self.get(name) {
                pending.extend(class.bases.iter().map(String::as_str));
            }
        }
        false
    }
}

fn same_declarations(a: &[&CallOperator], b: &[&CallOperator]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| std::ptr::eq(*x, *y))
}

// ============================================================================
// Domain Failures
// ============================================================================

/// Why a transformation rejected its input. Each reason is a fixed string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum DomainFailure {
    #[error("member qualifiers are illegal for this type")]
    MemberQualifiersIllegal,

    #[error("varargs are illegal for this type")]
    VarargsIllegal,

    #[error("noexcept is illegal for this type")]
    NoexceptIllegal,

    #[error("transaction_safe is illegal for this type")]
    TransactionSafeIllegal,

    #[error("calling conventions are illegal for this type")]
    CallingConventionIllegal,

    #[error("cannot determine parameters for this type")]
    ParameterListIllegal,

    #[error("index {index} out of range for parameter list of length {arity}")]
    ParameterIndexOutOfRange { index: usize, arity: usize },

    #[error("type is not a member pointer")]
    MemberPointerRequired,

    #[error("cannot form a member pointer to this type")]
    MemberPointerIllegal,

    #[error("cannot determine return type for this type")]
    ReturnTypeIllegal,

    #[error("cannot determine the function type of this type")]
    FunctionTypeRequired,
}

/// Outcome of every transformation.
pub type TransformationResult = Result<Type, DomainFailure>;

// ============================================================================
// Query Protocol
// ============================================================================

/// A request to evaluate one query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Unique request ID for correlating responses
    pub id: u64,
    /// Class declarations the query may refer to, in C++ syntax
    #[serde(default)]
    pub declarations: Option<String>,
    /// The query to execute
    pub query: Query,
}

/// Every query and transformation, over types spelled in C++ syntax.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Query {
    Classify { ty: String },
    Signature { ty: String },
    Arity { ty: String },
    MinArity { ty: String },
    MaxArity { ty: String },
    Args { ty: String },
    ArgAt { ty: String, index: usize },
    ReturnType { ty: String },
    Predicate { ty: String, predicate: Predicate },
    CallingConvention { ty: String },
    ClassOf { ty: String },
    QualifiedClassOf { ty: String },
    FunctionType { ty: String },
    InvokeFunctionType { ty: String },
    CanInvoke { ty: String, args: Vec<String> },
    Transform { ty: String, transform: Transform },
}

/// Boolean queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    IsCallable,
    HasVoidReturn,
    HasVarargs,
    IsConstQualified,
    IsVolatileQualified,
    IsCvQualified,
    IsReferenceQualified,
    IsLvalueQualified,
    IsRvalueQualified,
    IsNoexcept,
    IsTransactionSafe,
    IsConstexpr,
}

impl Predicate {
    pub const ALL: [Predicate; 12] = [
        Predicate::IsCallable,
        Predicate::HasVoidReturn,
        Predicate::HasVarargs,
        Predicate::IsConstQualified,
        Predicate::IsVolatileQualified,
        Predicate::IsCvQualified,
        Predicate::IsReferenceQualified,
        Predicate::IsLvalueQualified,
        Predicate::IsRvalueQualified,
        Predicate::IsNoexcept,
        Predicate::IsTransactionSafe,
        Predicate::IsConstexpr,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Predicate::IsCallable => "is_callable",
            Predicate::HasVoidReturn => "has_void_return",
            Predicate::HasVarargs => "has_varargs",
            Predicate::IsConstQualified => "is_const_qualified",
            Predicate::IsVolatileQualified => "is_volatile_qualified",
            Predicate::IsCvQualified => "is_cv_qualified",
            Predicate::IsReferenceQualified => "is_reference_qualified",
            Predicate::IsLvalueQualified => "is_lvalue_qualified",
            Predicate::IsRvalueQualified => "is_rvalue_qualified",
            Predicate::IsNoexcept => "is_noexcept",
            Predicate::IsTransactionSafe => "is_transaction_safe",
            Predicate::IsConstexpr => "is_constexpr",
        }
    }
}

impl FromStr for Predicate {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().replace('-', "_");
        Predicate::ALL
            .into_iter()
            .find(|p| p.name() == wanted)
            .ok_or_else(|| ProtocolError::UnknownPredicate(s.to_string()))
    }
}

/// Transformations, with their arguments spelled in C++ syntax.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Transform {
    AddMemberConst,
    RemoveMemberConst,
    AddMemberVolatile,
    RemoveMemberVolatile,
    AddMemberCv,
    RemoveMemberCv,
    AddMemberLvalueReference,
    AddMemberRvalueReference,
    RemoveMemberReference,
    AddNoexcept,
    RemoveNoexcept,
    AddTransactionSafe,
    RemoveTransactionSafe,
    AddVarargs,
    RemoveVarargs,
    WithCallingConvention { convention: CallingConvention },
    AddMemberPointer { owner: String },
    RemoveMemberPointer,
    RemoveAt { index: usize },
    RemoveArgs { index: usize, count: usize },
    InsertArgs { index: usize, args: Vec<String> },
    PushFront { args: Vec<String> },
    PushBack { args: Vec<String> },
    PopFront { count: usize },
    PopBack { count: usize },
    ReplaceArgs { index: usize, args: Vec<String> },
    SwapArgs { first: usize, second: usize },
    ClearArgs,
    ApplyReturn { ty: String },
    DecayToPlainFunctionType,
}

impl FromStr for Transform {
    type Err = ProtocolError;

    /// Parse the call-like form used on the command line and in macros:
    /// `remove_at(2)`, `push_back(int, char*)`, `add_member_pointer(foo)`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (name, args) = match s.find('(') {
            Some(open) if s.ends_with(')') => {
                (&s[..open], split_top_level(&s[open + 1..s.len() - 1]))
            }
            Some(_) => return Err(ProtocolError::MalformedTransform(s.to_string())),
            None => (s, Vec::new()),
        };
        let name = name.trim().replace('-', "_");

        let index = |i: usize| -> Result<usize, ProtocolError> {
            args.get(i)
                .ok_or_else(|| ProtocolError::MissingArgument(name.clone()))?
                .parse()
                .map_err(|_| ProtocolError::MalformedTransform(s.to_string()))
        };
        let count_or_one = || -> Result<usize, ProtocolError> {
            if args.is_empty() { Ok(1) } else { index(0) }
        };
        let one_arg = || -> Result<String, ProtocolError> {
            match args.as_slice() {
                [arg] => Ok(arg.clone()),
                _ => Err(ProtocolError::MissingArgument(name.clone())),
            }
        };

        let transform = match name.as_str() {
            "add_member_const" => Transform::AddMemberConst,
            "remove_member_const" => Transform::RemoveMemberConst,
            "add_member_volatile" => Transform::AddMemberVolatile,
            "remove_member_volatile" => Transform::RemoveMemberVolatile,
            "add_member_cv" => Transform::AddMemberCv,
            "remove_member_cv" => Transform::RemoveMemberCv,
            "add_member_lvalue_reference" => Transform::AddMemberLvalueReference,
            "add_member_rvalue_reference" => Transform::AddMemberRvalueReference,
            "remove_member_reference" => Transform::RemoveMemberReference,
            "add_noexcept" => Transform::AddNoexcept,
            "remove_noexcept" => Transform::RemoveNoexcept,
            "add_transaction_safe" => Transform::AddTransactionSafe,
            "remove_transaction_safe" => Transform::RemoveTransactionSafe,
            "add_varargs" => Transform::AddVarargs,
            "remove_varargs" => Transform::RemoveVarargs,
            "with_calling_convention" => {
                let word = one_arg()?;
                let convention = CallingConvention::from_keyword(&word)
                    .ok_or(ProtocolError::UnknownCallingConvention(word))?;
                Transform::WithCallingConvention { convention }
            }
            "add_member_pointer" => Transform::AddMemberPointer { owner: one_arg()? },
            "remove_member_pointer" => Transform::RemoveMemberPointer,
            "remove_at" | "remove_parameter_at" => Transform::RemoveAt { index: index(0)? },
            "remove_args" => Transform::RemoveArgs {
                index: index(0)?,
                count: if args.len() > 1 { index(1)? } else { 1 },
            },
            "insert_args" => Transform::InsertArgs {
                index: index(0)?,
                args: args[1..].to_vec(),
            },
            "push_front" => Transform::PushFront { args: args.clone() },
            "push_back" => Transform::PushBack { args: args.clone() },
            "pop_front" => Transform::PopFront {
                count: count_or_one()?,
            },
            "pop_back" => Transform::PopBack {
                count: count_or_one()?,
            },
            "replace_args" => Transform::ReplaceArgs {
                index: index(0)?,
                args: args[1..].to_vec(),
            },
            "swap_args" => Transform::SwapArgs {
                first: index(0)?,
                second: index(1)?,
            },
            "clear_args" => Transform::ClearArgs,
            "apply_return" => Transform::ApplyReturn { ty: one_arg()? },
            "decay_to_plain_function_type" | "function_type" => {
                Transform::DecayToPlainFunctionType
            }
            _ => return Err(ProtocolError::UnknownTransform(name)),
        };
        Ok(transform)
    }
}

/// Split a comma separated list, ignoring commas nested in `()`, `<>`, `[]`.
/// The `>` of a trailing return arrow `->` closes nothing.
pub fn split_top_level(list: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut current = String::new();
    let mut previous = None;
    for ch in list.chars() {
        let after_minus = previous == Some('-');
        previous = Some(ch);
        match ch {
            '(' | '<' | '[' => depth += 1,
            '>' if after_minus => {}
            ')' | '>' | ']' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(current.trim().to_string());
                current.clear();
                continue;
            }
            _ => {}
        }
        current.push(ch);
    }
    if !current.trim().is_empty() || !parts.is_empty() {
        parts.push(current.trim().to_string());
    }
    parts
}

/// Errors decoding the textual forms of protocol values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("unknown predicate `{0}`")]
    UnknownPredicate(String),

    #[error("unknown transformation `{0}`")]
    UnknownTransform(String),

    #[error("malformed transformation `{0}`")]
    MalformedTransform(String),

    #[error("missing argument for `{0}`")]
    MissingArgument(String),

    #[error("unknown calling convention `{0}`")]
    UnknownCallingConvention(String),
}

/// A response to a [`Request`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// The request ID this response corresponds to
    pub id: u64,
    /// The result of the query
    pub result: QueryResult,
}

/// The result of a query execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum QueryResult {
    /// Query executed successfully
    Success { data: QueryData },
    /// Query failed with an error
    Error { message: String },
}

/// Data returned from successful queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueryData {
    /// Response to Classify
    Shape { shape: CallableShape },
    /// Response to Signature
    Signature(SignatureSummary),
    /// Response to the arity queries
    Count { value: usize },
    /// Response to Predicate and CanInvoke
    Bool { value: bool },
    /// Response to queries and transformations producing a single type
    Type { ty: String },
    /// Response to Args
    Types { types: Vec<String> },
    /// Response to CallingConvention
    CallingConvention { convention: CallingConvention },
}

impl fmt::Display for QueryData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryData::Shape { shape } => write!(f, "{shape}"),
            QueryData::Signature(summary) => {
                write!(
                    f,
                    "{} ({}) -> {} [arity {}..={}]{}",
                    summary.shape,
                    summary.params.join(", "),
                    summary.return_type,
                    summary.min_arity,
                    summary.max_arity,
                    summary.qualifiers.suffix()
                )
            }
            QueryData::Count { value } => write!(f, "{value}"),
            QueryData::Bool { value } => write!(f, "{value}"),
            QueryData::Type { ty } => f.write_str(ty),
            QueryData::Types { types } => write!(f, "({})", types.join(", ")),
            QueryData::CallingConvention { convention } => write!(f, "{convention}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_top_level() {
        assert_eq!(
            split_top_level("int, std::tuple<int, char>, void(*)(int, int)"),
            vec!["int", "std::tuple<int, char>", "void(*)(int, int)"]
        );
        assert!(split_top_level("").is_empty());
        assert_eq!(split_top_level("int"), vec!["int"]);
        assert_eq!(
            split_top_level("auto() -> int, std::function<auto(int) -> void>, char"),
            vec!["auto() -> int", "std::function<auto(int) -> void>", "char"]
        );
    }

    #[test]
    fn test_transform_from_str() {
        assert_eq!(
            "remove_at(2)".parse::<Transform>().unwrap(),
            Transform::RemoveAt { index: 2 }
        );
        assert_eq!(
            "push_back(int, N<1, 2>)".parse::<Transform>().unwrap(),
            Transform::PushBack {
                args: vec!["int".to_string(), "N<1, 2>".to_string()]
            }
        );
        assert_eq!(
            "add_member_rvalue_reference".parse::<Transform>().unwrap(),
            Transform::AddMemberRvalueReference
        );
        assert_eq!(
            "pop_front".parse::<Transform>().unwrap(),
            Transform::PopFront { count: 1 }
        );
        assert_eq!(
            "with_calling_convention(__stdcall)".parse::<Transform>().unwrap(),
            Transform::WithCallingConvention {
                convention: CallingConvention::Stdcall
            }
        );
        assert_eq!(
            "apply_return(auto(*)() -> int)".parse::<Transform>().unwrap(),
            Transform::ApplyReturn {
                ty: "auto(*)() -> int".to_string()
            }
        );
        assert_eq!(
            "push_back(auto() -> int, char)".parse::<Transform>().unwrap(),
            Transform::PushBack {
                args: vec!["auto() -> int".to_string(), "char".to_string()]
            }
        );
        assert!(matches!(
            "frobnicate".parse::<Transform>(),
            Err(ProtocolError::UnknownTransform(_))
        ));
        assert!(matches!(
            "remove_at(x)".parse::<Transform>(),
            Err(ProtocolError::MalformedTransform(_))
        ));
        assert!(matches!(
            "add_member_pointer".parse::<Transform>(),
            Err(ProtocolError::MissingArgument(_))
        ));
    }

    #[test]
    fn test_predicate_from_str() {
        assert_eq!(
            "is-const-qualified".parse::<Predicate>().unwrap(),
            Predicate::IsConstQualified
        );
        for predicate in Predicate::ALL {
            assert_eq!(predicate.name().parse::<Predicate>().unwrap(), predicate);
        }
        assert!("is_awesome".parse::<Predicate>().is_err());
    }

    #[test]
    fn test_class_table_inheritance() {
        let table = ClassTable::new()
            .with(ClassDecl::new("base"))
            .with(ClassDecl::new("middle").with_base("base"))
            .with(ClassDecl::new("derived").with_base("middle"));
        assert!(table.is_same_or_derived("derived", "base"));
        assert!(table.is_same_or_derived("base", "base"));
        assert!(!table.is_same_or_derived("base", "derived"));
        assert!(!table.is_same_or_derived("unknown", "base"));
    }

    #[test]
    fn test_inherited_call_operators() {
        let operator = |param: &str| {
            CallOperator::new(FunctionType::new(Type::void(), vec![Type::named(param)]))
        };
        let table = ClassTable::new()
            .with(ClassDecl::new("base").with_call_operator(operator("int")))
            .with(ClassDecl::new("other").with_call_operator(operator("long")))
            .with(ClassDecl::new("derived").with_base("base"))
            .with(ClassDecl::new("grandchild").with_base("derived"))
            .with(
                ClassDecl::new("hiding")
                    .with_base("base")
                    .with_call_operator(operator("char")),
            )
            .with(ClassDecl::new("left").with_base("base"))
            .with(ClassDecl::new("right").with_base("base"))
            .with(ClassDecl::new("diamond").with_base("left").with_base("right"))
            .with(ClassDecl::new("both").with_base("base").with_base("other"))
            .with(ClassDecl::new("opaque").with_base("undeclared"))
            .with(ClassDecl::new("loop_a").with_base("loop_b"))
            .with(ClassDecl::new("loop_b").with_base("loop_a"));

        let params = |name: &str| {
            table
                .single_call_operator(name)
                .map(|operator| operator.function.params[0].clone())
        };
        assert_eq!(params("base"), Some(Type::named("int")));
        assert_eq!(params("derived"), Some(Type::named("int")));
        assert_eq!(params("grandchild"), Some(Type::named("int")));
        assert_eq!(params("hiding"), Some(Type::named("char")));
        assert_eq!(params("diamond"), Some(Type::named("int")));

        assert!(table.call_operators("both").is_none());
        assert_eq!(table.call_operators("opaque"), Some(Vec::new()));
        assert_eq!(table.call_operators("loop_a"), Some(Vec::new()));
        assert!(table.call_operators("unknown").is_none());

        let mut merging = ClassDecl::new("merging")
            .with_base("base")
            .with_base("other")
            .with_call_operator(operator("char"));
        merging.using_call_operators = vec!["base".to_string(), "other".to_string()];
        let table = table.with(merging);
        let visible = table.call_operators("merging").unwrap();
        assert_eq!(visible.len(), 3);
        assert!(table.single_call_operator("merging").is_none());
    }

    #[test]
    fn test_signature_arity_bounds() {
        let signature = Signature {
            return_type: Type::void(),
            params: vec![Type::named("int"), Type::named("int")],
            qualifiers: QualifierSet::default(),
            shape: CallableShape::FreeFunction,
            min_arity: 1,
            max_arity: 2,
        };
        assert!(!signature.accepts_arity(0));
        assert!(signature.accepts_arity(1));
        assert!(signature.accepts_arity(2));
        assert!(!signature.accepts_arity(3));
    }

    #[test]
    fn test_query_serialization() {
        let query = Query::Transform {
            ty: "int(foo::*)() &".to_string(),
            transform: Transform::AddMemberRvalueReference,
        };
        let json = serde_json::to_string(&query).unwrap();
        let parsed: Query = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, query);
    }

    #[test]
    fn test_response_serialization() {
        let response = Response {
            id: 42,
            result: QueryResult::Success {
                data: QueryData::Shape {
                    shape: CallableShape::MemberFunctionPointer {
                        owner: Type::named("foo"),
                    },
                },
            },
        };
        let json = serde_json::to_string(&response).unwrap();
        let parsed: Response = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.id, 42);
        assert_eq!(parsed.result, response.result);
    }

    #[test]
    fn test_class_table_from_json() {
        let json = r#"{
            "classes": {
                "foo": {
                    "name": "foo",
                    "call_operators": [{
                        "function": {
                            "return_type": { "kind": "named", "name": "void" },
                            "params": [{ "kind": "named", "name": "int" }],
                            "qualifiers": {
                                "is_const": true, "is_volatile": false,
                                "ref_qualifier": "none", "is_noexcept": false,
                                "is_transaction_safe": false, "is_variadic": false,
                                "calling_convention": "default"
                            }
                        },
                        "default_args": 0,
                        "is_constexpr": false,
                        "is_template": false
                    }]
                }
            }
        }"#;
        let table: ClassTable = serde_json::from_str(json).unwrap();
        let foo = table.get("foo").unwrap();
        assert!(foo.is_literal);
        assert!(foo.bases.is_empty());
        assert!(foo.single_call_operator().unwrap().function.qualifiers.is_const);
    }
}
