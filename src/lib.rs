//! # callable-traits - Classify, Query and Transform C++ Callable Types
//!
//! callable-traits models C++ function types, pointers and references to
//! functions, member function pointers and function objects, and answers the
//! questions a type-traits library would: what shape a callable has, what its
//! signature is, which qualifiers it carries, and whether it can be invoked
//! with a given list of argument types. Transformations add or remove member
//! qualifiers, `noexcept`, `transaction_safe`, C varargs and calling
//! conventions, or rewrite the parameter list, failing with a descriptive
//! [`DomainFailure`] when the input has no such form.
//!
//! ## Quick Start
//!
//! ```
//! use callable_traits::{parse_declarations, parse_type, queries, transform};
//!
//! let classes = parse_declarations(
//!     "struct foo { void operator()(int, int&&, const int&, void* = nullptr) const {} };",
//! )
//! .unwrap();
//! let foo = parse_type("foo").unwrap();
//! assert_eq!(queries::max_arity(&foo, &classes).unwrap(), 4);
//! assert_eq!(queries::min_arity(&foo, &classes).unwrap(), 3);
//!
//! let f = parse_type("int(foo::*)(char, long)").unwrap();
//! let g = transform::add_member_rvalue_reference(&f).unwrap();
//! assert_eq!(g.to_string(), "int(foo::*)(char, long) &&");
//! ```
//!
//! ### Compile-time Macros
//!
//! ```ignore
//! use callable_traits::{callable_arity, callable_transform};
//!
//! const ARITY: usize = callable_arity!("void(int, char)");
//! const F: &str = callable_transform!("remove_at(0)", "void(int, char)");
//! ```
//!
//! ## Architecture
//!
//! - **[`callable_traits_types`]**: type model, qualifier algebra and the
//!   JSON request/response protocol
//! - **[`callable_traits_query`]**: C++ declaration parser, classifier,
//!   signature extraction, queries, transformations and `INVOKE` resolution
//! - **[`callable_traits_macros`]**: proc-macros answering queries at compile
//!   time
//! - **`callable-traits-cli`**: the `callable-traits` binary, one-shot or
//!   serving JSON lines on stdin
//!
//! ## Features
//!
//! - `value-shorthand` (default): the value-level `*_v` functions in
//!   [`shorthand`]. Without it they answer [`Shorthand::Unsupported`].

// Re-export the query engine
pub use callable_traits_query::{
    Error, Result, apply_transform, call_operator, can_invoke, classify, execute_query,
    handle_json_line, handle_request, parse_declarations, parse_query, parse_type,
    parse_type_list, queries, shorthand, signature, transform,
};
pub use callable_traits_query::shorthand::Shorthand;

// Re-export the built-in proc-macros
pub use callable_traits_macros::{
    callable_arg_at, callable_arity, callable_can_invoke, callable_is, callable_max_arity,
    callable_min_arity, callable_return_type, callable_transform,
};

// Re-export the model and protocol types
pub use callable_traits_types::{
    CallOperator, CallableShape, CallingConvention, ClassDecl, ClassTable, Cv, DomainFailure,
    FunctionType, Predicate, ProtocolError, QualifierSet, Query, QueryData, QueryResult,
    RefQualifier, Request, Response, Signature, SignatureSummary, Transform,
    TransformationResult, Type,
};
