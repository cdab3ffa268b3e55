//! Callable-traits query engine.
//!
//! This crate parses C++ type spellings and class declarations into the
//! model from `callable-traits-types`, then answers questions about them:
//! classification, signature extraction, qualifier and parameter
//! transformations, and invocability.
//!
//! ```
//! use callable_traits_query::{parse_type, transform};
//!
//! let ty = parse_type("void(int, char, long)").unwrap();
//! let removed = transform::remove_at(&ty, 1).unwrap();
//! assert_eq!(removed.to_string(), "void(int, long)");
//! ```

pub mod classify;
pub mod error;
pub mod invoke;
pub mod parse;
pub mod queries;
pub mod shorthand;
pub mod signature;
pub mod transform;

pub use callable_traits_types::*;
pub use classify::classify;
pub use error::{Error, Result};
pub use invoke::can_invoke;
pub use parse::{parse_declarations, parse_type, parse_type_list};
pub use shorthand::Shorthand;
pub use signature::{call_operator, signature};

// ============================================================================
// Query Parsing
// ============================================================================

/// Build a [`Query`] from its name, the type it applies to, and any extra
/// arguments.
///
/// Predicates and transformations are addressed by name too, so
/// `("is_noexcept", "void()", [])` and `("remove_at", "void(int)", ["0"])`
/// are both valid.
pub fn parse_query(name: &str, ty: &str, args: &[String]) -> Result<Query> {
    let ty = ty.trim().to_string();
    let name = name.trim();

    let query = match name {
        "classify" => Query::Classify { ty },
        "signature" => Query::Signature { ty },
        "arity" => Query::Arity { ty },
        "min_arity" => Query::MinArity { ty },
        "max_arity" => Query::MaxArity { ty },
        "args" => Query::Args { ty },
        "arg_at" => {
            let index = match args {
                [index] => index
                    .trim()
                    .parse()
                    .map_err(|_| ProtocolError::MalformedTransform(format!("arg_at({index})")))?,
                _ => return Err(ProtocolError::MissingArgument(name.to_string()).into()),
            };
            Query::ArgAt { ty, index }
        }
        "return_type" | "result_of" => Query::ReturnType { ty },
        "calling_convention" => Query::CallingConvention { ty },
        "class_of" => Query::ClassOf { ty },
        "qualified_class_of" => Query::QualifiedClassOf { ty },
        "function_type" => Query::FunctionType { ty },
        "invoke_function_type" => Query::InvokeFunctionType { ty },
        "can_invoke" => Query::CanInvoke {
            ty,
            args: args.iter().flat_map(|arg| split_top_level(arg)).collect(),
        },
        _ => {
            if let Ok(predicate) = name.parse::<Predicate>() {
                return Ok(Query::Predicate { ty, predicate });
            }
            let call = format!("{name}({})", args.join(", "));
            match call.parse::<Transform>() {
                Ok(transform) => Query::Transform { ty, transform },
                Err(ProtocolError::UnknownTransform(_)) => {
                    return Err(Error::UnknownQuery(name.to_string()));
                }
                Err(e) => return Err(e.into()),
            }
        }
    };

    Ok(query)
}

// ============================================================================
// Query Execution
// ============================================================================

/// Execute a query against a set of class declarations.
pub fn execute_query(query: &Query, classes: &ClassTable) -> QueryResult {
    match evaluate(query, classes) {
        Ok(data) => QueryResult::Success { data },
        Err(e) => {
            log::debug!("query {query:?} failed: {e}");
            QueryResult::Error {
                message: e.to_string(),
            }
        }
    }
}

fn evaluate(query: &Query, classes: &ClassTable) -> Result<QueryData> {
    let data = match query {
        Query::Classify { ty } => QueryData::Shape {
            shape: classify(&parse_type(ty)?, classes),
        },

        Query::Signature { ty } => {
            QueryData::Signature(signature(&parse_type(ty)?, classes)?.summary())
        }

        Query::Arity { ty } => QueryData::Count {
            value: queries::arity(&parse_type(ty)?, classes)?,
        },

        Query::MinArity { ty } => QueryData::Count {
            value: queries::min_arity(&parse_type(ty)?, classes)?,
        },

        Query::MaxArity { ty } => QueryData::Count {
            value: queries::max_arity(&parse_type(ty)?, classes)?,
        },

        Query::Args { ty } => QueryData::Types {
            types: queries::args(&parse_type(ty)?, classes)?
                .iter()
                .map(Type::to_string)
                .collect(),
        },

        Query::ArgAt { ty, index } => type_data(queries::arg_at(&parse_type(ty)?, classes, *index)?),

        Query::ReturnType { ty } => type_data(queries::return_type(&parse_type(ty)?, classes)?),

        Query::Predicate { ty, predicate } => QueryData::Bool {
            value: queries::predicate(&parse_type(ty)?, classes, *predicate),
        },

        Query::CallingConvention { ty } => QueryData::CallingConvention {
            convention: queries::calling_convention(&parse_type(ty)?, classes)?,
        },

        Query::ClassOf { ty } => type_data(queries::class_of(&parse_type(ty)?)?),

        Query::QualifiedClassOf { ty } => type_data(queries::qualified_class_of(&parse_type(ty)?)?),

        Query::FunctionType { ty } => type_data(queries::function_type(&parse_type(ty)?, classes)?),

        Query::InvokeFunctionType { ty } => {
            type_data(queries::invoke_function_type(&parse_type(ty)?, classes)?)
        }

        Query::CanInvoke { ty, args } => {
            let args = args
                .iter()
                .map(|arg| parse_type(arg))
                .collect::<Result<Vec<_>>>()?;
            QueryData::Bool {
                value: can_invoke(&parse_type(ty)?, &args, classes),
            }
        }

        Query::Transform { ty, transform } => {
            type_data(apply_transform(&parse_type(ty)?, transform, classes)?)
        }
    };

    Ok(data)
}

fn type_data(ty: Type) -> QueryData {
    QueryData::Type { ty: ty.to_string() }
}

/// Apply a [`Transform`], parsing any type arguments it carries.
pub fn apply_transform(ty: &Type, op: &Transform, classes: &ClassTable) -> Result<Type> {
    let types = |args: &[String]| -> Result<Vec<Type>> {
        args.iter().map(|arg| parse_type(arg)).collect()
    };

    let result = match op {
        Transform::AddMemberConst => transform::add_member_const(ty),
        Transform::RemoveMemberConst => transform::remove_member_const(ty),
        Transform::AddMemberVolatile => transform::add_member_volatile(ty),
        Transform::RemoveMemberVolatile => transform::remove_member_volatile(ty),
        Transform::AddMemberCv => transform::add_member_cv(ty),
        Transform::RemoveMemberCv => transform::remove_member_cv(ty),
        Transform::AddMemberLvalueReference => transform::add_member_lvalue_reference(ty),
        Transform::AddMemberRvalueReference => transform::add_member_rvalue_reference(ty),
        Transform::RemoveMemberReference => transform::remove_member_reference(ty),
        Transform::AddNoexcept => transform::add_noexcept(ty),
        Transform::RemoveNoexcept => transform::remove_noexcept(ty),
        Transform::AddTransactionSafe => transform::add_transaction_safe(ty),
        Transform::RemoveTransactionSafe => transform::remove_transaction_safe(ty),
        Transform::AddVarargs => transform::add_varargs(ty),
        Transform::RemoveVarargs => transform::remove_varargs(ty),
        Transform::WithCallingConvention { convention } => {
            transform::with_calling_convention(ty, *convention)
        }
        Transform::AddMemberPointer { owner } => {
            transform::add_member_pointer(ty, &parse_type(owner)?)
        }
        Transform::RemoveMemberPointer => transform::remove_member_pointer(ty),
        Transform::RemoveAt { index } => transform::remove_at(ty, *index),
        Transform::RemoveArgs { index, count } => transform::remove_args(ty, *index, *count),
        Transform::InsertArgs { index, args } => transform::insert_args(ty, *index, &types(args)?),
        Transform::PushFront { args } => transform::push_front(ty, &types(args)?),
        Transform::PushBack { args } => transform::push_back(ty, &types(args)?),
        Transform::PopFront { count } => transform::pop_front(ty, *count),
        Transform::PopBack { count } => transform::pop_back(ty, *count),
        Transform::ReplaceArgs { index, args } => {
            transform::replace_args(ty, *index, &types(args)?)
        }
        Transform::SwapArgs { first, second } => transform::swap_args(ty, *first, *second),
        Transform::ClearArgs => transform::clear_args(ty),
        Transform::ApplyReturn { ty: return_type } => {
            transform::apply_return(ty, &parse_type(return_type)?)
        }
        Transform::DecayToPlainFunctionType => transform::decay_to_plain_function_type(ty, classes),
    };

    Ok(result?)
}

// ============================================================================
// Request Handling
// ============================================================================

/// Answer a [`Request`].
///
/// Classes declared in the request are added to `known`, replacing any
/// class of the same name.
pub fn handle_request(request: Request, known: &ClassTable) -> Response {
    let result = match request.declarations.as_deref() {
        Some(source) => match parse_declarations(source) {
            Ok(declared) => {
                let mut classes = known.clone();
                classes.extend(declared);
                execute_query(&request.query, &classes)
            }
            Err(e) => QueryResult::Error {
                message: format!("invalid declarations: {e}"),
            },
        },
        None => execute_query(&request.query, known),
    };

    Response {
        id: request.id,
        result,
    }
}

/// Answer one JSON-encoded [`Request`] with a JSON-encoded [`Response`].
///
/// A line that is not a valid request still gets a response, with id 0.
pub fn handle_json_line(line: &str, known: &ClassTable) -> serde_json::Result<String> {
    let response = match serde_json::from_str::<Request>(line) {
        Ok(request) => {
            log::debug!("request {}: {:?}", request.id, request.query);
            handle_request(request, known)
        }
        Err(e) => Response {
            id: 0,
            result: QueryResult::Error {
                message: format!("malformed request: {e}"),
            },
        },
    };
    serde_json::to_string(&response)
}
