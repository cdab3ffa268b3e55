//! Signature extraction.

use callable_traits_types::{
    CallOperator, CallableShape, ClassTable, FunctionType, Signature, Type,
};

use crate::classify::{classify, function_of, object_class};
use crate::{Error, Result};

/// Extract the full signature of a callable type.
///
/// Function-bearing shapes (including abominable function types) report
/// their function type verbatim. Function objects report their single call
/// operator, with `min_arity` excluding parameters that have a default
/// argument.
pub fn signature(ty: &Type, classes: &ClassTable) -> Result<Signature> {
    let shape = classify(ty, classes);

    let signature = match shape {
        CallableShape::NotCallable => return Err(not_callable(ty, classes)),
        CallableShape::FunctionObject { ref class } => {
            let operator = call_operator(class, classes)?;
            from_function(&operator.function, operator.min_arity(), shape.clone())
        }
        shape => {
            let function = function_of(ty).ok_or_else(|| Error::NotCallable {
                ty: ty.to_string(),
            })?;
            from_function(function, function.params.len(), shape)
        }
    };

    log::debug!(
        "signature of `{ty}`: {} params, arity {}..={}",
        signature.params.len(),
        signature.min_arity,
        signature.max_arity
    );
    Ok(signature)
}

/// The unique, non-template call operator of `class`, declared in the class
/// itself or inherited from a base.
pub fn call_operator<'a>(class: &str, classes: &'a ClassTable) -> Result<&'a CallOperator> {
    let not_callable = || Error::NotCallable {
        ty: class.to_string(),
    };
    classes.get(class).ok_or_else(not_callable)?;
    let operators = classes
        .call_operators(class)
        .ok_or_else(|| Error::AmbiguousBaseLookup {
            class: class.to_string(),
        })?;
    match operators.as_slice() {
        [] => Err(not_callable()),
        [operator] if !operator.is_template => Ok(*operator),
        operators => Err(Error::AmbiguousCallOperator {
            class: class.to_string(),
            count: operators.len(),
        }),
    }
}

fn from_function(function: &FunctionType, min_arity: usize, shape: CallableShape) -> Signature {
    Signature {
        return_type: function.return_type.as_ref().clone(),
        params: function.params.clone(),
        qualifiers: function.qualifiers,
        shape,
        min_arity,
        max_arity: function.params.len(),
    }
}

/// Explain why a type that classified as not callable has no signature.
fn not_callable(ty: &Type, classes: &ClassTable) -> Error {
    match object_class(ty).map(|name| call_operator(name, classes)) {
        Some(Err(
            error @ (Error::AmbiguousCallOperator { .. } | Error::AmbiguousBaseLookup { .. }),
        )) => error,
        _ => Error::NotCallable { ty: ty.to_string() },
    }
}
