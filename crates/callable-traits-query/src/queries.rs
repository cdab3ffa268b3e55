//! Queries over callable types.
//!
//! Queries that need a signature return [`Result`]. Boolean predicates are
//! total: a type with no signature simply answers `false`.

use callable_traits_types::{
    CallableShape, CallingConvention, ClassTable, Cv, DomainFailure, FunctionType, Predicate,
    RefQualifier, Signature, Type,
};

use crate::classify::object_class;
use crate::signature::signature;
use crate::transform::decay_to_plain_function_type;
use crate::{Error, Result};

// ============================================================================
// Arity and Parameters
// ============================================================================

/// Number of declared parameters.
pub fn arity(ty: &Type, classes: &ClassTable) -> Result<usize> {
    Ok(signature(ty, classes)?.params.len())
}

/// Parameters that must be supplied, excluding ones with default arguments.
pub fn min_arity(ty: &Type, classes: &ClassTable) -> Result<usize> {
    Ok(signature(ty, classes)?.min_arity)
}

pub fn max_arity(ty: &Type, classes: &ClassTable) -> Result<usize> {
    Ok(signature(ty, classes)?.max_arity)
}

/// True if `count` arguments fit the parameter list, ignoring their types.
pub fn arity_accepts(ty: &Type, classes: &ClassTable, count: usize) -> Result<bool> {
    Ok(signature(ty, classes)?.accepts_arity(count))
}

pub fn args(ty: &Type, classes: &ClassTable) -> Result<Vec<Type>> {
    Ok(signature(ty, classes)?.params)
}

pub fn arg_at(ty: &Type, classes: &ClassTable, index: usize) -> Result<Type> {
    let mut params = signature(ty, classes)?.params;
    let arity = params.len();
    if index >= arity {
        return Err(Error::ArgumentIndexOutOfRange { index, arity });
    }
    Ok(params.swap_remove(index))
}

/// The type a call produces (`result_of`).
pub fn return_type(ty: &Type, classes: &ClassTable) -> Result<Type> {
    Ok(signature(ty, classes)?.return_type)
}

// ============================================================================
// Predicates
// ============================================================================

fn test(ty: &Type, classes: &ClassTable, check: impl FnOnce(&Signature) -> bool) -> bool {
    signature(ty, classes).is_ok_and(|signature| check(&signature))
}

pub fn is_callable(ty: &Type, classes: &ClassTable) -> bool {
    test(ty, classes, |_| true)
}

pub fn has_void_return(ty: &Type, classes: &ClassTable) -> bool {
    test(ty, classes, |s| s.return_type.is_void())
}

pub fn has_varargs(ty: &Type, classes: &ClassTable) -> bool {
    test(ty, classes, Signature::has_varargs)
}

pub fn is_const_qualified(ty: &Type, classes: &ClassTable) -> bool {
    test(ty, classes, |s| s.qualifiers.is_const)
}

pub fn is_volatile_qualified(ty: &Type, classes: &ClassTable) -> bool {
    test(ty, classes, |s| s.qualifiers.is_volatile)
}

pub fn is_cv_qualified(ty: &Type, classes: &ClassTable) -> bool {
    test(ty, classes, |s| s.qualifiers.is_const && s.qualifiers.is_volatile)
}

pub fn is_reference_qualified(ty: &Type, classes: &ClassTable) -> bool {
    test(ty, classes, |s| s.qualifiers.ref_qualifier != RefQualifier::None)
}

pub fn is_lvalue_qualified(ty: &Type, classes: &ClassTable) -> bool {
    test(ty, classes, |s| s.qualifiers.ref_qualifier == RefQualifier::Lvalue)
}

pub fn is_rvalue_qualified(ty: &Type, classes: &ClassTable) -> bool {
    test(ty, classes, |s| s.qualifiers.ref_qualifier == RefQualifier::Rvalue)
}

pub fn is_noexcept(ty: &Type, classes: &ClassTable) -> bool {
    test(ty, classes, |s| s.qualifiers.is_noexcept)
}

pub fn is_transaction_safe(ty: &Type, classes: &ClassTable) -> bool {
    test(ty, classes, |s| s.qualifiers.is_transaction_safe)
}

/// True for a function object of a literal class whose call operator is
/// `constexpr`.
pub fn is_constexpr(ty: &Type, classes: &ClassTable) -> bool {
    let Some(name) = object_class(ty) else {
        return false;
    };
    classes.get(name).is_some_and(|decl| decl.is_literal)
        && classes
            .single_call_operator(name)
            .is_some_and(|operator| operator.is_constexpr)
}

/// Evaluate a predicate by name.
pub fn predicate(ty: &Type, classes: &ClassTable, predicate: Predicate) -> bool {
    let check = match predicate {
        Predicate::IsCallable => is_callable,
        Predicate::HasVoidReturn => has_void_return,
        Predicate::HasVarargs => has_varargs,
        Predicate::IsConstQualified => is_const_qualified,
        Predicate::IsVolatileQualified => is_volatile_qualified,
        Predicate::IsCvQualified => is_cv_qualified,
        Predicate::IsReferenceQualified => is_reference_qualified,
        Predicate::IsLvalueQualified => is_lvalue_qualified,
        Predicate::IsRvalueQualified => is_rvalue_qualified,
        Predicate::IsNoexcept => is_noexcept,
        Predicate::IsTransactionSafe => is_transaction_safe,
        Predicate::IsConstexpr => is_constexpr,
    };
    check(ty, classes)
}

pub fn calling_convention(ty: &Type, classes: &ClassTable) -> Result<CallingConvention> {
    Ok(signature(ty, classes)?.qualifiers.calling_convention)
}

// ============================================================================
// Classes and Function Types
// ============================================================================

/// The class of a member pointer: `foo` for `int(foo::*)()` or `int foo::*`.
pub fn class_of(ty: &Type) -> Result<Type> {
    match ty.strip_cv() {
        Type::MemberPointer { class, .. } => Ok(class.as_ref().clone()),
        _ => Err(DomainFailure::MemberPointerRequired.into()),
    }
}

/// The class of a member pointer as the object expression a call needs:
/// the member function's cv applied, and `&&` for rvalue-qualified members
/// (otherwise `&`). Member data pointers give `const foo&`.
pub fn qualified_class_of(ty: &Type) -> Result<Type> {
    let Type::MemberPointer { class, pointee } = ty.strip_cv() else {
        return Err(DomainFailure::MemberPointerRequired.into());
    };
    let class = class.as_ref().clone();
    Ok(match pointee.as_function() {
        Some(function) => object_parameter(class, function),
        None => Type::lvalue_ref(Type::qualified(Cv::CONST, class)),
    })
}

fn object_parameter(class: Type, function: &FunctionType) -> Type {
    let object = Type::qualified(function.qualifiers.cv(), class);
    match function.qualifiers.ref_qualifier {
        RefQualifier::Rvalue => Type::rvalue_ref(object),
        RefQualifier::None | RefQualifier::Lvalue => Type::lvalue_ref(object),
    }
}

/// The plain function type of a callable.
pub fn function_type(ty: &Type, classes: &ClassTable) -> Result<Type> {
    Ok(decay_to_plain_function_type(ty, classes)?)
}

/// The function type of a callable in `INVOKE` form: member function
/// pointers take their object as an explicit first parameter, e.g.
/// `int(foo::*)(char) const` gives `int(const foo&, char)`.
pub fn invoke_function_type(ty: &Type, classes: &ClassTable) -> Result<Type> {
    let signature = signature(ty, classes)?;
    let qualifiers = signature.qualifiers.remove_member_qualifiers();
    let params = match &signature.shape {
        CallableShape::Abominable => return Err(DomainFailure::FunctionTypeRequired.into()),
        CallableShape::MemberFunctionPointer { owner } => {
            let function = FunctionType::new(signature.return_type.clone(), Vec::new())
                .with_qualifiers(signature.qualifiers);
            let mut params = vec![object_parameter(owner.clone(), &function)];
            params.extend(signature.params);
            params
        }
        _ => signature.params,
    };
    Ok(Type::Function(
        FunctionType::new(signature.return_type, params).with_qualifiers(qualifiers),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::{parse_declarations, parse_type};

    fn ty(source: &str) -> Type {
        parse_type(source).unwrap()
    }

    fn classes() -> ClassTable {
        parse_declarations(
            "struct foo { void operator()(int, int&&, const int&, void* = nullptr) const {} };
             struct literal { constexpr int operator()() const { return 1; } };
             struct nonliteral { constexpr int operator()() const; ~nonliteral(); };
             auto x = []() -> int { return 0; };",
        )
        .unwrap()
    }

    #[test]
    fn test_function_object_queries() {
        let classes = classes();
        let foo = ty("foo");
        assert_eq!(arity(&foo, &classes).unwrap(), 4);
        assert_eq!(max_arity(&foo, &classes).unwrap(), 4);
        assert_eq!(min_arity(&foo, &classes).unwrap(), 3);
        assert_eq!(arity(&ty("foo&&"), &classes).unwrap(), 4);
        assert_eq!(arg_at(&foo, &classes, 1).unwrap(), ty("int&&"));
        assert_eq!(
            args(&foo, &classes).unwrap(),
            vec![ty("int"), ty("int&&"), ty("const int&"), ty("void*")]
        );
        assert!(has_void_return(&foo, &classes));
        assert!(!has_varargs(&foo, &classes));
        assert!(is_const_qualified(&foo, &classes));
        assert!(!is_volatile_qualified(&foo, &classes));
        assert!(!is_reference_qualified(&foo, &classes));
        assert!(!is_lvalue_qualified(&foo, &classes));
        assert!(!is_rvalue_qualified(&foo, &classes));
        assert!(!is_constexpr(&foo, &classes));
        assert!(arity_accepts(&foo, &classes, 3).unwrap());
        assert!(!arity_accepts(&foo, &classes, 2).unwrap());
    }

    #[test]
    fn test_arg_at_out_of_range() {
        assert_eq!(
            arg_at(&ty("void(int)"), &ClassTable::new(), 1).unwrap_err(),
            Error::ArgumentIndexOutOfRange { index: 1, arity: 1 }
        );
    }

    #[test]
    fn test_result_of() {
        let classes = classes();
        let sources = ["int()", "int(*)()", "int(&)()", "int() const", "int(foo::*)() const", "x"];
        for source in sources {
            assert_eq!(return_type(&ty(source), &classes).unwrap(), ty("int"), "{source}");
        }
    }

    #[test]
    fn test_is_transaction_safe_table() {
        let classes = ClassTable::new();
        let cases = [
            ("int() transaction_safe", true),
            ("int(*)() transaction_safe", true),
            ("int(&)() transaction_safe", true),
            ("int(foo::*)() const transaction_safe", true),
            ("int()", false),
            ("int(*)()", false),
            ("int(&)()", false),
            ("int(foo::*)() const", false),
            ("int", false),
            ("int*", false),
            ("foo", false),
        ];
        for (source, expected) in cases {
            assert_eq!(is_transaction_safe(&ty(source), &classes), expected, "{source}");
        }
    }

    #[test]
    fn test_predicates_are_total() {
        let classes = ClassTable::new();
        for predicate_kind in Predicate::ALL {
            assert!(!predicate(&ty("int"), &classes, predicate_kind));
        }
        assert!(predicate(&ty("void() const volatile"), &classes, Predicate::IsCvQualified));
        assert!(predicate(&ty("void() &&"), &classes, Predicate::IsRvalueQualified));
        assert!(predicate(&ty("void(...)"), &classes, Predicate::HasVarargs));
    }

    #[test]
    fn test_is_constexpr() {
        let classes = classes();
        assert!(is_constexpr(&ty("literal"), &classes));
        assert!(is_constexpr(&ty("const literal&"), &classes));
        assert!(!is_constexpr(&ty("nonliteral"), &classes));
        assert!(!is_constexpr(&ty("x"), &classes));
        assert!(!is_constexpr(&ty("int(*)()"), &classes));
    }

    #[test]
    fn test_calling_convention() {
        let classes = ClassTable::new();
        assert_eq!(
            calling_convention(&ty("void(__fastcall *)()"), &classes).unwrap(),
            CallingConvention::Fastcall
        );
        assert_eq!(
            calling_convention(&ty("void()"), &classes).unwrap(),
            CallingConvention::Default
        );
        assert!(calling_convention(&ty("int"), &classes).is_err());
    }

    #[test]
    fn test_class_of() {
        assert_eq!(class_of(&ty("int(foo::*)()")).unwrap(), ty("foo"));
        assert_eq!(class_of(&ty("int foo::*")).unwrap(), ty("foo"));
        assert!(class_of(&ty("int(*)()")).is_err());

        let cases = [
            ("int(foo::*)()", "foo&"),
            ("int(foo::*)() const", "const foo&"),
            ("int(foo::*)() volatile &", "volatile foo&"),
            ("int(foo::*)() const &&", "const foo&&"),
            ("int foo::*", "const foo&"),
        ];
        for (source, expected) in cases {
            assert_eq!(qualified_class_of(&ty(source)).unwrap(), ty(expected), "{source}");
        }
    }

    #[test]
    fn test_function_types() {
        let classes = classes();
        assert_eq!(
            function_type(&ty("foo"), &classes).unwrap(),
            ty("void(int, int&&, const int&, void*)")
        );
        assert_eq!(
            invoke_function_type(&ty("int(foo::*)(char) const noexcept"), &classes).unwrap(),
            ty("int(const foo&, char) noexcept")
        );
        assert_eq!(
            invoke_function_type(&ty("int(*)(char, ...)"), &classes).unwrap(),
            ty("int(char, ...)")
        );
        assert_eq!(
            invoke_function_type(&ty("x"), &classes).unwrap(),
            ty("int()")
        );
        assert!(invoke_function_type(&ty("int() const"), &classes).is_err());
    }
}
