//! Transformations over callable types.
//!
//! Every function here returns a new [`Type`] or a [`DomainFailure`]
//! explaining why the input is outside the transformation's domain. The
//! qualifier algebra itself lives on [`QualifierSet`]; this module decides
//! which shapes each operation accepts and rebuilds the surrounding type.

use callable_traits_types::{
    CallingConvention, ClassTable, Cv, DomainFailure, FunctionType, QualifierSet, RefQualifier,
    TransformationResult, Type,
};

use crate::signature::call_operator;

// ============================================================================
// Shape Plumbing
// ============================================================================

/// Rebuild a function type or member function pointer with new member
/// qualifiers. Nothing else may carry them.
fn map_member_function(
    ty: &Type,
    f: impl FnOnce(QualifierSet) -> QualifierSet,
) -> TransformationResult {
    match ty {
        Type::Function(function) => {
            let qualifiers = f(function.qualifiers);
            Ok(Type::Function(function.clone().with_qualifiers(qualifiers)))
        }
        Type::MemberPointer { class, pointee } => match pointee.as_ref() {
            Type::Function(function) => {
                let qualifiers = f(function.qualifiers);
                Ok(Type::member_pointer(
                    class.as_ref().clone(),
                    Type::Function(function.clone().with_qualifiers(qualifiers)),
                ))
            }
            _ => Err(DomainFailure::MemberQualifiersIllegal),
        },
        _ => Err(DomainFailure::MemberQualifiersIllegal),
    }
}

/// Rebuild any function-bearing type around a modified function type,
/// keeping its shape. Anything else fails with `failure`.
fn map_function(
    ty: &Type,
    failure: DomainFailure,
    rebuild: impl FnOnce(&FunctionType) -> Result<FunctionType, DomainFailure>,
) -> TransformationResult {
    let function = |target: &Type| match target {
        Type::Function(function) => rebuild(function),
        _ => Err(failure.clone()),
    };
    match ty {
        Type::Function(_) => function(ty).map(Type::Function),
        Type::Pointer { pointee } => function(pointee).map(|f| Type::pointer(Type::Function(f))),
        Type::LvalueReference { referent } => {
            function(referent).map(|f| Type::lvalue_ref(Type::Function(f)))
        }
        Type::RvalueReference { referent } => {
            function(referent).map(|f| Type::rvalue_ref(Type::Function(f)))
        }
        Type::MemberPointer { class, pointee } => function(pointee)
            .map(|f| Type::member_pointer(class.as_ref().clone(), Type::Function(f))),
        _ => Err(failure.clone()),
    }
}

fn map_qualifiers(
    ty: &Type,
    failure: DomainFailure,
    f: impl FnOnce(QualifierSet) -> QualifierSet,
) -> TransformationResult {
    map_function(ty, failure, |function| {
        Ok(function.clone().with_qualifiers(f(function.qualifiers)))
    })
}

fn map_params(
    ty: &Type,
    f: impl FnOnce(&[Type]) -> Result<Vec<Type>, DomainFailure>,
) -> TransformationResult {
    map_function(ty, DomainFailure::ParameterListIllegal, |function| {
        Ok(function.with_params(f(&function.params)?))
    })
}

fn traced(name: &str, ty: &Type, result: TransformationResult) -> TransformationResult {
    match &result {
        Ok(output) => log::trace!("{name}: `{ty}` -> `{output}`"),
        Err(failure) => log::trace!("{name}: `{ty}` rejected: {failure}"),
    }
    result
}

// ============================================================================
// Member Qualifiers
// ============================================================================

pub fn add_member_const(ty: &Type) -> TransformationResult {
    traced("add_member_const", ty, map_member_function(ty, |q| q.add_cv(Cv::CONST)))
}

pub fn remove_member_const(ty: &Type) -> TransformationResult {
    traced("remove_member_const", ty, map_member_function(ty, |q| q.remove_cv(Cv::CONST)))
}

pub fn add_member_volatile(ty: &Type) -> TransformationResult {
    traced("add_member_volatile", ty, map_member_function(ty, |q| q.add_cv(Cv::VOLATILE)))
}

pub fn remove_member_volatile(ty: &Type) -> TransformationResult {
    traced(
        "remove_member_volatile",
        ty,
        map_member_function(ty, |q| q.remove_cv(Cv::VOLATILE)),
    )
}

pub fn add_member_cv(ty: &Type) -> TransformationResult {
    traced("add_member_cv", ty, map_member_function(ty, |q| q.add_cv(Cv::CONST_VOLATILE)))
}

pub fn remove_member_cv(ty: &Type) -> TransformationResult {
    traced(
        "remove_member_cv",
        ty,
        map_member_function(ty, |q| q.remove_cv(Cv::CONST_VOLATILE)),
    )
}

/// Adds `&`. Any existing `&&` collapses to `&`.
pub fn add_member_lvalue_reference(ty: &Type) -> TransformationResult {
    traced(
        "add_member_lvalue_reference",
        ty,
        map_member_function(ty, |q| q.add_ref(RefQualifier::Lvalue)),
    )
}

/// Adds `&&`. An `&`-qualified input is returned unchanged.
pub fn add_member_rvalue_reference(ty: &Type) -> TransformationResult {
    traced(
        "add_member_rvalue_reference",
        ty,
        map_member_function(ty, |q| q.add_ref(RefQualifier::Rvalue)),
    )
}

pub fn remove_member_reference(ty: &Type) -> TransformationResult {
    traced(
        "remove_member_reference",
        ty,
        map_member_function(ty, QualifierSet::remove_ref),
    )
}

// ============================================================================
// Function Attributes
// ============================================================================

pub fn add_noexcept(ty: &Type) -> TransformationResult {
    let result = map_qualifiers(ty, DomainFailure::NoexceptIllegal, |q| q.with_noexcept(true));
    traced("add_noexcept", ty, result)
}

pub fn remove_noexcept(ty: &Type) -> TransformationResult {
    let result = map_qualifiers(ty, DomainFailure::NoexceptIllegal, |q| q.with_noexcept(false));
    traced("remove_noexcept", ty, result)
}

pub fn add_transaction_safe(ty: &Type) -> TransformationResult {
    let result = map_qualifiers(ty, DomainFailure::TransactionSafeIllegal, |q| {
        q.with_transaction_safe(true)
    });
    traced("add_transaction_safe", ty, result)
}

pub fn remove_transaction_safe(ty: &Type) -> TransformationResult {
    let result = map_qualifiers(ty, DomainFailure::TransactionSafeIllegal, |q| {
        q.with_transaction_safe(false)
    });
    traced("remove_transaction_safe", ty, result)
}

/// Adds a C-style `...` to the parameter list.
pub fn add_varargs(ty: &Type) -> TransformationResult {
    let result = map_qualifiers(ty, DomainFailure::VarargsIllegal, |q| q.with_variadic(true));
    traced("add_varargs", ty, result)
}

pub fn remove_varargs(ty: &Type) -> TransformationResult {
    let result = map_qualifiers(ty, DomainFailure::VarargsIllegal, |q| q.with_variadic(false));
    traced("remove_varargs", ty, result)
}

pub fn with_calling_convention(ty: &Type, convention: CallingConvention) -> TransformationResult {
    let result = map_qualifiers(ty, DomainFailure::CallingConventionIllegal, |q| {
        q.with_calling_convention(convention)
    });
    traced("with_calling_convention", ty, result)
}

// ============================================================================
// Member Pointers
// ============================================================================

/// `T` to `T owner::*`. A function type (even an abominable one) becomes a
/// member function pointer, an object type a member data pointer.
pub fn add_member_pointer(ty: &Type, owner: &Type) -> TransformationResult {
    let result = if owner.class_name().is_none() || ty.is_reference() || ty.is_void() {
        Err(DomainFailure::MemberPointerIllegal)
    } else {
        Ok(Type::member_pointer(owner.strip_cv().clone(), ty.clone()))
    };
    traced("add_member_pointer", ty, result)
}

/// `T owner::*` to `T`. A member function pointer gives back its function
/// type with the member qualifiers it carries.
pub fn remove_member_pointer(ty: &Type) -> TransformationResult {
    let result = match ty.strip_cv() {
        Type::MemberPointer { pointee, .. } => Ok(pointee.as_ref().clone()),
        _ => Err(DomainFailure::MemberPointerRequired),
    };
    traced("remove_member_pointer", ty, result)
}

// ============================================================================
// Parameter Lists
// ============================================================================

fn out_of_range(index: usize, params: &[Type]) -> DomainFailure {
    DomainFailure::ParameterIndexOutOfRange {
        index,
        arity: params.len(),
    }
}

/// Remove the parameter at `index`.
pub fn remove_at(ty: &Type, index: usize) -> TransformationResult {
    traced("remove_at", ty, remove_params(ty, index, 1))
}

/// Remove `count` parameters starting at `index`.
pub fn remove_args(ty: &Type, index: usize, count: usize) -> TransformationResult {
    traced("remove_args", ty, remove_params(ty, index, count))
}

fn remove_params(ty: &Type, index: usize, count: usize) -> TransformationResult {
    map_params(ty, |params| {
        let end = index
            .checked_add(count)
            .filter(|&end| end <= params.len())
            .ok_or_else(|| out_of_range(index, params))?;
        let mut params = params.to_vec();
        params.drain(index..end);
        Ok(params)
    })
}

/// Insert `args` before the parameter at `index`; `index` may equal the
/// arity to append.
pub fn insert_args(ty: &Type, index: usize, args: &[Type]) -> TransformationResult {
    let result = map_params(ty, |params| {
        if index > params.len() {
            return Err(out_of_range(index, params));
        }
        let mut params = params.to_vec();
        params.splice(index..index, args.iter().cloned());
        Ok(params)
    });
    traced("insert_args", ty, result)
}

pub fn push_front(ty: &Type, args: &[Type]) -> TransformationResult {
    traced("push_front", ty, insert_args(ty, 0, args))
}

pub fn push_back(ty: &Type, args: &[Type]) -> TransformationResult {
    let result = map_params(ty, |params| Ok([params, args].concat()));
    traced("push_back", ty, result)
}

/// Remove the first `count` parameters.
pub fn pop_front(ty: &Type, count: usize) -> TransformationResult {
    let result = map_params(ty, |params| match params.get(count..) {
        Some(rest) => Ok(rest.to_vec()),
        None => Err(out_of_range(count - 1, params)),
    });
    traced("pop_front", ty, result)
}

/// Remove the last `count` parameters.
pub fn pop_back(ty: &Type, count: usize) -> TransformationResult {
    let result = map_params(ty, |params| match params.len().checked_sub(count) {
        Some(keep) => Ok(params[..keep].to_vec()),
        None => Err(out_of_range(count - 1, params)),
    });
    traced("pop_back", ty, result)
}

/// Overwrite parameters starting at `index` with `args`, growing the list
/// when `args` runs past its end.
pub fn replace_args(ty: &Type, index: usize, args: &[Type]) -> TransformationResult {
    let result = map_params(ty, |params| {
        if index > params.len() {
            return Err(out_of_range(index, params));
        }
        let mut params = params.to_vec();
        let end = index.saturating_add(args.len()).min(params.len());
        params.splice(index..end, args.iter().cloned());
        Ok(params)
    });
    traced("replace_args", ty, result)
}

pub fn swap_args(ty: &Type, first: usize, second: usize) -> TransformationResult {
    let result = map_params(ty, |params| {
        let mut params = params.to_vec();
        for index in [first, second] {
            if index >= params.len() {
                return Err(out_of_range(index, &params));
            }
        }
        params.swap(first, second);
        Ok(params)
    });
    traced("swap_args", ty, result)
}

pub fn clear_args(ty: &Type) -> TransformationResult {
    traced("clear_args", ty, map_params(ty, |_| Ok(Vec::new())))
}

// ============================================================================
// Return Types and Decay
// ============================================================================

/// Replace the return type, keeping everything else.
pub fn apply_return(ty: &Type, return_type: &Type) -> TransformationResult {
    let result = if return_type.is_function() {
        Err(DomainFailure::ReturnTypeIllegal)
    } else {
        map_function(ty, DomainFailure::ReturnTypeIllegal, |function| {
            Ok(FunctionType {
                return_type: Box::new(return_type.clone()),
                ..function.clone()
            })
        })
    };
    traced("apply_return", ty, result)
}

/// Strip pointer, reference and member-pointer-ness, leaving a function type.
///
/// A member function pointer keeps its member qualifiers, so the result may
/// be abominable. A function object yields its call operator's function type
/// without the operator's cv and ref qualifiers.
pub fn decay_to_plain_function_type(ty: &Type, classes: &ClassTable) -> TransformationResult {
    let result = match ty.strip_cv() {
        Type::Function(function) => Ok(Type::Function(function.clone())),
        Type::Pointer { pointee }
        | Type::LvalueReference { referent: pointee }
        | Type::RvalueReference { referent: pointee }
        | Type::MemberPointer { pointee, .. }
            if pointee.is_function() =>
        {
            Ok(pointee.as_ref().clone())
        }
        other => match crate::classify::object_class(other) {
            Some(class) => call_operator(class, classes)
                .map(|operator| {
                    let function = operator.function.clone();
                    let qualifiers = function.qualifiers.remove_member_qualifiers();
                    Type::Function(function.with_qualifiers(qualifiers))
                })
                .map_err(|_| DomainFailure::FunctionTypeRequired),
            None => Err(DomainFailure::FunctionTypeRequired),
        },
    };
    traced("decay_to_plain_function_type", ty, result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::{parse_declarations, parse_type};

    fn ty(source: &str) -> Type {
        parse_type(source).unwrap()
    }

    fn check(
        transform: impl Fn(&Type) -> TransformationResult,
        cases: &[(&str, Result<&str, DomainFailure>)],
    ) {
        for (input, expected) in cases {
            let actual = transform(&ty(input)).map(|t| t.to_string());
            let expected = expected.clone().map(str::to_string);
            assert_eq!(actual, expected, "input `{input}`");
        }
    }

    #[test]
    fn test_add_member_rvalue_reference_table() {
        use DomainFailure::MemberQualifiersIllegal as Illegal;
        check(
            add_member_rvalue_reference,
            &[
                ("int()", Ok("int() &&")),
                ("int(foo::*)()", Ok("int(foo::*)() &&")),
                ("int(foo::*)() &", Ok("int(foo::*)() &")),
                ("int(foo::*)() &&", Ok("int(foo::*)() &&")),
                ("int(foo::*)() const", Ok("int(foo::*)() const &&")),
                ("int(foo::*)() transaction_safe", Ok("int(foo::*)() && transaction_safe")),
                ("int", Err(Illegal)),
                ("int(*)()", Err(Illegal)),
                ("int(&)()", Err(Illegal)),
                ("int foo::*", Err(Illegal)),
                ("int(foo::* const)()", Err(Illegal)),
            ],
        );
    }

    #[test]
    fn test_member_qualifier_transforms() {
        check(
            add_member_const,
            &[
                ("void(int)", Ok("void(int) const")),
                ("void(foo::*)(int) volatile &&", Ok("void(foo::*)(int) const volatile &&")),
            ],
        );
        check(
            remove_member_const,
            &[
                ("void() const volatile", Ok("void() volatile")),
                ("void()", Ok("void()")),
            ],
        );
        check(add_member_volatile, &[("void()", Ok("void() volatile"))]);
        check(remove_member_volatile, &[("void() const volatile", Ok("void() const"))]);
        check(add_member_cv, &[("void() &", Ok("void() const volatile &"))]);
        check(remove_member_cv, &[("void() const volatile &", Ok("void() &"))]);
        check(
            add_member_lvalue_reference,
            &[
                ("void()", Ok("void() &")),
                ("void() &&", Ok("void() &")),
                ("void(*)()", Err(DomainFailure::MemberQualifiersIllegal)),
            ],
        );
        check(
            remove_member_reference,
            &[
                ("void() const &&", Ok("void() const")),
                ("void(foo::*)() &", Ok("void(foo::*)()")),
            ],
        );
    }

    #[test]
    fn test_attribute_transforms() {
        check(
            add_noexcept,
            &[
                ("void()", Ok("void() noexcept")),
                ("void(*)()", Ok("void(*)() noexcept")),
                ("void(&)()", Ok("void(&)() noexcept")),
                ("void(foo::*)() const", Ok("void(foo::*)() const noexcept")),
                ("int", Err(DomainFailure::NoexceptIllegal)),
                ("foo", Err(DomainFailure::NoexceptIllegal)),
            ],
        );
        check(remove_noexcept, &[("void() noexcept", Ok("void()"))]);
        check(
            add_transaction_safe,
            &[
                ("void(*)()", Ok("void(*)() transaction_safe")),
                ("int*", Err(DomainFailure::TransactionSafeIllegal)),
            ],
        );
        check(remove_transaction_safe, &[("void() transaction_safe", Ok("void()"))]);
        check(
            add_varargs,
            &[
                ("void(int)", Ok("void(int, ...)")),
                ("void()", Ok("void(...)")),
                ("void(int, ...)", Ok("void(int, ...)")),
                ("int", Err(DomainFailure::VarargsIllegal)),
            ],
        );
        check(remove_varargs, &[("void(int, ...)", Ok("void(int)"))]);
    }

    #[test]
    fn test_calling_conventions() {
        let stdcall = |t: &Type| with_calling_convention(t, CallingConvention::Stdcall);
        check(
            stdcall,
            &[
                ("int()", Ok("int __stdcall()")),
                ("int(*)()", Ok("int(__stdcall *)()")),
                ("int(foo::*)()", Ok("int(__stdcall foo::*)()")),
                ("int", Err(DomainFailure::CallingConventionIllegal)),
            ],
        );
        let reset = |t: &Type| with_calling_convention(t, CallingConvention::Default);
        check(reset, &[("int(__fastcall *)()", Ok("int(*)()"))]);
    }

    #[test]
    fn test_member_pointer_round_trip() {
        let pmf = ty("void(foo::*)(int, int&&, const int&, void*) const");
        let function = remove_member_pointer(&pmf).unwrap();
        assert_eq!(function.to_string(), "void(int, int&&, const int&, void*) const");
        assert_eq!(add_member_pointer(&function, &ty("foo")).unwrap(), pmf);

        let stripped = remove_member_const(&function).unwrap();
        assert_eq!(stripped.to_string(), "void(int, int&&, const int&, void*)");
    }

    #[test]
    fn test_member_pointer_domains() {
        assert_eq!(add_member_pointer(&ty("int"), &ty("foo")).unwrap().to_string(), "int foo::*");
        assert_eq!(
            add_member_pointer(&ty("int&"), &ty("foo")),
            Err(DomainFailure::MemberPointerIllegal)
        );
        assert_eq!(
            add_member_pointer(&ty("void"), &ty("foo")),
            Err(DomainFailure::MemberPointerIllegal)
        );
        assert_eq!(
            add_member_pointer(&ty("int()"), &ty("int")),
            Err(DomainFailure::MemberPointerIllegal)
        );
        assert_eq!(remove_member_pointer(&ty("int foo::*")).unwrap(), ty("int"));
        assert_eq!(
            remove_member_pointer(&ty("int(*)()")),
            Err(DomainFailure::MemberPointerRequired)
        );
    }

    #[test]
    fn test_remove_at() {
        let f = ty("int(foo::*)(N<0>, N<1>, N<2>, N<3>)");
        assert_eq!(
            remove_at(&f, 2).unwrap().to_string(),
            "int(foo::*)(N<0>, N<1>, N<3>)"
        );
        assert_eq!(
            remove_at(&f, 4),
            Err(DomainFailure::ParameterIndexOutOfRange { index: 4, arity: 4 })
        );
    }

    #[test]
    fn test_parameter_list_algebra() {
        let f = ty("void(*)(int, char, long)");
        let spelled = |r: TransformationResult| r.unwrap().to_string();

        assert_eq!(spelled(remove_args(&f, 0, 2)), "void(*)(long)");
        assert_eq!(spelled(insert_args(&f, 1, &[ty("bool")])), "void(*)(int, bool, char, long)");
        assert_eq!(spelled(insert_args(&f, 3, &[ty("bool")])), "void(*)(int, char, long, bool)");
        assert_eq!(spelled(push_front(&f, &[ty("bool")])), "void(*)(bool, int, char, long)");
        assert_eq!(spelled(push_back(&f, &[ty("bool"), ty("short")])), "void(*)(int, char, long, bool, short)");
        assert_eq!(spelled(pop_front(&f, 1)), "void(*)(char, long)");
        assert_eq!(spelled(pop_back(&f, 2)), "void(*)(int)");
        assert_eq!(spelled(replace_args(&f, 1, &[ty("bool")])), "void(*)(int, bool, long)");
        assert_eq!(spelled(replace_args(&f, 2, &[ty("bool"), ty("short")])), "void(*)(int, char, bool, short)");
        assert_eq!(spelled(swap_args(&f, 0, 2)), "void(*)(long, char, int)");
        assert_eq!(spelled(clear_args(&f)), "void(*)()");

        assert!(remove_args(&f, 2, 2).is_err());
        assert!(insert_args(&f, 4, &[ty("bool")]).is_err());
        assert!(pop_front(&f, 4).is_err());
        assert!(pop_back(&f, 4).is_err());
        assert!(swap_args(&f, 0, 3).is_err());
        assert_eq!(clear_args(&ty("foo")), Err(DomainFailure::ParameterListIllegal));
    }

    #[test]
    fn test_parameter_indices_near_overflow() {
        let f = ty("void(int, char)");
        let out_of_range = |index| Err(DomainFailure::ParameterIndexOutOfRange { index, arity: 2 });

        assert_eq!(remove_args(&f, 1, usize::MAX), out_of_range(1));
        assert_eq!(remove_args(&f, usize::MAX, 1), out_of_range(usize::MAX));
        assert_eq!(insert_args(&f, usize::MAX, &[ty("bool")]), out_of_range(usize::MAX));
        assert_eq!(replace_args(&f, usize::MAX, &[ty("bool")]), out_of_range(usize::MAX));
        assert_eq!(pop_front(&f, usize::MAX), out_of_range(usize::MAX - 1));
        assert_eq!(pop_back(&f, usize::MAX), out_of_range(usize::MAX - 1));
        assert_eq!(remove_args(&f, 2, 0).unwrap(), f);
    }

    #[test]
    fn test_parameter_transforms_keep_shape_and_qualifiers() {
        let f = ty("int(&)(int, ...) noexcept");
        assert_eq!(
            push_back(&f, &[ty("char")]).unwrap().to_string(),
            "int(&)(int, char, ...) noexcept"
        );
        let abominable = ty("int(int) const &");
        assert_eq!(pop_front(&abominable, 1).unwrap().to_string(), "int() const &");
    }

    #[test]
    fn test_apply_return() {
        assert_eq!(
            apply_return(&ty("int(foo::*)(char) const"), &ty("void")).unwrap().to_string(),
            "void(foo::*)(char) const"
        );
        assert_eq!(
            apply_return(&ty("int()"), &ty("int()")),
            Err(DomainFailure::ReturnTypeIllegal)
        );
        assert_eq!(
            apply_return(&ty("int"), &ty("void")),
            Err(DomainFailure::ReturnTypeIllegal)
        );
    }

    #[test]
    fn test_decay_to_plain_function_type() {
        let classes = parse_declarations(
            "struct foo { void operator()(int, int&&, const int&, void* = nullptr) const {} };",
        )
        .unwrap();
        let decay = |source: &str| {
            decay_to_plain_function_type(&ty(source), &classes).map(|t| t.to_string())
        };
        assert_eq!(decay("foo").unwrap(), "void(int, int&&, const int&, void*)");
        assert_eq!(decay("const foo&").unwrap(), "void(int, int&&, const int&, void*)");
        assert_eq!(decay("int(*)(char)").unwrap(), "int(char)");
        assert_eq!(decay("int(&)(char)").unwrap(), "int(char)");
        assert_eq!(decay("int(foo::*)(char) const").unwrap(), "int(char) const");
        assert_eq!(decay("int(char) &&").unwrap(), "int(char) &&");
        assert_eq!(decay("int"), Err(DomainFailure::FunctionTypeRequired));
        assert_eq!(decay("int foo::*"), Err(DomainFailure::FunctionTypeRequired));
    }

    #[test]
    fn test_removing_absent_qualifiers_is_identity() {
        for source in ["void()", "void(foo::*)(int)", "int(char) const"] {
            let t = ty(source);
            assert_eq!(remove_member_volatile(&t).unwrap(), t);
            assert_eq!(remove_noexcept(&t).unwrap(), t);
            assert_eq!(remove_varargs(&t).unwrap(), t);
            assert_eq!(remove_transaction_safe(&t).unwrap(), t);
        }
    }
}
