//! Sorting types into callable shapes.

use callable_traits_types::{CallableShape, ClassTable, FunctionType, Type};

/// Classify `ty`. Anything that is not recognizably callable is
/// [`CallableShape::NotCallable`]; classification itself never fails.
pub fn classify(ty: &Type, classes: &ClassTable) -> CallableShape {
    let shape = classify_inner(ty, classes);
    log::trace!("classified `{ty}` as {shape}");
    shape
}

fn classify_inner(ty: &Type, classes: &ClassTable) -> CallableShape {
    match ty.strip_cv() {
        Type::LvalueReference { referent } | Type::RvalueReference { referent } => {
            match referent.as_ref() {
                Type::Function(_) => CallableShape::FunctionReference,
                other => classify_inner(other, classes),
            }
        }
        Type::Pointer { pointee } if pointee.is_function() => CallableShape::FunctionPointer,
        Type::Function(function) if function.is_abominable() => CallableShape::Abominable,
        Type::Function(_) => CallableShape::FreeFunction,
        Type::MemberPointer { class, pointee } if pointee.is_function() => {
            CallableShape::MemberFunctionPointer {
                owner: class.as_ref().clone(),
            }
        }
        other => match other.class_name() {
            Some(name) => match classes.single_call_operator(name) {
                Some(_) => CallableShape::FunctionObject {
                    class: name.to_string(),
                },
                None => CallableShape::NotCallable,
            },
            None => CallableShape::NotCallable,
        },
    }
}

/// The function type a function-bearing type is built around: the function
/// itself, or the target of a function pointer, function reference or
/// member function pointer. Top-level cv is looked through.
pub(crate) fn function_of(ty: &Type) -> Option<&FunctionType> {
    match ty.strip_cv() {
        Type::Function(function) => Some(function),
        Type::Pointer { pointee }
        | Type::LvalueReference { referent: pointee }
        | Type::RvalueReference { referent: pointee }
        | Type::MemberPointer { pointee, .. } => pointee.as_function(),
        _ => None,
    }
}

/// The class named by `ty` once references and cv are stripped.
pub(crate) fn object_class(ty: &Type) -> Option<&str> {
    ty.strip_cv().strip_reference().class_name()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::{parse_declarations, parse_type};

    fn shape_of(source: &str, classes: &ClassTable) -> CallableShape {
        classify(&parse_type(source).unwrap(), classes)
    }

    #[test]
    fn test_function_bearing_shapes() {
        let classes = ClassTable::new();
        assert_eq!(shape_of("int(char)", &classes), CallableShape::FreeFunction);
        assert_eq!(shape_of("void(...)", &classes), CallableShape::FreeFunction);
        assert_eq!(shape_of("int(*)(char)", &classes), CallableShape::FunctionPointer);
        assert_eq!(shape_of("int(* const)(char)", &classes), CallableShape::FunctionPointer);
        assert_eq!(shape_of("int(&)(char)", &classes), CallableShape::FunctionReference);
        assert_eq!(shape_of("int(&&)(char)", &classes), CallableShape::FunctionReference);
        assert_eq!(shape_of("int(char) const", &classes), CallableShape::Abominable);
        assert_eq!(shape_of("int(char) &&", &classes), CallableShape::Abominable);
        assert_eq!(shape_of("int() noexcept", &classes), CallableShape::FreeFunction);
        assert_eq!(
            shape_of("int(foo::* const)(char) volatile", &classes),
            CallableShape::MemberFunctionPointer {
                owner: Type::named("foo")
            }
        );
    }

    #[test]
    fn test_function_objects() {
        let classes = parse_declarations(
            "struct foo { void operator()(int) const; };
             struct overloaded { void operator()(int); void operator()(char); };
             struct generic { template <class T> void operator()(T); };
             struct plain { int x; };",
        )
        .unwrap();

        let foo = CallableShape::FunctionObject {
            class: "foo".to_string(),
        };
        assert_eq!(shape_of("foo", &classes), foo);
        assert_eq!(shape_of("const foo&", &classes), foo);
        assert_eq!(shape_of("foo&&", &classes), foo);
        assert_eq!(shape_of("overloaded", &classes), CallableShape::NotCallable);
        assert_eq!(shape_of("generic", &classes), CallableShape::NotCallable);
        assert_eq!(shape_of("plain", &classes), CallableShape::NotCallable);
        assert_eq!(shape_of("unknown", &classes), CallableShape::NotCallable);
    }

    #[test]
    fn test_inherited_function_objects() {
        let classes = parse_declarations(
            "struct foo { void operator()(int) const; };
             struct derived : foo {};
             struct grandchild : public derived {};
             struct bar { void operator()(char) const; };
             struct both : foo, bar {};
             struct hides : foo { void operator()(int); void operator()(char); };",
        )
        .unwrap();

        assert_eq!(
            shape_of("derived", &classes),
            CallableShape::FunctionObject {
                class: "derived".to_string()
            }
        );
        assert_eq!(
            shape_of("grandchild&", &classes),
            CallableShape::FunctionObject {
                class: "grandchild".to_string()
            }
        );
        assert_eq!(shape_of("both", &classes), CallableShape::NotCallable);
        assert_eq!(shape_of("hides", &classes), CallableShape::NotCallable);
    }

    #[test]
    fn test_non_callables() {
        let classes = ClassTable::new();
        for source in ["int", "int*", "void", "int foo::*", "int&", "std::nullptr_t"] {
            assert_eq!(shape_of(source, &classes), CallableShape::NotCallable, "{source}");
        }
    }

    #[test]
    fn test_reference_to_function_pointer_is_a_function_pointer() {
        let classes = ClassTable::new();
        assert_eq!(shape_of("int(*&)()", &classes), CallableShape::FunctionPointer);
    }

    #[test]
    fn test_function_of() {
        for source in ["int(char)", "int(*)(char)", "int(&)(char)", "int(foo::*)(char)"] {
            let ty = parse_type(source).unwrap();
            let function = function_of(&ty).unwrap();
            assert_eq!(function.params, vec![Type::named("char")], "{source}");
        }
        assert!(function_of(&Type::named("int")).is_none());
    }
}
