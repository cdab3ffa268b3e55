//! Invocability: would `std::invoke(callable, args...)` compile?
//!
//! Arguments are expression types. A plain type is a prvalue, `T&` an
//! lvalue and `T&&` an xvalue. Each candidate function is checked for
//! arity and for an implicit conversion per argument, then the usual
//! best-viable-function rule picks among function object overloads.

use std::cmp::Ordering;

use callable_traits_types::{
    CallOperator, ClassTable, Cv, FunctionType, QualifierSet, RefQualifier, Type,
};

use crate::classify::object_class;

/// True if the callable type `ty` can be invoked with arguments of the given
/// expression types.
pub fn can_invoke(ty: &Type, args: &[Type], classes: &ClassTable) -> bool {
    let result = match ty.strip_cv().strip_reference().strip_cv() {
        Type::Function(function) if function.is_abominable() => false,
        Type::Function(function) => free_candidate(function, args, classes).is_some(),
        Type::Pointer { pointee } => match pointee.as_ref() {
            Type::Function(function) => free_candidate(function, args, classes).is_some(),
            _ => false,
        },
        Type::MemberPointer { class, pointee } => match (pointee.as_ref(), args.split_first()) {
            (Type::Function(function), Some((object, rest))) => {
                member_candidate(class, function, object, rest, classes).is_some()
            }
            _ => false,
        },
        other => match other.class_name().and_then(|name| classes.call_operators(name)) {
            Some(operators) => {
                let object = Expression::of(ty);
                let candidates: Vec<Candidate> = operators
                    .iter()
                    .filter_map(|operator| operator_candidate(operator, &object, args, classes))
                    .collect();
                best_viable(&candidates)
            }
            None => false,
        },
    };
    log::debug!(
        "can_invoke `{ty}` with ({}): {result}",
        args.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
    );
    result
}

// ============================================================================
// Expressions and Conversions
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Category {
    Lvalue,
    Xvalue,
    Prvalue,
}

/// An argument expression: its (possibly cv-qualified) type and category.
#[derive(Debug, Clone, Copy)]
struct Expression<'a> {
    ty: &'a Type,
    category: Category,
}

impl<'a> Expression<'a> {
    fn of(ty: &'a Type) -> Self {
        match ty {
            Type::LvalueReference { referent } => Expression {
                ty: referent,
                category: Category::Lvalue,
            },
            // named functions are lvalues, even through `&&`
            Type::RvalueReference { referent } if referent.is_function() => Expression {
                ty: referent,
                category: Category::Lvalue,
            },
            Type::RvalueReference { referent } => Expression {
                ty: referent,
                category: Category::Xvalue,
            },
            Type::Function(_) => Expression {
                ty,
                category: Category::Lvalue,
            },
            _ => Expression {
                ty,
                category: Category::Prvalue,
            },
        }
    }

    fn is_lvalue(&self) -> bool {
        self.category == Category::Lvalue
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Rank {
    Exact,
    Promotion,
    Conversion,
    Ellipsis,
}

/// One implicit conversion. A lower rank is better; `penalty` breaks ties
/// only between two reference bindings of the same rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Conversion {
    rank: Rank,
    penalty: u8,
    reference: bool,
}

impl Conversion {
    const EXACT: Conversion = Conversion::of(Rank::Exact);
    const ELLIPSIS: Conversion = Conversion::of(Rank::Ellipsis);

    const fn of(rank: Rank) -> Self {
        Conversion {
            rank,
            penalty: 0,
            reference: false,
        }
    }

    fn with_penalty(self, penalty: u8) -> Self {
        Conversion { penalty, ..self }
    }

    fn bound(self) -> Self {
        Conversion {
            reference: true,
            ..self
        }
    }

    fn compare(&self, other: &Conversion) -> Ordering {
        self.rank.cmp(&other.rank).then_with(|| {
            if self.reference && other.reference {
                self.penalty.cmp(&other.penalty)
            } else {
                Ordering::Equal
            }
        })
    }
}

/// Integer promotion and float-to-double promotion targets.
fn is_promotion(from: &str, to: &str) -> bool {
    match to {
        "int" => matches!(
            from,
            "bool"
                | "char"
                | "signed char"
                | "unsigned char"
                | "short"
                | "unsigned short"
                | "wchar_t"
                | "char8_t"
                | "char16_t"
        ),
        "unsigned int" => matches!(from, "char32_t"),
        "double" => from == "float",
        _ => false,
    }
}

/// Standard conversion of a value of type `from` to type `to`, both with
/// top-level cv ignored.
fn value_conversion(from: &Type, to: &Type, classes: &ClassTable) -> Option<Conversion> {
    let (from, to) = (from.strip_cv(), to.strip_cv());
    if to.is_auto() {
        return Some(Conversion::EXACT);
    }
    if from == to {
        return Some(Conversion::EXACT);
    }

    match (from, to) {
        // function-to-pointer decay
        (Type::Function(source), Type::Pointer { pointee }) => match pointee.as_ref() {
            Type::Function(target) if function_converts(source, target) => {
                Some(Conversion::EXACT)
            }
            _ => None,
        },
        (Type::Named { name: source }, Type::Named { name: target })
            if from.is_arithmetic() && to.is_arithmetic() =>
        {
            if is_promotion(source, target) {
                Some(Conversion::of(Rank::Promotion))
            } else {
                Some(Conversion::of(Rank::Conversion))
            }
        }
        (Type::Pointer { .. } | Type::MemberPointer { .. }, Type::Named { name })
            if name == "bool" =>
        {
            Some(Conversion::of(Rank::Conversion))
        }
        (_, Type::Pointer { .. } | Type::MemberPointer { .. }) if from.is_nullptr() => {
            Some(Conversion::of(Rank::Conversion))
        }
        (Type::Pointer { pointee: source }, Type::Pointer { pointee: target }) => {
            pointer_conversion(source, target, classes)
        }
        (
            Type::MemberPointer {
                class: source_class,
                pointee: source,
            },
            Type::MemberPointer {
                class: target_class,
                pointee: target,
            },
        ) if source_class == target_class => match (source.as_ref(), target.as_ref()) {
            (Type::Function(source), Type::Function(target))
                if function_converts(source, target) =>
            {
                Some(Conversion::EXACT)
            }
            _ => None,
        },
        _ => match (from.class_name(), to.class_name()) {
            (Some(derived), Some(base)) if classes.is_same_or_derived(derived, base) => {
                Some(Conversion::of(Rank::Conversion))
            }
            _ => None,
        },
    }
}

/// Conversion between the pointees of two object or function pointers.
fn pointer_conversion(source: &Type, target: &Type, classes: &ClassTable) -> Option<Conversion> {
    if let (Type::Function(source), Type::Function(target)) = (source, target) {
        return function_converts(source, target).then_some(Conversion::EXACT);
    }
    if source.is_function() || target.is_function() {
        return None;
    }
    if !target.cv().contains(source.cv()) {
        return None;
    }
    let (source, target) = (source.strip_cv(), target.strip_cv());
    if source == target {
        // qualification conversion
        return Some(Conversion::EXACT);
    }
    if target.is_void() {
        return Some(Conversion::of(Rank::Conversion));
    }
    match (source.class_name(), target.class_name()) {
        (Some(derived), Some(base)) if classes.is_same_or_derived(derived, base) => {
            Some(Conversion::of(Rank::Conversion))
        }
        _ => None,
    }
}

/// Identity, or dropping `noexcept` from a function type.
fn function_converts(source: &FunctionType, target: &FunctionType) -> bool {
    if source == target {
        return true;
    }
    let relaxed = FunctionType {
        qualifiers: source.qualifiers.with_noexcept(false),
        ..source.clone()
    };
    source.qualifiers.is_noexcept && &relaxed == target
}

/// Same type after cv, or a base class of it. Returns `Some(true)` if the
/// binding goes through a derived-to-base conversion.
fn reference_related(target: &Type, source: &Type, classes: &ClassTable) -> Option<bool> {
    let (target_core, source_core) = (target.strip_cv(), source.strip_cv());
    if target_core == source_core {
        return Some(false);
    }
    match (source_core.class_name(), target_core.class_name()) {
        (Some(derived), Some(base)) if classes.is_same_or_derived(derived, base) => Some(true),
        _ => None,
    }
}

/// Bind a reference of type `target&` (or `target&&` when `rvalue`) to `arg`.
fn reference_binding(
    target: &Type,
    rvalue: bool,
    arg: &Expression<'_>,
    classes: &ClassTable,
) -> Option<Conversion> {
    let target_cv = target.cv();
    let const_lvalue_ref = !rvalue && target_cv == Cv::CONST;

    if target.is_auto() {
        // `auto&&` forwards anything, `const auto&` binds anything
        return if rvalue || const_lvalue_ref || arg.is_lvalue() {
            Some(Conversion::EXACT)
        } else {
            None
        };
    }

    if let Type::Function(target_function) = target {
        return match arg.ty {
            Type::Function(source) if source == target_function => Some(Conversion::EXACT),
            _ => None,
        };
    }

    let related = reference_related(target, arg.ty, classes);
    let compatible = related.is_some() && target_cv.contains(arg.ty.cv());
    let penalty = u8::from(target_cv != arg.ty.cv());
    let rank = |derived: bool| {
        if derived {
            Conversion::of(Rank::Conversion)
        } else {
            Conversion::EXACT
        }
    };

    match (rvalue, arg.is_lvalue()) {
        // T& from an lvalue
        (false, true) if compatible => related.map(|derived| rank(derived).with_penalty(penalty)),
        // T&& from an rvalue
        (true, false) if compatible => related.map(rank),
        // T&& never binds a related lvalue
        (true, true) if related.is_some() => None,
        // const T& binds rvalues, penalized against T&&
        (false, false) if compatible && const_lvalue_ref => {
            related.map(|derived| rank(derived).with_penalty(1))
        }
        // otherwise a temporary is materialized from a converted value
        _ if related.is_none() && (rvalue || const_lvalue_ref) => {
            value_conversion(arg.ty, target, classes).map(|c| c.with_penalty(1))
        }
        _ => None,
    }
}

/// Initialize a parameter of type `param` from `arg`.
fn parameter_conversion(
    param: &Type,
    arg: &Expression<'_>,
    classes: &ClassTable,
) -> Option<Conversion> {
    match param {
        Type::LvalueReference { referent } => {
            reference_binding(referent, false, arg, classes).map(Conversion::bound)
        }
        Type::RvalueReference { referent } => {
            reference_binding(referent, true, arg, classes).map(Conversion::bound)
        }
        _ => value_conversion(arg.ty, param, classes),
    }
}

/// Bind the implicit object parameter of a member function with `member`
/// qualifiers to `object`.
fn object_binding(member: QualifierSet, object: &Expression<'_>) -> Option<Conversion> {
    implicit_object_binding(member, object).map(Conversion::bound)
}

fn implicit_object_binding(member: QualifierSet, object: &Expression<'_>) -> Option<Conversion> {
    let object_cv = object.ty.cv();
    if !member.cv().contains(object_cv) {
        return None;
    }
    let penalty = u8::from(member.cv() != object_cv);
    match member.ref_qualifier {
        RefQualifier::None => Some(Conversion::EXACT.with_penalty(penalty)),
        RefQualifier::Lvalue if object.is_lvalue() => Some(Conversion::EXACT.with_penalty(penalty)),
        // `const &` members accept rvalues
        RefQualifier::Lvalue if member.is_const && !member.is_volatile => {
            Some(Conversion::EXACT.with_penalty(penalty + 1))
        }
        RefQualifier::Lvalue => None,
        RefQualifier::Rvalue if !object.is_lvalue() => {
            Some(Conversion::EXACT.with_penalty(penalty))
        }
        RefQualifier::Rvalue => None,
    }
}

// ============================================================================
// Candidates
// ============================================================================

#[derive(Debug)]
struct Candidate {
    conversions: Vec<Conversion>,
    is_template: bool,
}

impl Candidate {
    fn is_better_than(&self, other: &Candidate) -> bool {
        let pairs = || self.conversions.iter().zip(&other.conversions);
        let no_worse = pairs().all(|(a, b)| a.compare(b) != Ordering::Greater);
        let strictly_better = pairs().any(|(a, b)| a.compare(b) == Ordering::Less);
        if no_worse && strictly_better {
            return true;
        }
        no_worse && !self.is_template && other.is_template
    }
}

/// True if exactly one candidate beats every other viable one.
fn best_viable(candidates: &[Candidate]) -> bool {
    match candidates {
        [] => false,
        [_] => true,
        _ => candidates.iter().enumerate().any(|(i, candidate)| {
            candidates
                .iter()
                .enumerate()
                .all(|(j, other)| i == j || candidate.is_better_than(other))
        }),
    }
}

/// Match `args` against a parameter list. A template's parameters spelled
/// as `auto` or as an unknown class name stand for deduced types.
fn match_parameters(
    function: &FunctionType,
    min_arity: usize,
    deduced: &dyn Fn(&Type) -> bool,
    args: &[Type],
    classes: &ClassTable,
) -> Option<Vec<Conversion>> {
    let max_arity = function.params.len();
    if args.len() < min_arity || (args.len() > max_arity && !function.qualifiers.is_variadic) {
        return None;
    }
    args.iter()
        .enumerate()
        .map(|(i, arg)| {
            let expression = Expression::of(arg);
            match function.params.get(i) {
                Some(param) if deduced(param) => deduced_binding(param, &expression),
                Some(param) => parameter_conversion(param, &expression, classes),
                None => Some(Conversion::ELLIPSIS),
            }
        })
        .collect()
}

/// Parameters of a deduced type accept any argument their reference form
/// can bind.
fn deduced_binding(param: &Type, arg: &Expression<'_>) -> Option<Conversion> {
    match param {
        Type::LvalueReference { referent } => {
            let const_ref = referent.cv() == Cv::CONST;
            (const_ref || arg.is_lvalue()).then_some(Conversion::EXACT)
        }
        _ => Some(Conversion::EXACT),
    }
}

fn free_candidate(
    function: &FunctionType,
    args: &[Type],
    classes: &ClassTable,
) -> Option<Candidate> {
    let arity = function.params.len();
    let conversions = match_parameters(function, arity, &|_: &Type| false, args, classes)?;
    Some(Candidate {
        conversions,
        is_template: false,
    })
}

fn member_candidate(
    class: &Type,
    function: &FunctionType,
    object: &Type,
    args: &[Type],
    classes: &ClassTable,
) -> Option<Candidate> {
    let owner = class.class_name()?;
    // a pointer argument is dereferenced, giving an lvalue
    let object = match object.strip_reference().strip_cv() {
        Type::Pointer { pointee } => Expression {
            ty: pointee,
            category: Category::Lvalue,
        },
        _ => Expression::of(object),
    };
    let object_name = object_class(object.ty)?;
    if !classes.is_same_or_derived(object_name, owner) {
        return None;
    }

    let mut conversions = vec![object_binding(function.qualifiers, &object)?];
    let arity = function.params.len();
    conversions.extend(match_parameters(
        function,
        arity,
        &|_: &Type| false,
        args,
        classes,
    )?);
    Some(Candidate {
        conversions,
        is_template: false,
    })
}

fn operator_candidate(
    operator: &CallOperator,
    object: &Expression<'_>,
    args: &[Type],
    classes: &ClassTable,
) -> Option<Candidate> {
    let deduced = |param: &Type| {
        operator.is_template && is_deduced(param.strip_reference().strip_cv(), classes)
    };
    let mut conversions = vec![object_binding(operator.function.qualifiers, object)?];
    conversions.extend(match_parameters(
        &operator.function,
        operator.min_arity(),
        &deduced,
        args,
        classes,
    )?);
    Some(Candidate {
        conversions,
        is_template: operator.is_template,
    })
}

fn is_deduced(param: &Type, classes: &ClassTable) -> bool {
    param.is_auto() || param.class_name().is_some_and(|name| classes.get(name).is_none())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::{parse_declarations, parse_type};

    fn classes() -> ClassTable {
        parse_declarations(
            "struct foo { void operator()(int, int&&, const int&, void* = nullptr) const {} };
             struct base {};
             struct derived : base {};
             struct lvalue_only { void operator()() &; };
             struct rvalue_only { void operator()() &&; };
             struct by_category { int operator()() &; char operator()() &&; };
             struct ambiguous { void operator()(long); void operator()(short); };
             struct promoted { void operator()(int); void operator()(double); };
             struct generic { template <class T> void operator()(T&&) const; void operator()(int) const; };
             struct takes_base { void operator()(const base&) const; };
             struct by_value_or_ref { void operator()(int) const; void operator()(const int&) const; };
             struct by_ref_cv { void operator()(int&) const; void operator()(const int&) const; };
             struct callable_base { int operator()(int) const; };
             struct inherits_call : callable_base {};
             struct hides_call : callable_base { void operator()() const; };
             struct long_base { void operator()(long) const; };
             struct two_bases : callable_base, long_base {};
             struct merges : callable_base, long_base {
                 using callable_base::operator();
                 using long_base::operator();
             };",
        )
        .unwrap()
    }

    fn invocable(callable: &str, args: &[&str]) -> bool {
        let ty = parse_type(callable).unwrap();
        let args: Vec<Type> = args.iter().map(|a| parse_type(a).unwrap()).collect();
        can_invoke(&ty, &args, &classes())
    }

    #[test]
    fn test_function_object_arguments() {
        assert!(invocable("foo", &["int", "int", "int&"]));
        assert!(invocable("foo", &["int", "int", "int&", "std::nullptr_t"]));
        assert!(invocable("foo", &["char", "long", "const int&", "int*"]));
        assert!(!invocable("foo", &["std::nullptr_t"]));
        assert!(!invocable("foo", &["int", "int&", "int"]));
        assert!(!invocable("foo", &["int", "int", "int", "int", "int"]));
        assert!(!invocable("foo", &["int", "int", "int", "int"]));
    }

    #[test]
    fn test_reference_binding() {
        assert!(invocable("void(*)(int&)", &["int&"]));
        assert!(!invocable("void(*)(int&)", &["int"]));
        assert!(!invocable("void(*)(int&)", &["const int&"]));
        assert!(!invocable("void(*)(int&)", &["long&"]));
        assert!(invocable("void(*)(const int&)", &["long"]));
        assert!(invocable("void(*)(int&&)", &["int&&"]));
        assert!(invocable("void(*)(int&&)", &["long&"]));
        assert!(!invocable("void(*)(int&&)", &["int&"]));
        assert!(invocable("void(&)(const base&)", &["derived&"]));
        assert!(!invocable("void(&)(const derived&)", &["base&"]));
    }

    #[test]
    fn test_pointer_conversions() {
        assert!(invocable("void(int*)", &["std::nullptr_t"]));
        assert!(invocable("void(const void*)", &["int*"]));
        assert!(!invocable("void(void*)", &["const int*"]));
        assert!(invocable("void(const int*)", &["int*"]));
        assert!(invocable("void(base*)", &["derived*"]));
        assert!(!invocable("void(derived*)", &["base*"]));
        assert!(invocable("void(bool)", &["int*"]));
        assert!(invocable("void(void(*)())", &["void() noexcept"]));
        assert!(!invocable("void(void(*)() noexcept)", &["void()"]));
    }

    #[test]
    fn test_varargs_and_abominables() {
        assert!(invocable("int(*)(const char*, ...)", &["const char*", "int", "double"]));
        assert!(!invocable("int(*)(const char*, ...)", &[]));
        assert!(!invocable("int() const", &[]));
        assert!(!invocable("int", &[]));
        assert!(!invocable("int foo::*", &["foo&"]));
    }

    #[test]
    fn test_member_function_pointers() {
        assert!(invocable("void(foo::*)(int)", &["foo", "int"]));
        assert!(invocable("void(foo::*)(int)", &["foo*", "int"]));
        assert!(invocable("void(base::*)()", &["derived&"]));
        assert!(!invocable("void(derived::*)()", &["base&"]));
        assert!(!invocable("void(foo::*)(int)", &["foo"]));
        assert!(!invocable("void(foo::*)(int)", &[]));
        assert!(!invocable("void(foo::*)()", &["const foo&"]));
        assert!(invocable("void(foo::*)() const", &["const foo&"]));
        assert!(invocable("void(foo::*)() const", &["foo&&"]));
        assert!(!invocable("void(foo::*)() &", &["foo"]));
        assert!(invocable("void(foo::*)() const &", &["foo"]));
        assert!(invocable("void(foo::*)() &&", &["foo"]));
        assert!(!invocable("void(foo::*)() &&", &["foo&"]));
        assert!(invocable("void(foo::*)() &&", &["foo&&"]));
        assert!(invocable("void(foo::*)() &", &["foo*"]));
    }

    #[test]
    fn test_function_object_category() {
        assert!(invocable("lvalue_only&", &[]));
        assert!(!invocable("lvalue_only", &[]));
        assert!(invocable("rvalue_only", &[]));
        assert!(!invocable("rvalue_only&", &[]));
        assert!(invocable("by_category", &[]));
        assert!(invocable("by_category&", &[]));
        assert!(invocable("const foo&", &["int", "int", "int"]));
    }

    #[test]
    fn test_overload_resolution() {
        assert!(!invocable("ambiguous", &["int"]));
        assert!(invocable("ambiguous", &["long"]));
        assert!(invocable("promoted", &["char"]));
        assert!(invocable("promoted", &["float"]));
        assert!(!invocable("promoted", &["long"]));
        assert!(invocable("generic", &["int"]));
        assert!(invocable("generic", &["std::string&"]));
        assert!(invocable("takes_base", &["derived"]));
        assert!(!invocable("takes_base", &["int"]));
    }

    #[test]
    fn test_value_and_reference_overloads_tie() {
        // cv adjustment of a reference binding does not rank against a copy
        assert!(!invocable("by_value_or_ref", &["int"]));
        assert!(!invocable("by_value_or_ref", &["int&"]));
        assert!(!invocable("by_value_or_ref", &["const int&"]));
        assert!(!invocable("by_value_or_ref", &["long"]));
        // between two reference bindings the less qualified one wins
        assert!(invocable("by_ref_cv", &["int&"]));
        assert!(invocable("by_ref_cv", &["int"]));
        assert!(invocable("by_ref_cv", &["const int&"]));
    }

    #[test]
    fn test_inherited_call_operators() {
        assert!(invocable("inherits_call", &["int"]));
        assert!(invocable("const inherits_call&", &["char"]));
        assert!(!invocable("inherits_call", &[]));
        assert!(invocable("hides_call", &[]));
        assert!(!invocable("hides_call", &["int"]));
        assert!(!invocable("two_bases", &["int"]));
        assert!(!invocable("two_bases", &["long"]));
        assert!(invocable("merges", &["int"]));
        assert!(invocable("merges", &["long&"]));
        assert!(!invocable("merges", &["double"]));
    }
}
