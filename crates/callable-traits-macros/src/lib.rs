//! Proc-macros that answer callable-type queries at compile time.
//!
//! Every macro takes string literals spelling C++ types, optionally preceded
//! by `decls = "..."` holding the class declarations the types refer to. The
//! answer is expanded as a literal; a failed query expands to
//! `compile_error!`.
//!
//! # Usage
//!
//! ```ignore
//! const ARITY: usize = callable_arity!(
//!     decls = "struct foo { void operator()(int, char) const; };",
//!     "foo"
//! );
//! const NOEXCEPT: bool = callable_is!("is_noexcept", "void(*)() noexcept");
//! const REMOVED: &str = callable_transform!("remove_at(0)", "void(int, char)");
//! ```

use std::ops::RangeInclusive;

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::parse::{Parse, ParseStream};
use syn::punctuated::Punctuated;
use syn::{Ident, Lit, LitStr, Token};

use callable_traits_query::{
    ClassTable, Result, apply_transform, can_invoke, parse_declarations, parse_type,
    parse_type_list, queries,
};
use callable_traits_types::{Predicate, Transform, Type};

// ============================================================================
// Macro Input
// ============================================================================

/// `[decls = "...",] "arg", "arg", ...`
struct MacroInput {
    decls: Option<String>,
    values: Vec<String>,
}

impl Parse for MacroInput {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let mut decls = None;
        if input.peek(Ident) && input.peek2(Token![=]) {
            let key: Ident = input.parse()?;
            if key != "decls" {
                return Err(syn::Error::new(key.span(), "expected `decls = \"...\"`"));
            }
            input.parse::<Token![=]>()?;
            let source: LitStr = input.parse()?;
            decls = Some(source.value());
            if !input.is_empty() {
                input.parse::<Token![,]>()?;
            }
        }

        let values = Punctuated::<Lit, Token![,]>::parse_terminated(input)?
            .into_iter()
            .map(|lit| match lit {
                Lit::Str(s) => Ok(s.value()),
                Lit::Int(i) => Ok(i.base10_digits().to_string()),
                other => Err(syn::Error::new(
                    other.span(),
                    "expected a string or integer literal",
                )),
            })
            .collect::<syn::Result<Vec<_>>>()?;

        Ok(MacroInput { decls, values })
    }
}

impl MacroInput {
    fn classes(&self) -> Result<ClassTable> {
        match &self.decls {
            Some(source) => parse_declarations(source),
            None => Ok(ClassTable::new()),
        }
    }
}

/// Parse the input, check the argument count, and run `query`.
fn expand(
    input: TokenStream,
    usage: &str,
    count: RangeInclusive<usize>,
    query: impl FnOnce(&[String], &ClassTable) -> Result<TokenStream2>,
) -> TokenStream {
    let input = match syn::parse::<MacroInput>(input) {
        Ok(input) => input,
        Err(e) => return e.to_compile_error().into(),
    };
    if !count.contains(&input.values.len()) {
        let msg = format!("expected {usage}");
        return quote! { compile_error!(#msg) }.into();
    }

    match input.classes().and_then(|classes| query(&input.values, &classes)) {
        Ok(output) => output.into(),
        Err(e) => {
            let msg = format!("callable-traits error: {}", e);
            quote! { compile_error!(#msg) }.into()
        }
    }
}

fn type_literal(ty: Type) -> TokenStream2 {
    let spelling = ty.to_string();
    quote! { #spelling }
}

fn index(value: &str) -> Result<usize> {
    value.trim().parse().map_err(|_| {
        callable_traits_types::ProtocolError::MalformedTransform(value.to_string()).into()
    })
}

// ============================================================================
// Proc-Macros
// ============================================================================

/// Number of parameters of a callable, as a `usize` literal.
///
/// ```ignore
/// const N: usize = callable_arity!("int(foo::*)(char, long) const");
/// // Expands to: 2usize
/// ```
#[proc_macro]
pub fn callable_arity(input: TokenStream) -> TokenStream {
    expand(input, "one type: \"<callable>\"", 1..=1, |values, classes| {
        let arity = queries::arity(&parse_type(&values[0])?, classes)?;
        Ok(quote! { #arity })
    })
}

/// Number of arguments a call needs, excluding defaulted parameters.
#[proc_macro]
pub fn callable_min_arity(input: TokenStream) -> TokenStream {
    expand(input, "one type: \"<callable>\"", 1..=1, |values, classes| {
        let arity = queries::min_arity(&parse_type(&values[0])?, classes)?;
        Ok(quote! { #arity })
    })
}

#[proc_macro]
pub fn callable_max_arity(input: TokenStream) -> TokenStream {
    expand(input, "one type: \"<callable>\"", 1..=1, |values, classes| {
        let arity = queries::max_arity(&parse_type(&values[0])?, classes)?;
        Ok(quote! { #arity })
    })
}

/// Evaluate a predicate by name, as a `bool` literal.
///
/// ```ignore
/// const SAFE: bool = callable_is!("is_transaction_safe", "void() transaction_safe");
/// ```
#[proc_macro]
pub fn callable_is(input: TokenStream) -> TokenStream {
    expand(
        input,
        "a predicate and a type: \"<predicate>\", \"<callable>\"",
        2..=2,
        |values, classes| {
            let predicate: Predicate = values[0].parse()?;
            let answer = queries::predicate(&parse_type(&values[1])?, classes, predicate);
            Ok(quote! { #answer })
        },
    )
}

/// The type of the parameter at an index, as a string literal.
#[proc_macro]
pub fn callable_arg_at(input: TokenStream) -> TokenStream {
    expand(
        input,
        "a type and an index: \"<callable>\", <index>",
        2..=2,
        |values, classes| {
            let ty = queries::arg_at(&parse_type(&values[0])?, classes, index(&values[1])?)?;
            Ok(type_literal(ty))
        },
    )
}

#[proc_macro]
pub fn callable_return_type(input: TokenStream) -> TokenStream {
    expand(input, "one type: \"<callable>\"", 1..=1, |values, classes| {
        let ty = queries::return_type(&parse_type(&values[0])?, classes)?;
        Ok(type_literal(ty))
    })
}

/// Apply a transformation, spelled as a call, and expand to the resulting
/// type as a string literal.
///
/// ```ignore
/// const F: &str = callable_transform!("remove_at(2)", "int(foo::*)(N<0>, N<1>, N<2>)");
/// // Expands to: "int(foo::*)(N<0>, N<1>)"
/// ```
#[proc_macro]
pub fn callable_transform(input: TokenStream) -> TokenStream {
    expand(
        input,
        "a transformation and a type: \"<transformation>\", \"<callable>\"",
        2..=2,
        |values, classes| {
            let transform: Transform = values[0].parse()?;
            let ty = apply_transform(&parse_type(&values[1])?, &transform, classes)?;
            Ok(type_literal(ty))
        },
    )
}

/// Whether a callable accepts the given argument types, as a `bool` literal.
///
/// Arguments may be given one per literal or as one comma separated list.
#[proc_macro]
pub fn callable_can_invoke(input: TokenStream) -> TokenStream {
    expand(
        input,
        "a type followed by argument types: \"<callable>\", \"<arg>\", ...",
        1..=usize::MAX,
        |values, classes| {
            let mut args = Vec::new();
            for value in &values[1..] {
                args.extend(parse_type_list(value)?);
            }
            let answer = can_invoke(&parse_type(&values[0])?, &args, classes);
            Ok(quote! { #answer })
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_macro_input() {
        let input: MacroInput = syn::parse_str(r#""void(int)", 0"#).unwrap();
        assert_eq!(input.decls, None);
        assert_eq!(input.values, vec!["void(int)".to_string(), "0".to_string()]);

        let input: MacroInput =
            syn::parse_str(r#"decls = "struct foo { void operator()(); };", "foo","#).unwrap();
        assert_eq!(
            input.decls.as_deref(),
            Some("struct foo { void operator()(); };")
        );
        assert_eq!(input.values, vec!["foo".to_string()]);
        assert_eq!(input.classes().unwrap().len(), 1);
    }

    #[test]
    fn test_parse_macro_input_errors() {
        assert!(syn::parse_str::<MacroInput>(r#"classes = "", "foo""#).is_err());
        assert!(syn::parse_str::<MacroInput>(r#""foo", true"#).is_err());
    }

    #[test]
    fn test_index() {
        assert_eq!(index(" 2 ").unwrap(), 2);
        assert!(index("two").is_err());
    }
}
