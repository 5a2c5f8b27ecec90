//! Derive macro for dependency-resolver
//!
//! `#[derive(Describe)]` generates the `Describe` implementation of a struct
//! with named fields: every field becomes a constructor parameter, in
//! declaration order, unless it is marked as an injectable property or
//! skipped.
//!
//! # Example
//!
//! ```rust,ignore
//! use dependency_resolver::{Describe, Reflector};
//! use std::sync::Arc;
//!
//! #[derive(Clone, Describe)]
//! struct Engine {
//!     #[param(default = 4i64)]
//!     cylinders: i64,
//! }
//!
//! #[derive(Describe)]
//! #[describe(name = "Car", parent = "Vehicle")]
//! struct Car {
//!     // declared type `Engine`, resolved through the container
//!     engine: Arc<Engine>,
//!     // injected after construction
//!     #[inject(ty = "Radio")]
//!     radio: Option<Arc<Radio>>,
//!     #[param(skip)]
//!     mileage: u64,
//! }
//!
//! let reflector = Reflector::new();
//! reflector.describe::<Engine>().unwrap();
//! reflector.describe::<Car>().unwrap();
//! ```
//!
//! # Field types
//!
//! - `Arc<T>` - shared dependency, declared type `T` unless `ty` says otherwise
//! - `Option<Arc<T>>` - nullable shared dependency
//! - anything else - cloned out of the resolved value (needs `Clone`)

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{Attribute, Data, DeriveInput, Expr, Fields, LitStr, Type, parse_macro_input};

/// Derive `dependency_resolver::Describe`.
///
/// # Attributes
///
/// - `#[describe(name = "...", parent = "...")]` on the struct - registered
///   name (defaults to the struct name) and parent type
/// - `#[param(ty = "...", default = <expr>, nullable, skip)]` on a field -
///   declared type, default value, nullability, or `Default::default()`
///   instead of a parameter
/// - `#[inject(ty = "...", nullable)]` on an `Option<Arc<T>>` field - inject
///   it as a property after construction
#[proc_macro_derive(Describe, attributes(describe, param, inject))]
pub fn derive_describe(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let ident = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    input,
                    "Describe can only be derived for structs with named fields",
                ));
            }
        },
        _ => return Err(syn::Error::new_spanned(input, "Describe can only be derived for structs")),
    };

    let options = TypeOptions::parse(&input.attrs)?;
    let name = options.name.unwrap_or_else(|| ident.to_string());
    let extends = options.parent.map(|parent| quote! { .extends(#parent) });

    let mut parameters = Vec::new();
    let mut initializers = Vec::new();
    let mut injections = Vec::new();

    for field in fields {
        let Some(field_name) = field.ident.as_ref() else {
            continue;
        };
        let key = field_name.to_string();
        let options = FieldOptions::parse(&field.attrs)?;

        if options.skip {
            initializers.push(quote! { #field_name: ::std::default::Default::default() });
            continue;
        }

        if options.inject {
            let Some(inner) = option_arc_inner(&field.ty) else {
                return Err(syn::Error::new_spanned(
                    &field.ty,
                    "Fields marked with #[inject] must have type Option<Arc<T>>",
                ));
            };
            let declared = options.ty.clone().or_else(|| type_label(inner));
            let of_type = declared.map(|declared| quote! { .of_type(#declared) });
            let nullable = options.nullable.then(|| quote! { .nullable() });
            let slot = format!("{}::${}", name, key);

            initializers.push(quote! { #field_name: ::std::option::Option::None });
            injections.push(quote! {
                .inject(
                    ::dependency_resolver::Property::new(#key) #of_type #nullable,
                    |instance: &mut Self, value: ::dependency_resolver::Value| {
                        instance.#field_name = value.expect_optional::<#inner>(#slot)?;
                        ::std::result::Result::Ok(())
                    },
                )
            });
            continue;
        }

        let index = parameters.len();
        let (extract, declared, nullable) = match (arc_inner(&field.ty), option_arc_inner(&field.ty)) {
            (Some(inner), _) => (
                quote! { args.shared::<#inner>(#index)? },
                options.ty.clone().or_else(|| type_label(inner)),
                options.nullable,
            ),
            (None, Some(inner)) => (
                quote! { args.optional::<#inner>(#index)? },
                options.ty.clone().or_else(|| type_label(inner)),
                true,
            ),
            (None, None) => {
                let ty = &field.ty;
                (quote! { args.cloned::<#ty>(#index)? }, options.ty.clone(), options.nullable)
            }
        };

        let of_type = declared.map(|declared| quote! { .of_type(#declared) });
        let nullable = nullable.then(|| quote! { .nullable() });
        let default = options
            .default
            .as_ref()
            .map(|default| quote! { .default_value(::dependency_resolver::Value::new(#default)) });

        parameters.push(quote! {
            ::dependency_resolver::Parameter::new(#key) #of_type #nullable #default
        });
        initializers.push(quote! { #field_name: #extract });
    }

    Ok(quote! {
        impl #impl_generics ::dependency_resolver::Describe for #ident #ty_generics #where_clause {
            fn describe() -> ::dependency_resolver::TypeDescriptor {
                ::dependency_resolver::TypeDescriptor::builder::<Self>(#name)
                    #extends
                    .constructor(
                        ::std::vec![#(#parameters),*],
                        |args: ::dependency_resolver::Args| {
                            let _ = &args;
                            ::std::result::Result::Ok(Self {
                                #(#initializers),*
                            })
                        },
                    )
                    #(#injections)*
                    .build()
            }
        }
    })
}

#[derive(Default)]
struct TypeOptions {
    name: Option<String>,
    parent: Option<String>,
}

impl TypeOptions {
    fn parse(attrs: &[Attribute]) -> syn::Result<Self> {
        let mut options = Self::default();
        for attr in attrs.iter().filter(|attr| attr.path().is_ident("describe")) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("name") {
                    options.name = Some(meta.value()?.parse::<LitStr>()?.value());
                } else if meta.path.is_ident("parent") {
                    options.parent = Some(meta.value()?.parse::<LitStr>()?.value());
                } else {
                    return Err(meta.error("expected `name` or `parent`"));
                }
                Ok(())
            })?;
        }
        Ok(options)
    }
}

#[derive(Default)]
struct FieldOptions {
    ty: Option<String>,
    default: Option<Expr>,
    nullable: bool,
    skip: bool,
    inject: bool,
}

impl FieldOptions {
    fn parse(attrs: &[Attribute]) -> syn::Result<Self> {
        let mut options = Self::default();
        for attr in attrs {
            let is_param = attr.path().is_ident("param");
            let is_inject = attr.path().is_ident("inject");
            if !is_param && !is_inject {
                continue;
            }
            options.inject |= is_inject;

            // bare `#[inject]`
            if attr.meta.require_path_only().is_ok() {
                continue;
            }

            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("ty") {
                    options.ty = Some(meta.value()?.parse::<LitStr>()?.value());
                } else if meta.path.is_ident("nullable") {
                    options.nullable = true;
                } else if is_param && meta.path.is_ident("default") {
                    options.default = Some(meta.value()?.parse::<Expr>()?);
                } else if is_param && meta.path.is_ident("skip") {
                    options.skip = true;
                } else {
                    return Err(meta.error("unsupported attribute option"));
                }
                Ok(())
            })?;
        }

        if options.inject && (options.skip || options.default.is_some()) {
            return Err(syn::Error::new(
                proc_macro2::Span::call_site(),
                "#[inject] fields cannot be skipped or take a parameter default",
            ));
        }
        Ok(options)
    }
}

/// Extract T from Arc<T>
fn arc_inner(ty: &Type) -> Option<&Type> {
    generic_inner(ty, "Arc")
}

/// Extract T from Option<Arc<T>>
fn option_arc_inner(ty: &Type) -> Option<&Type> {
    generic_inner(ty, "Option").and_then(arc_inner)
}

fn generic_inner<'a>(ty: &'a Type, wrapper: &str) -> Option<&'a Type> {
    let Type::Path(type_path) = ty else {
        return None;
    };
    let segment = type_path.path.segments.last()?;
    if segment.ident != wrapper {
        return None;
    }
    let syn::PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    match args.args.first()? {
        syn::GenericArgument::Type(inner) => Some(inner),
        _ => None,
    }
}

/// Declared type name for `T`: its last path segment
fn type_label(ty: &Type) -> Option<String> {
    let Type::Path(type_path) = ty else {
        return None;
    };
    type_path.path.segments.last().map(|segment| segment.ident.to_string())
}
