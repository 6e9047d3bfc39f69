use darling::FromAttributes;
use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields, Variant};

use crate::common::{snake_case, to_compile_error};

/// Per-variant options of `#[derive(Operation)]`
#[derive(Debug, Default, FromAttributes)]
#[darling(attributes(operation))]
pub struct OperationOptions {
    /// Operation name; defaults to the variant name in snake_case
    #[darling(default)]
    rename: Option<String>,
    /// Dispatchable, reported like a public operation
    #[darling(default)]
    protected: bool,
    /// Declared but never dispatchable through a pool
    #[darling(default)]
    private: bool,
}

struct VariantEntry {
    pattern: TokenStream2,
    name: String,
    visibility: TokenStream2,
    arity: usize,
}

fn variant_entry(variant: &Variant) -> syn::Result<VariantEntry> {
    let options = OperationOptions::from_attributes(&variant.attrs)
        .map_err(|e| syn::Error::new_spanned(variant, e.to_string()))?;

    if options.protected && options.private {
        return Err(syn::Error::new_spanned(
            &variant.ident,
            "an operation cannot be both protected and private",
        ));
    }

    let ident = &variant.ident;
    let pattern = match &variant.fields {
        Fields::Unit => quote! { Self::#ident },
        Fields::Unnamed(_) => quote! { Self::#ident(..) },
        Fields::Named(_) => quote! { Self::#ident { .. } },
    };

    let visibility = if options.private {
        quote! { ::starling_api::Visibility::Private }
    } else if options.protected {
        quote! { ::starling_api::Visibility::Protected }
    } else {
        quote! { ::starling_api::Visibility::Public }
    };

    Ok(VariantEntry {
        pattern,
        name: options.rename.unwrap_or_else(|| snake_case(&ident.to_string())),
        visibility,
        arity: variant.fields.len(),
    })
}

/// Implementation of the Operation derive macro
pub(crate) fn derive_operation_impl(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let data = match &input.data {
        Data::Enum(data) => data,
        _ => {
            return to_compile_error(syn::Error::new_spanned(
                &input.ident,
                "Operation can only be derived for enums",
            ));
        }
    };

    if data.variants.is_empty() {
        return to_compile_error(syn::Error::new_spanned(
            &input.ident,
            "Operation requires at least one variant",
        ));
    }

    let mut entries = Vec::with_capacity(data.variants.len());
    for variant in &data.variants {
        match variant_entry(variant) {
            Ok(entry) => entries.push(entry),
            Err(e) => return to_compile_error(e),
        }
    }

    let mut seen = std::collections::HashSet::new();
    for (entry, variant) in entries.iter().zip(&data.variants) {
        if !seen.insert(entry.name.clone()) {
            return to_compile_error(syn::Error::new_spanned(
                &variant.ident,
                format!("duplicate operation name `{}`", entry.name),
            ));
        }
    }

    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let arms = entries.iter().map(|entry| {
        let pattern = &entry.pattern;
        let op_name = &entry.name;
        quote! { #pattern => #op_name, }
    });

    let infos = entries.iter().map(|entry| {
        let op_name = &entry.name;
        let visibility = &entry.visibility;
        let arity = entry.arity;
        quote! { ::starling_api::OperationInfo::new(#op_name, #visibility, #arity), }
    });

    let expanded = quote! {
        impl #impl_generics ::starling_api::Operation for #name #ty_generics #where_clause {
            fn name(&self) -> &'static str {
                match self {
                    #(#arms)*
                }
            }

            fn operations() -> &'static [::starling_api::OperationInfo] {
                const OPERATIONS: &[::starling_api::OperationInfo] = &[
                    #(#infos)*
                ];
                OPERATIONS
            }
        }
    };

    TokenStream::from(expanded)
}
