use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::quote;
use syn::{DeriveInput, LitStr, parse_macro_input};

pub fn derive_record_impl(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = input.ident;
    let name_lit = LitStr::new(&name.to_string(), Span::call_site());

    let fields = match input.data {
        syn::Data::Struct(data) => match data.fields {
            syn::Fields::Named(fields) => fields.named,
            _ => {
                return syn::Error::new_spanned(
                    name,
                    "Record only supports structs with named fields",
                )
                .to_compile_error()
                .into();
            }
        },
        _ => {
            return syn::Error::new_spanned(name, "Record only supports structs")
                .to_compile_error()
                .into();
        }
    };

    let field_pushes = fields.iter().filter_map(|f| {
        let field_name = f.ident.as_ref().unwrap();
        let (key, skip) = parse_field_attrs(f);
        if skip {
            return None;
        }
        let key_lit = LitStr::new(&key, Span::call_site());
        Some(quote! {
            fields.push((#key_lit, sqlbatis::udbc::value::ToValue::to_value(&self.#field_name)));
        })
    });

    TokenStream::from(quote! {
        impl sqlbatis::param::Record for #name {
            const NAME: &'static str = #name_lit;

            fn fields(&self) -> Vec<(&'static str, sqlbatis::udbc::value::Value)> {
                let mut fields = Vec::new();
                #(#field_pushes)*
                fields
            }
        }

        impl sqlbatis::udbc::value::ToValue for #name {
            fn to_value(&self) -> sqlbatis::udbc::value::Value {
                sqlbatis::param::record_to_value(self)
            }
        }
    })
}

/// Reads `#[record(rename = "...")]` / `#[record(skip)]` off a field.
/// Returns `(binding key, skip)`.
fn parse_field_attrs(field: &syn::Field) -> (String, bool) {
    let mut name = field.ident.as_ref().unwrap().to_string();
    let mut skip = false;

    for attr in &field.attrs {
        if attr.path().is_ident("record") {
            let _ = attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("skip") {
                    skip = true;
                } else if meta.path.is_ident("rename") {
                    let value = meta.value()?;
                    let s: LitStr = value.parse()?;
                    name = s.value();
                }
                Ok(())
            });
        }
    }
    (name, skip)
}
