mod record;

use proc_macro::TokenStream;

/// Derives `sqlbatis::param::Record` for a struct with named fields.
///
/// Produces the struct name and an ordered `(field name, Value)` list, which
/// `ParamBinder` uses to flatten a record argument into `"<Name>.<field>"`
/// keys without walking the struct at runtime. Use `#[record(rename = "...")]`
/// on a field to bind it under a different key, or `#[record(skip)]` to
/// leave it out of the flattened parameters entirely.
#[proc_macro_derive(Record, attributes(record))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    record::derive_record_impl(input)
}
