use proc_macro::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Expr, Fields, Lit, Type, parse_macro_input};

// Derives a `CSV_HEADER` constant for recorder payloads.
// The `tickstamp` field is skipped because the recorder writes it itself,
// and fixed-size arrays expand to one column per element (`field_0,field_1,...`).
// Usage: #[derive(TelemetryPayload)]

#[proc_macro_derive(TelemetryPayload)]
pub fn telemetry_payload(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let Data::Struct(data) = &input.data else {
        return syn::Error::new_spanned(name, "TelemetryPayload only supports structs")
            .to_compile_error()
            .into();
    };
    let Fields::Named(fields) = &data.fields else {
        return syn::Error::new_spanned(name, "TelemetryPayload needs named fields")
            .to_compile_error()
            .into();
    };

    let mut columns: Vec<String> = Vec::new();
    for field in &fields.named {
        let Some(ident) = &field.ident else { continue };
        let column = ident.to_string();
        if column == "tickstamp" {
            continue;
        }
        match array_len(&field.ty) {
            Some(len) => columns.extend((0..len).map(|i| format!("{}_{}", column, i))),
            None => columns.push(column),
        }
    }
    let header = columns.join(",");

    let output = quote! {
        impl #impl_generics #name #ty_generics #where_clause {
            /// Comma separated column names, excluding the tickstamp.
            pub const CSV_HEADER: &'static str = #header;
        }
    };

    output.into()
}

fn array_len(ty: &Type) -> Option<usize> {
    let Type::Array(array) = ty else {
        return None;
    };
    match &array.len {
        Expr::Lit(lit) => match &lit.lit {
            Lit::Int(int) => int.base10_parse::<usize>().ok(),
            _ => None,
        },
        _ => None,
    }
}
