use darling::Error;
use darling::ast::NestedMeta;
use quote::quote;
use syn::{Data, DeriveInput, ItemStruct, parse_macro_input};

use proc_macro::TokenStream;

/// Serializes every field in declaration order, little endian.
///
/// Fields must implement `crate::byteorder::WriteBytesLe`.
#[proc_macro_derive(ToBytes)]
pub fn derive_to_bytes(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;

    let fields: Vec<syn::Member> = match &input.data {
        Data::Struct(s) => s.fields.members().collect(),
        _ => {
            return syn::Error::new_spanned(name, "ToBytes can only be derived for structs")
                .to_compile_error()
                .into();
        }
    };

    let byte_len = if fields.is_empty() {
        quote! { 0 }
    } else {
        quote! { #( crate::byteorder::WriteBytesLe::byte_len(&self.#fields) )+* }
    };

    let expanded = quote! {
        impl crate::byteorder::WriteBytesLe for #name {
            fn write_le(&self, dst: &mut Vec<u8>) {
                #( crate::byteorder::WriteBytesLe::write_le(&self.#fields, dst); )*
            }

            fn byte_len(&self) -> usize {
                #byte_len
            }
        }
    };

    TokenStream::from(expanded)
}

/// Implements `RiffChunk` for a struct with a four character chunk id,
/// e.g. `#[riff_chunk(b"fmt ")]`.
///
/// The chunk body is the struct's `ToBytes` serialization.
#[proc_macro_attribute]
pub fn riff_chunk(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = match NestedMeta::parse_meta_list(attr.into()) {
        Ok(v) => v,
        Err(e) => {
            return TokenStream::from(Error::from(e).write_errors());
        }
    };

    let id_bytes = match args.first() {
        Some(NestedMeta::Lit(syn::Lit::ByteStr(bs))) => bs.value(),
        Some(other) => {
            return syn::Error::new_spanned(other, "riff_chunk expects a byte string, e.g. b\"fmt \"")
                .to_compile_error()
                .into();
        }
        None => {
            return quote! { compile_error!("riff_chunk expects a byte string, e.g. b\"fmt \""); }
                .into();
        }
    };

    if id_bytes.len() != 4 {
        return TokenStream::from(
            syn::Error::new_spanned(&args[0], "riff_chunk expects 4 bytes").to_compile_error(),
        );
    }

    let input = parse_macro_input!(item as ItemStruct);
    let name = &input.ident;

    let expanded = quote! {
        #input

        impl crate::wav::RiffChunk for #name {
            const ID: [u8; 4] = [#(#id_bytes),*];

            fn chunk_data(&self) -> Vec<u8> {
                let mut vec = Vec::with_capacity(crate::byteorder::WriteBytesLe::byte_len(self));
                crate::byteorder::WriteBytesLe::write_le(self, &mut vec);
                vec
            }
        }
    };
    TokenStream::from(expanded)
}
