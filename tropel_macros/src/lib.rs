use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Error, Fields, LitStr};

extern crate proc_macro;

/// Derives `tropel::CaseKey` for a fieldless enum.
///
/// Each variant is named after its snake_case spelling. Override a name with
/// `#[case(name = "...")]`:
///
/// ```rust,ignore
/// #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, CaseKey)]
/// enum Auth {
///     SuccessfulLogin,
///     #[case(name = "bad_password")]
///     InvalidCredentialsLogin,
/// }
/// ```
#[proc_macro_derive(CaseKey, attributes(case))]
pub fn case_key(item: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(item as DeriveInput);
    match expand_case_key(&ast) {
        Ok(expanded) => TokenStream::from(expanded),
        Err(e) => TokenStream::from(e.to_compile_error()),
    }
}

fn expand_case_key(ast: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let Data::Enum(data) = &ast.data else {
        return Err(Error::new_spanned(
            &ast.ident,
            "CaseKey can only be derived for enums",
        ));
    };
    if data.variants.is_empty() {
        return Err(Error::new_spanned(
            &ast.ident,
            "CaseKey needs at least one variant",
        ));
    }

    let mut variants = Vec::with_capacity(data.variants.len());
    let mut names = Vec::with_capacity(data.variants.len());
    for variant in &data.variants {
        if !matches!(variant.fields, Fields::Unit) {
            return Err(Error::new_spanned(
                variant,
                "CaseKey variants cannot carry fields",
            ));
        }
        let name = match case_name_override(&variant.attrs)? {
            Some(name) => name,
            None => LitStr::new(&snake_case(&variant.ident.to_string()), Span::call_site()),
        };
        if names.iter().any(|n: &LitStr| n.value() == name.value()) {
            return Err(Error::new_spanned(
                variant,
                format!("duplicate case name `{}`", name.value()),
            ));
        }
        variants.push(&variant.ident);
        names.push(name);
    }

    let ident = &ast.ident;
    let (impl_generics, ty_generics, where_clause) = ast.generics.split_for_impl();
    Ok(quote! {
        impl #impl_generics ::tropel::CaseKey for #ident #ty_generics #where_clause {
            const ALL: &'static [Self] = &[#(Self::#variants),*];

            fn name(&self) -> &'static str {
                match self {
                    #(Self::#variants => #names,)*
                }
            }
        }
    })
}

fn case_name_override(attrs: &[syn::Attribute]) -> syn::Result<Option<LitStr>> {
    let mut name = None;
    for attr in attrs.iter().filter(|a| a.path().is_ident("case")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                name = Some(meta.value()?.parse::<LitStr>()?);
                Ok(())
            } else {
                Err(meta.error("unsupported case attribute, expected `name`"))
            }
        })?;
    }
    Ok(name)
}

fn snake_case(ident: &str) -> String {
    let mut out = String::with_capacity(ident.len() + 4);
    let mut prev_lower = false;
    for c in ident.chars() {
        if c.is_uppercase() {
            if prev_lower {
                out.push('_');
            }
            out.extend(c.to_lowercase());
            prev_lower = false;
        } else {
            prev_lower = c.is_lowercase() || c.is_ascii_digit();
            out.push(c);
        }
    }
    out
}
