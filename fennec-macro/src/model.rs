use darling::{FromDeriveInput, FromField, ast::Data, util::Ignored};
use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{DeriveInput, GenericArgument, LitStr, PathArguments, Type, parse_macro_input};

#[derive(FromDeriveInput)]
#[darling(attributes(model), forward_attrs(serde), supports(struct_named))]
struct ModelOpts {
    ident: syn::Ident,
    generics: syn::Generics,
    attrs: Vec<syn::Attribute>,
    data: Data<Ignored, FieldOpts>,
    /// Overrides the schema name reported in route metadata.
    #[darling(default)]
    name: Option<String>,
}

#[derive(FromField)]
#[darling(attributes(field), forward_attrs(serde))]
struct FieldOpts {
    ident: Option<syn::Ident>,
    ty: Type,
    attrs: Vec<syn::Attribute>,
    #[darling(default)]
    rename: Option<String>,
    #[darling(default)]
    min_length: Option<usize>,
    #[darling(default)]
    max_length: Option<usize>,
    #[darling(default)]
    default: Option<syn::Expr>,
    #[darling(default)]
    validator: Option<syn::Expr>,
}

pub fn derive_model(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match ModelOpts::from_derive_input(&input) {
        Ok(opts) => TokenStream::from(generate_model_impl(&opts)),
        Err(err) => TokenStream::from(err.write_errors()),
    }
}

fn generate_model_impl(opts: &ModelOpts) -> TokenStream2 {
    let struct_name = &opts.ident;
    let (impl_generics, ty_generics, where_clause) = opts.generics.split_for_impl();
    let schema_name = opts
        .name
        .clone()
        .unwrap_or_else(|| struct_name.to_string());

    let fields = match &opts.data {
        Data::Struct(fields) => fields.fields.iter().collect::<Vec<_>>(),
        Data::Enum(_) => Vec::new(),
    };

    let container = SerdeAttrs::parse(&opts.attrs);
    // Decoders need `'static` field types, which generic parameters may not be.
    let typed = opts.generics.params.is_empty();
    let field_specs = fields
        .iter()
        .filter_map(|field| generate_field_spec(field, &container, typed));

    quote! {
        impl #impl_generics ::fennec::validation::Model for #struct_name #ty_generics #where_clause {
            fn schema() -> ::fennec::validation::ModelSchema {
                ::fennec::validation::ModelSchema::new(#schema_name)
                    #(.field(#field_specs))*
            }
        }
    }
}

fn generate_field_spec(
    field: &FieldOpts,
    container: &SerdeAttrs,
    typed: bool,
) -> Option<TokenStream2> {
    let serde = SerdeAttrs::parse(&field.attrs);
    if serde.skip {
        return None;
    }
    let ident = field
        .ident
        .as_ref()
        .map(|ident| ident.to_string().trim_start_matches("r#").to_string())
        .unwrap_or_default();
    let serde_name = match (&serde.rename, &container.rename_all) {
        (Some(rename), _) => rename.clone(),
        (None, Some(rule)) => apply_rename_rule(rule, &ident),
        (None, None) => ident,
    };
    let wire_name = field.rename.clone().unwrap_or_else(|| serde_name.clone());

    let (inner, optional) = match option_inner(&field.ty) {
        Some(inner) => (inner, true),
        None => (&field.ty, false),
    };
    let variant = format_ident!("{}", field_type_variant(inner));

    let mut spec = quote! {
        ::fennec::validation::FieldSpec::new(#wire_name, ::fennec::validation::FieldType::#variant)
    };
    if wire_name != serde_name {
        spec = quote! { #spec.serde_name(#serde_name) };
    }
    if optional {
        spec = quote! { #spec.optional().nullable() };
    }
    if let Some(default) = &field.default {
        spec = quote! { #spec.default(::fennec::serde_json::json!(#default)) };
    }
    if let Some(min) = field.min_length {
        spec = quote! { #spec.min_length(#min) };
    }
    if let Some(max) = field.max_length {
        spec = quote! { #spec.max_length(#max) };
    }
    if let Some(int) = bounded_int(inner) {
        spec = quote! { #spec.range(#int::MIN as i128, #int::MAX as i128) };
    }
    if let Some(validator) = &field.validator {
        spec = quote! { #spec.validator(#validator) };
    }
    if typed && !serde.custom_deserialize {
        let ty = &field.ty;
        spec = quote! { #spec.decodes_as::<#ty>() };
    }
    Some(spec)
}

/// The subset of `#[serde(...)]` that changes which keys the struct reads.
#[derive(Default)]
struct SerdeAttrs {
    rename: Option<String>,
    rename_all: Option<String>,
    skip: bool,
    custom_deserialize: bool,
}

impl SerdeAttrs {
    fn parse(attrs: &[syn::Attribute]) -> Self {
        let mut parsed = Self::default();
        for attr in attrs.iter().filter(|attr| attr.path().is_ident("serde")) {
            // Malformed serde attributes are reported by serde's own derive.
            let _ = attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("rename") || meta.path.is_ident("rename_all") {
                    let target = if meta.path.is_ident("rename") {
                        &mut parsed.rename
                    } else {
                        &mut parsed.rename_all
                    };
                    if meta.input.peek(syn::Token![=]) {
                        let value: LitStr = meta.value()?.parse()?;
                        *target = Some(value.value());
                    } else {
                        meta.parse_nested_meta(|inner| {
                            let value: LitStr = inner.value()?.parse()?;
                            if inner.path.is_ident("deserialize") {
                                *target = Some(value.value());
                            }
                            Ok(())
                        })?;
                    }
                    return Ok(());
                }
                if meta.path.is_ident("skip") || meta.path.is_ident("skip_deserializing") {
                    parsed.skip = true;
                } else if meta.path.is_ident("with") || meta.path.is_ident("deserialize_with") {
                    parsed.custom_deserialize = true;
                }
                skip_meta_value(&meta)
            });
        }
        parsed
    }
}

fn skip_meta_value(meta: &syn::meta::ParseNestedMeta<'_>) -> syn::Result<()> {
    if meta.input.peek(syn::Token![=]) {
        let _: syn::Expr = meta.value()?.parse()?;
    } else if meta.input.peek(syn::token::Paren) {
        meta.parse_nested_meta(|inner| skip_meta_value(&inner))?;
    }
    Ok(())
}

/// Mirrors serde's `rename_all` rules for snake_case field names.
fn apply_rename_rule(rule: &str, field: &str) -> String {
    let words: Vec<&str> = field.split('_').filter(|w| !w.is_empty()).collect();
    let capitalize = |word: &str| {
        let mut chars = word.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
            None => String::new(),
        }
    };
    match rule {
        "lowercase" => field.to_lowercase(),
        "UPPERCASE" | "SCREAMING_SNAKE_CASE" => field.to_uppercase(),
        "kebab-case" => field.replace('_', "-"),
        "SCREAMING-KEBAB-CASE" => field.replace('_', "-").to_uppercase(),
        "PascalCase" => words.iter().map(|w| capitalize(w)).collect(),
        "camelCase" => words
            .iter()
            .enumerate()
            .map(|(i, w)| if i == 0 { w.to_string() } else { capitalize(w) })
            .collect(),
        _ => field.to_string(),
    }
}

/// Returns the integer type when it is narrow enough to bound as `i128`.
fn bounded_int(ty: &Type) -> Option<&syn::Ident> {
    let Type::Path(type_path) = ty else {
        return None;
    };
    let ident = type_path.path.get_ident()?;
    matches!(
        ident.to_string().as_str(),
        "i8" | "i16" | "i32" | "i64" | "isize" | "u8" | "u16" | "u32" | "u64" | "usize"
    )
    .then_some(ident)
}

/// Returns `T` when the type is spelled `Option<T>`.
fn option_inner(ty: &Type) -> Option<&Type> {
    let Type::Path(type_path) = ty else {
        return None;
    };
    let segment = type_path.path.segments.last()?;
    if segment.ident != "Option" {
        return None;
    }
    match &segment.arguments {
        PathArguments::AngleBracketed(args) => args.args.iter().find_map(|arg| match arg {
            GenericArgument::Type(inner) => Some(inner),
            _ => None,
        }),
        _ => None,
    }
}

fn field_type_variant(ty: &Type) -> &'static str {
    let ident = match ty {
        Type::Path(type_path) => match type_path.path.segments.last() {
            Some(segment) => segment.ident.to_string(),
            None => return "Any",
        },
        Type::Reference(reference) => return field_type_variant(&reference.elem),
        Type::Array(_) | Type::Slice(_) => return "List",
        _ => return "Any",
    };
    match ident.as_str() {
        "String" | "str" | "char" => "String",
        "i8" | "i16" | "i32" | "i64" | "i128" | "isize" | "u8" | "u16" | "u32" | "u64"
        | "u128" | "usize" => "Int",
        "f32" | "f64" => "Float",
        "bool" => "Bool",
        "Vec" | "VecDeque" | "HashSet" | "BTreeSet" => "List",
        "HashMap" | "BTreeMap" | "Map" => "Object",
        // Enums and nested structs are left to the field decoder.
        _ => "Any",
    }
}
