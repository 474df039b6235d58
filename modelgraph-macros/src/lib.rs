//! Procedural macros for modelgraph
//!
//! - `#[derive(Model)]` - static table metadata (`impl modelgraph::orm::Model`)
//!
//! ```ignore
//! /// A registered user
//! #[derive(Model)]
//! #[model(table = "user")]
//! pub struct User {
//!     #[column(primary_key)]
//!     pub id: i64,
//!     /// Display name
//!     #[column(length = 20)]
//!     pub name: Option<String>,
//!     #[relationship(many_to_many, secondary = "user_role", local = "user_id", remote = "role_id")]
//!     pub roles: Vec<Role>,
//! }
//! ```
//!
//! Column types are inferred from the field type (`Option<_>` makes the
//! column nullable) unless `sql_type` is given. Doc comments become
//! descriptions.

use convert_case::{Case, Casing};
use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::ext::IdentExt;
use syn::meta::ParseNestedMeta;
use syn::{
    Attribute, Data, DeriveInput, Error, Expr, Field, Fields, GenericArgument, Lit, LitBool,
    LitInt, LitStr, Meta, PathArguments, Token, Type, parse_macro_input,
};

/// Derive `modelgraph::orm::Model` for a struct with named fields.
///
/// # Attributes
///
/// - `#[model(name = "...", table = "...")]` on the struct
/// - `#[column(primary_key, autoincrement = false, unique, nullable, length = N,
///   sql_type = "...", server_default = "...", foreign_key = "Model.column",
///   global_id, skip)]` on column fields
/// - `#[relationship(many_to_one = "fk_column" | one_to_many = "remote_column" |
///   many_to_many, secondary = "...", local = "...", remote = "...",
///   target = "...")]` on relationship fields
#[proc_macro_derive(Model, attributes(model, column, relationship))]
pub fn derive_model(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_model(&input)
        .unwrap_or_else(Error::into_compile_error)
        .into()
}

fn expand_model(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let ident = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            other => {
                return Err(Error::new_spanned(
                    other,
                    "Model can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(Error::new_spanned(
                ident,
                "Model can only be derived for structs with named fields",
            ));
        }
    };

    let model_attrs = ModelAttrs::parse(&input.attrs)?;
    let name = model_attrs
        .name
        .unwrap_or_else(|| ident.unraw().to_string());
    let table = model_attrs
        .table
        .unwrap_or_else(|| name.to_case(Case::Snake));

    let mut model = quote! {
        ::modelgraph::orm::ModelDef::new(#name).table(#table)
    };
    if let Some(doc) = doc_string(&input.attrs) {
        model = quote! { #model.description(#doc) };
    }

    for field in fields {
        if has_attr(&field.attrs, "relationship") {
            let relationship = relationship_def(field)?;
            model = quote! { #model.relationship(#relationship) };
        } else if let Some(column) = column_def(field)? {
            model = quote! { #model.column(#column) };
        }
    }

    Ok(quote! {
        impl #impl_generics ::modelgraph::orm::Model for #ident #ty_generics #where_clause {
            fn model_def() -> ::modelgraph::orm::ModelDef {
                #model
            }
        }
    })
}

// ============================================================================
// Struct attributes
// ============================================================================

#[derive(Default)]
struct ModelAttrs {
    name: Option<String>,
    table: Option<String>,
}

impl ModelAttrs {
    fn parse(attrs: &[Attribute]) -> syn::Result<Self> {
        let mut out = Self::default();
        for attr in attrs.iter().filter(|a| a.path().is_ident("model")) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("name") {
                    out.name = Some(string_value(&meta)?);
                } else if meta.path.is_ident("table") {
                    out.table = Some(string_value(&meta)?);
                } else {
                    return Err(meta.error("unsupported model attribute"));
                }
                Ok(())
            })?;
        }
        Ok(out)
    }
}

// ============================================================================
// Columns
// ============================================================================

#[derive(Default)]
struct ColumnAttrs {
    primary_key: bool,
    autoincrement: Option<bool>,
    unique: bool,
    nullable: bool,
    length: Option<u32>,
    sql_type: Option<LitStr>,
    server_default: Option<String>,
    foreign_key: Option<LitStr>,
    global_id: bool,
    skip: bool,
}

impl ColumnAttrs {
    fn parse(attrs: &[Attribute]) -> syn::Result<Self> {
        let mut out = Self::default();
        for attr in attrs.iter().filter(|a| a.path().is_ident("column")) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("primary_key") {
                    out.primary_key = flag_value(&meta)?;
                } else if meta.path.is_ident("autoincrement") {
                    out.autoincrement = Some(flag_value(&meta)?);
                } else if meta.path.is_ident("unique") {
                    out.unique = flag_value(&meta)?;
                } else if meta.path.is_ident("nullable") {
                    out.nullable = flag_value(&meta)?;
                } else if meta.path.is_ident("length") {
                    let lit: LitInt = meta.value()?.parse()?;
                    out.length = Some(lit.base10_parse()?);
                } else if meta.path.is_ident("sql_type") {
                    out.sql_type = Some(meta.value()?.parse()?);
                } else if meta.path.is_ident("server_default") {
                    out.server_default = Some(string_value(&meta)?);
                } else if meta.path.is_ident("foreign_key") {
                    out.foreign_key = Some(meta.value()?.parse()?);
                } else if meta.path.is_ident("global_id") {
                    out.global_id = flag_value(&meta)?;
                } else if meta.path.is_ident("skip") {
                    out.skip = flag_value(&meta)?;
                } else {
                    return Err(meta.error("unsupported column attribute"));
                }
                Ok(())
            })?;
        }
        Ok(out)
    }
}

fn column_def(field: &Field) -> syn::Result<Option<TokenStream2>> {
    let attrs = ColumnAttrs::parse(&field.attrs)?;
    if attrs.skip {
        return Ok(None);
    }
    let Some(ident) = &field.ident else {
        return Err(Error::new_spanned(field, "expected a named field"));
    };
    let name = ident.unraw().to_string();

    let (inner, optional) = match option_inner(&field.ty) {
        Some(inner) => (inner, true),
        None => (&field.ty, false),
    };
    let column_type = match &attrs.sql_type {
        Some(lit) => column_type_named(lit)?,
        None => infer_column_type(inner)?,
    };

    let mut column = quote! {
        ::modelgraph::orm::ColumnDef::new(#name, ::modelgraph::orm::ColumnType::#column_type)
    };
    if optional || attrs.nullable {
        column = quote! { #column.nullable() };
    }
    if attrs.primary_key {
        column = quote! { #column.primary_key() };
    }
    if let Some(autoincrement) = attrs.autoincrement {
        column = quote! { #column.autoincrement(#autoincrement) };
    }
    if attrs.unique {
        column = quote! { #column.unique() };
    }
    if let Some(length) = attrs.length {
        column = quote! { #column.length(#length) };
    }
    if let Some(default) = &attrs.server_default {
        column = quote! { #column.server_default(#default) };
    }
    if let Some(lit) = &attrs.foreign_key {
        let target = lit.value();
        let Some((model, remote)) = target.split_once('.') else {
            return Err(Error::new_spanned(lit, "expected foreign_key = \"Model.column\""));
        };
        column = quote! { #column.foreign_key(#model, #remote) };
    }
    if attrs.global_id {
        column = quote! { #column.global_id() };
    }
    if let Some(doc) = doc_string(&field.attrs) {
        column = quote! { #column.description(#doc) };
    }
    Ok(Some(column))
}

fn column_type_named(lit: &LitStr) -> syn::Result<TokenStream2> {
    let variant = match lit.value().as_str() {
        "integer" => quote!(Integer),
        "float" => quote!(Float),
        "string" => quote!(String),
        "text" => quote!(Text),
        "boolean" => quote!(Boolean),
        "datetime" => quote!(DateTime),
        "json" => quote!(Json),
        "string_array" => quote!(StringArray),
        _ => {
            return Err(Error::new_spanned(
                lit,
                "expected one of integer, float, string, text, boolean, datetime, json, string_array",
            ));
        }
    };
    Ok(variant)
}

fn infer_column_type(ty: &Type) -> syn::Result<TokenStream2> {
    let Some(ident) = last_segment_ident(ty) else {
        return Err(Error::new_spanned(ty, "cannot infer column type, add sql_type"));
    };
    let variant = match ident.as_str() {
        "i8" | "i16" | "i32" | "i64" | "u8" | "u16" | "u32" | "isize" => quote!(Integer),
        "f32" | "f64" => quote!(Float),
        "String" => quote!(String),
        "bool" => quote!(Boolean),
        "Value" | "JsonValue" => quote!(Json),
        "Vec" if generic_inner(ty).and_then(last_segment_ident).as_deref() == Some("String") => {
            quote!(StringArray)
        }
        _ => {
            return Err(Error::new_spanned(ty, "cannot infer column type, add sql_type"));
        }
    };
    Ok(variant)
}

// ============================================================================
// Relationships
// ============================================================================

enum RelationKind {
    ManyToOne(String),
    OneToMany(String),
    ManyToMany,
}

#[derive(Default)]
struct RelationshipAttrs {
    kind: Option<RelationKind>,
    target: Option<String>,
    secondary: Option<String>,
    local: Option<String>,
    remote: Option<String>,
}

impl RelationshipAttrs {
    fn parse(attrs: &[Attribute]) -> syn::Result<Self> {
        let mut out = Self::default();
        for attr in attrs.iter().filter(|a| a.path().is_ident("relationship")) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("many_to_one") {
                    out.kind = Some(RelationKind::ManyToOne(string_value(&meta)?));
                } else if meta.path.is_ident("one_to_many") {
                    out.kind = Some(RelationKind::OneToMany(string_value(&meta)?));
                } else if meta.path.is_ident("many_to_many") {
                    out.kind = Some(RelationKind::ManyToMany);
                } else if meta.path.is_ident("target") {
                    out.target = Some(string_value(&meta)?);
                } else if meta.path.is_ident("secondary") {
                    out.secondary = Some(string_value(&meta)?);
                } else if meta.path.is_ident("local") {
                    out.local = Some(string_value(&meta)?);
                } else if meta.path.is_ident("remote") {
                    out.remote = Some(string_value(&meta)?);
                } else {
                    return Err(meta.error("unsupported relationship attribute"));
                }
                Ok(())
            })?;
        }
        Ok(out)
    }
}

fn relationship_def(field: &Field) -> syn::Result<TokenStream2> {
    let attrs = RelationshipAttrs::parse(&field.attrs)?;
    let Some(ident) = &field.ident else {
        return Err(Error::new_spanned(field, "expected a named field"));
    };
    let name = ident.unraw().to_string();

    let target = match attrs.target {
        Some(target) => target,
        None => innermost_type(&field.ty)
            .and_then(last_segment_ident)
            .ok_or_else(|| Error::new_spanned(&field.ty, "cannot infer target, add target"))?,
    };

    let mut relationship = match attrs.kind {
        Some(RelationKind::ManyToOne(column)) => quote! {
            ::modelgraph::orm::RelationshipDef::many_to_one(#name, #target, #column)
        },
        Some(RelationKind::OneToMany(remote)) => quote! {
            ::modelgraph::orm::RelationshipDef::one_to_many(#name, #target, #remote)
        },
        Some(RelationKind::ManyToMany) => {
            let (Some(secondary), Some(local), Some(remote)) =
                (&attrs.secondary, &attrs.local, &attrs.remote)
            else {
                return Err(Error::new_spanned(
                    ident,
                    "many_to_many needs secondary, local and remote",
                ));
            };
            quote! {
                ::modelgraph::orm::RelationshipDef::many_to_many(
                    #name, #target, #secondary, #local, #remote
                )
            }
        }
        None => {
            return Err(Error::new_spanned(
                ident,
                "expected many_to_one, one_to_many or many_to_many",
            ));
        }
    };
    if let Some(doc) = doc_string(&field.attrs) {
        relationship = quote! { #relationship.description(#doc) };
    }
    Ok(relationship)
}

// ============================================================================
// Helpers
// ============================================================================

fn has_attr(attrs: &[Attribute], name: &str) -> bool {
    attrs.iter().any(|a| a.path().is_ident(name))
}

/// `key = "value"`
fn string_value(meta: &ParseNestedMeta) -> syn::Result<String> {
    let lit: LitStr = meta.value()?.parse()?;
    Ok(lit.value())
}

/// Bare `key` or `key = bool`
fn flag_value(meta: &ParseNestedMeta) -> syn::Result<bool> {
    if meta.input.peek(Token![=]) {
        let lit: LitBool = meta.value()?.parse()?;
        Ok(lit.value)
    } else {
        Ok(true)
    }
}

/// Joined `///` lines, if any
fn doc_string(attrs: &[Attribute]) -> Option<String> {
    let lines: Vec<String> = attrs
        .iter()
        .filter(|a| a.path().is_ident("doc"))
        .filter_map(|a| match &a.meta {
            Meta::NameValue(nv) => match &nv.value {
                Expr::Lit(expr) => match &expr.lit {
                    Lit::Str(s) => Some(s.value().trim().to_string()),
                    _ => None,
                },
                _ => None,
            },
            _ => None,
        })
        .collect();
    let doc = lines.join("\n").trim().to_string();
    (!doc.is_empty()).then_some(doc)
}

fn last_segment_ident(ty: &Type) -> Option<String> {
    match ty {
        Type::Path(path) => path.path.segments.last().map(|s| s.ident.to_string()),
        _ => None,
    }
}

/// First generic argument of a path type, e.g. `T` in `Vec<T>`
fn generic_inner(ty: &Type) -> Option<&Type> {
    let Type::Path(path) = ty else {
        return None;
    };
    let PathArguments::AngleBracketed(args) = &path.path.segments.last()?.arguments else {
        return None;
    };
    args.args.iter().find_map(|arg| match arg {
        GenericArgument::Type(inner) => Some(inner),
        _ => None,
    })
}

fn option_inner(ty: &Type) -> Option<&Type> {
    if last_segment_ident(ty).as_deref() == Some("Option") {
        generic_inner(ty)
    } else {
        None
    }
}

/// Strip `Option`, `Vec` and `Box` wrappers
fn innermost_type(ty: &Type) -> Option<&Type> {
    match last_segment_ident(ty).as_deref() {
        Some("Option" | "Vec" | "Box") => generic_inner(ty).and_then(innermost_type),
        Some(_) => Some(ty),
        None => None,
    }
}
