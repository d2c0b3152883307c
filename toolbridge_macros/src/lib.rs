use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::ext::IdentExt;
use syn::meta::ParseNestedMeta;
use syn::{
    parse::Parse, parse_macro_input, Attribute, Data, DeriveInput, Field, Fields, FnArg,
    GenericArgument, ItemImpl, LitStr, PathArguments, ReturnType, Token, Type,
};

/// Derive `toolbridge::ToolArgs` for a struct with named fields.
///
/// Wire names follow serde's deserialize side: `#[serde(rename = "...")]` or
/// `rename(deserialize = "...")`, then the container's `rename_all`, then the
/// field name. Fields marked `#[serde(skip)]`, `#[serde(skip_deserializing)]`
/// or `#[serde(flatten)]` are left out of the schema.
///
/// Validation reads each wire-facing field straight from the decoded struct,
/// so every such field type must implement `Serialize`, including fields
/// marked `skip_serializing`.
///
/// Two independent annotations can be attached to each field:
/// - `#[schema("required,description=...,enum=a,enum=b,minimum=0")]`
/// - `#[validate("required,min=3,oneof=a b")]`
///
/// Validation rules outside `required`, `omitempty`, `min`, `max`, `len`,
/// `gte`, `lte`, `gt`, `lt`, `oneof`, `email` and `url` fail on every input.
/// A rule such as `required_with=other` still marks the field required in
/// the schema (see `RequiredDetection`) but rejects every call, and binding
/// such a tool logs a warning.
///
/// # Example
/// ```ignore
/// #[derive(Default, Serialize, Deserialize, ToolArgs)]
/// struct CalculateArgs {
///     #[schema("required,description=First number")]
///     #[validate("required")]
///     a: i64,
///     #[schema("required,enum=add,enum=subtract,description=Operation to perform")]
///     #[validate("required,oneof=add subtract")]
///     operation: String,
/// }
/// ```
///
/// Enums, tuple structs and unit structs derive a non-record shape, which
/// the registry rejects when the tool is registered.
#[proc_macro_derive(ToolArgs, attributes(schema, validate))]
pub fn derive_tool_args(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_tool_args(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand_tool_args(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let type_name = name.to_string();
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let mut field_values = TokenStream2::new();
    let shape = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => {
                let rename_all = container_rename_all(&input.attrs)?;
                let (specs, inserts): (Vec<_>, Vec<_>) = fields
                    .named
                    .iter()
                    .map(|field| field_spec(field, rename_all.as_ref()))
                    .collect::<syn::Result<Vec<_>>>()?
                    .into_iter()
                    .unzip();
                let inserts = inserts.into_iter().flatten();
                field_values = quote! {
                    fn field_values(&self) -> ::toolbridge::FieldValues {
                        #[allow(unused_mut)]
                        let mut values = ::toolbridge::FieldValues::new();
                        #(#inserts)*
                        values
                    }
                };
                quote! { ::toolbridge::Shape::Record(::std::vec![#(#specs),*]) }
            }
            Fields::Unnamed(_) => quote! { ::toolbridge::Shape::Tuple },
            Fields::Unit => quote! { ::toolbridge::Shape::Unit },
        },
        Data::Enum(_) => quote! { ::toolbridge::Shape::Enum },
        Data::Union(data) => {
            return Err(syn::Error::new(
                data.union_token.span,
                "ToolArgs cannot be derived for unions",
            ))
        }
    };

    Ok(quote! {
        impl #impl_generics ::toolbridge::ToolArgs for #name #ty_generics #where_clause {
            fn shape() -> ::toolbridge::Shape {
                #shape
            }

            fn type_name() -> &'static str {
                #type_name
            }

            #field_values
        }
    })
}

/// The field's `FieldSpec` builder, plus the statement recording its decoded
/// value when the field is read from the wire.
fn field_spec(
    field: &Field,
    rename_all: Option<&RenameRule>,
) -> syn::Result<(TokenStream2, Option<TokenStream2>)> {
    let ident = field
        .ident
        .as_ref()
        .ok_or_else(|| syn::Error::new_spanned(field, "expected a named field"))?;
    let ident_name = ident.unraw().to_string();
    let ty = &field.ty;

    let serde = SerdeField::parse(&field.attrs)?;
    let schema = string_attr(&field.attrs, "schema")?;
    let validate = string_attr(&field.attrs, "validate")?;

    // Skipped fields need no kind, and their type need not implement JsonSchema.
    let mut insert = None;
    let mut spec = if serde.skip {
        quote! { ::toolbridge::FieldSpec::new(#ident_name, ::toolbridge::Kind::String) }
    } else {
        let wire_name = match serde.rename {
            Some(rename) => rename,
            None => match rename_all {
                Some(rule) => rule.apply(&ident_name),
                None => ident_name.clone(),
            },
        };
        insert = Some(quote! { values.insert(#wire_name, &self.#ident); });
        quote! {
            ::toolbridge::FieldSpec::new(#ident_name, ::toolbridge::Kind::of::<#ty>())
                .wire_name(#wire_name)
        }
    };

    if let Some(schema) = schema {
        spec = quote! { #spec.schema(#schema) };
    }
    if let Some(validate) = validate {
        spec = quote! { #spec.validate(#validate) };
    }
    Ok((spec, insert))
}

/// Read `#[name("...")]`. At most one per field.
fn string_attr(attrs: &[Attribute], name: &str) -> syn::Result<Option<LitStr>> {
    let mut found: Option<LitStr> = None;
    for attr in attrs.iter().filter(|attr| attr.path().is_ident(name)) {
        if found.is_some() {
            return Err(syn::Error::new_spanned(
                attr,
                format!("duplicate #[{}] attribute", name),
            ));
        }
        found = Some(attr.parse_args::<LitStr>()?);
    }
    Ok(found)
}

#[derive(Default)]
struct SerdeField {
    rename: Option<String>,
    skip: bool,
}

impl SerdeField {
    fn parse(attrs: &[Attribute]) -> syn::Result<Self> {
        let mut field = SerdeField::default();
        for attr in attrs.iter().filter(|attr| attr.path().is_ident("serde")) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("rename") {
                    field.rename = deserialize_name(&meta)?.or(field.rename.take());
                } else if meta.path.is_ident("skip")
                    || meta.path.is_ident("skip_deserializing")
                    || meta.path.is_ident("flatten")
                {
                    field.skip = true;
                } else {
                    skip_meta(&meta)?;
                }
                Ok(())
            })?;
        }
        Ok(field)
    }
}

/// Value of `rename = "..."` or of the `deserialize` half of `rename(...)`.
fn deserialize_name(meta: &ParseNestedMeta) -> syn::Result<Option<String>> {
    if meta.input.peek(Token![=]) {
        let name: LitStr = meta.value()?.parse()?;
        return Ok(Some(name.value()));
    }

    let mut name = None;
    meta.parse_nested_meta(|inner| {
        let value: LitStr = inner.value()?.parse()?;
        if inner.path.is_ident("deserialize") {
            name = Some(value.value());
        }
        Ok(())
    })?;
    Ok(name)
}

/// Consume a serde option this macro does not care about.
fn skip_meta(meta: &ParseNestedMeta) -> syn::Result<()> {
    if meta.input.peek(Token![=]) {
        meta.value()?.parse::<syn::Expr>()?;
    } else if meta.input.peek(syn::token::Paren) {
        meta.parse_nested_meta(|nested| skip_meta(&nested))?;
    }
    Ok(())
}

fn container_rename_all(attrs: &[Attribute]) -> syn::Result<Option<RenameRule>> {
    let mut rule = None;
    for attr in attrs.iter().filter(|attr| attr.path().is_ident("serde")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename_all") {
                if let Some(name) = deserialize_name(&meta)? {
                    rule = Some(RenameRule::parse(&name).ok_or_else(|| {
                        meta.error(format!("unknown rename_all rule: {}", name))
                    })?);
                }
            } else {
                skip_meta(&meta)?;
            }
            Ok(())
        })?;
    }
    Ok(rule)
}

/// serde's `rename_all` conventions, applied to snake_case field names.
enum RenameRule {
    Lower,
    Upper,
    Pascal,
    Camel,
    Snake,
    ScreamingSnake,
    Kebab,
    ScreamingKebab,
}

impl RenameRule {
    fn parse(rule: &str) -> Option<Self> {
        match rule {
            "lowercase" => Some(RenameRule::Lower),
            "UPPERCASE" => Some(RenameRule::Upper),
            "PascalCase" => Some(RenameRule::Pascal),
            "camelCase" => Some(RenameRule::Camel),
            "snake_case" => Some(RenameRule::Snake),
            "SCREAMING_SNAKE_CASE" => Some(RenameRule::ScreamingSnake),
            "kebab-case" => Some(RenameRule::Kebab),
            "SCREAMING-KEBAB-CASE" => Some(RenameRule::ScreamingKebab),
            _ => None,
        }
    }

    fn apply(&self, field: &str) -> String {
        match self {
            RenameRule::Lower | RenameRule::Snake => field.to_ascii_lowercase(),
            RenameRule::Upper | RenameRule::ScreamingSnake => field.to_ascii_uppercase(),
            RenameRule::Pascal => pascal_case(field),
            RenameRule::Camel => {
                let pascal = pascal_case(field);
                let mut chars = pascal.chars();
                match chars.next() {
                    Some(first) => first.to_ascii_lowercase().to_string() + chars.as_str(),
                    None => pascal,
                }
            }
            RenameRule::Kebab => field.replace('_', "-"),
            RenameRule::ScreamingKebab => field.to_ascii_uppercase().replace('_', "-"),
        }
    }
}

fn pascal_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut capitalize = true;
    for ch in field.chars() {
        if ch == '_' {
            capitalize = true;
        } else if capitalize {
            out.push(ch.to_ascii_uppercase());
            capitalize = false;
        } else {
            out.push(ch);
        }
    }
    out
}

struct ToolAttr {
    name: LitStr,
    description: LitStr,
}

impl Parse for ToolAttr {
    fn parse(input: syn::parse::ParseStream) -> syn::Result<Self> {
        let mut name = None;
        let mut description = None;

        while !input.is_empty() {
            let key: syn::Ident = input.parse()?;
            input.parse::<Token![=]>()?;
            let value: LitStr = input.parse()?;

            match key.to_string().as_str() {
                "name" => name = Some(value),
                "description" => description = Some(value),
                _ => {
                    return Err(syn::Error::new(
                        key.span(),
                        "expected 'name' or 'description'",
                    ))
                }
            }

            if !input.is_empty() {
                input.parse::<Token![,]>()?;
            }
        }

        Ok(ToolAttr {
            name: name.ok_or_else(|| input.error("missing 'name' attribute"))?,
            description: description
                .ok_or_else(|| input.error("missing 'description' attribute"))?,
        })
    }
}

/// Proc macro attribute that turns an `impl` block with an async `call`
/// method into a named tool handler.
///
/// The macro will:
/// - Use the tool name and description from the attribute
/// - Infer the argument type from the third parameter of `call`
/// - Infer the output and error types from its `Result<T, E>` return type
/// - Implement `toolbridge::ToolHandler` and `toolbridge::NamedTool`
///
/// # Example
/// ```ignore
/// #[tool(name = "calculate", description = "Perform basic arithmetic operations")]
/// impl Calculator {
///     async fn call(&self, ctx: CallContext, input: CalculateArgs) -> Result<CalculateResult, String> {
///         // Implementation
///     }
/// }
///
/// registry.register_tool(Calculator)?;
/// ```
#[proc_macro_attribute]
pub fn tool(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = parse_macro_input!(attr as ToolAttr);
    let impl_block = parse_macro_input!(item as ItemImpl);
    expand_tool(&args, &impl_block)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand_tool(args: &ToolAttr, impl_block: &ItemImpl) -> syn::Result<TokenStream2> {
    let self_ty = &impl_block.self_ty;
    let (impl_generics, _, where_clause) = impl_block.generics.split_for_impl();

    // Find the call method
    let call_method = impl_block
        .items
        .iter()
        .find_map(|item| match item {
            syn::ImplItem::Fn(method) if method.sig.ident == "call" => Some(method),
            _ => None,
        })
        .ok_or_else(|| {
            syn::Error::new_spanned(self_ty, "tool impl must contain an async fn call method")
        })?;

    if call_method.sig.asyncness.is_none() {
        return Err(syn::Error::new_spanned(
            &call_method.sig,
            "call method must be async",
        ));
    }

    // (&self, ctx: CallContext, input: Args)
    let input_type = call_method
        .sig
        .inputs
        .iter()
        .nth(2)
        .and_then(|arg| match arg {
            FnArg::Typed(pat_type) => Some(&*pat_type.ty),
            FnArg::Receiver(_) => None,
        })
        .ok_or_else(|| {
            syn::Error::new_spanned(
                &call_method.sig.inputs,
                "call method must take (&self, CallContext, input)",
            )
        })?;

    let (output_type, error_type) = match &call_method.sig.output {
        ReturnType::Type(_, ty) => extract_result_types(ty),
        ReturnType::Default => None,
    }
    .ok_or_else(|| {
        syn::Error::new_spanned(&call_method.sig.output, "call method must return Result<T, E>")
    })?;

    let tool_name = &args.name;
    let tool_description = &args.description;

    Ok(quote! {
        #impl_block

        #[::toolbridge::async_trait]
        impl #impl_generics ::toolbridge::ToolHandler<#input_type> for #self_ty #where_clause {
            type Output = #output_type;
            type Error = #error_type;

            async fn call(
                &self,
                ctx: ::toolbridge::CallContext,
                args: #input_type,
            ) -> ::std::result::Result<#output_type, #error_type> {
                <#self_ty>::call(self, ctx, args).await
            }
        }

        impl #impl_generics ::toolbridge::NamedTool for #self_ty #where_clause {
            const NAME: &'static str = #tool_name;
            const DESCRIPTION: &'static str = #tool_description;
        }
    })
}

/// Extract the Ok and Err types from Result<T, E>
fn extract_result_types(ty: &Type) -> Option<(&Type, &Type)> {
    let Type::Path(type_path) = ty else {
        return None;
    };
    let segment = type_path.path.segments.last()?;
    if segment.ident != "Result" {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    let mut types = args.args.iter().filter_map(|arg| match arg {
        GenericArgument::Type(ty) => Some(ty),
        _ => None,
    });
    Some((types.next()?, types.next()?))
}
