use proc_macro::TokenStream;
use quote::quote;
use syn::{
    parse::Parser,
    parse_macro_input, FnArg, GenericArgument, ItemFn, Meta, PathArguments, ReturnType, Type,
};

/// Procedural macro to protect async functions with Horkos deduplication.
///
/// # Example
///
/// ```rust,ignore
/// #[protect(horkos = self.dedup.clone(), id = email.id)]
/// async fn send_email(&self, email: Email) -> Result<String, Error> {
///     // Your processing logic here
///     Ok("sent".to_string())
/// }
/// ```
///
/// This expands to code that calls `horkos.protect(id, || async { ... })`.
/// Because no result is persisted for deduplicated callers, the generated
/// function returns `Result<Option<A>, Error>` instead of the written
/// `Result<A, Error>`: `Ok(None)` means the work had already been handled
/// and the body did not run.
///
/// # Requirements
///
/// - The function must be `async`
/// - The function must return `Result<A, Error>` where `Error` matches the
///   coordinator's error type
/// - The `id` expression must evaluate to the coordinator's `Id` type
#[proc_macro_attribute]
pub fn protect(attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemFn);

    // Parse the attribute arguments using syn::parse
    let parser = syn::punctuated::Punctuated::<Meta, syn::Token![,]>::parse_terminated;
    let args = match parser.parse(attr.clone()) {
        Ok(args) => args,
        Err(e) => return e.to_compile_error().into(),
    };

    // Parse the attribute arguments
    let mut horkos_expr = None;
    let mut id_expr = None;

    for arg in args {
        match arg {
            Meta::NameValue(nv) => {
                let name = nv.path.get_ident().map(|i| i.to_string());
                match name.as_deref() {
                    Some("horkos") => {
                        horkos_expr = Some(nv.value);
                    }
                    Some("id") => {
                        id_expr = Some(nv.value);
                    }
                    _ => {
                        return syn::Error::new_spanned(
                            nv.path,
                            "Unknown attribute parameter. Expected 'horkos' or 'id'",
                        )
                        .to_compile_error()
                        .into();
                    }
                }
            }
            _ => {
                return syn::Error::new_spanned(arg, "Expected name-value pair like `horkos = self.dedup` or `id = email.id`")
                    .to_compile_error()
                    .into();
            }
        }
    }

    let horkos = match horkos_expr {
        Some(expr) => expr,
        None => {
            return syn::Error::new(
                proc_macro2::Span::call_site(),
                "Missing required 'horkos' parameter",
            )
            .to_compile_error()
            .into();
        }
    };

    let id = match id_expr {
        Some(expr) => expr,
        None => {
            return syn::Error::new(
                proc_macro2::Span::call_site(),
                "Missing required 'id' parameter",
            )
            .to_compile_error()
            .into();
        }
    };

    // Validate the function
    if input.sig.asyncness.is_none() {
        return syn::Error::new_spanned(
            input.sig.fn_token,
            "The #[protect] macro can only be applied to async functions",
        )
        .to_compile_error()
        .into();
    }

    // Extract function components
    let fn_vis = &input.vis;
    let fn_name = &input.sig.ident;
    let fn_generics = &input.sig.generics;
    let fn_inputs = &input.sig.inputs;
    let fn_output = &input.sig.output;
    let fn_block = &input.block;
    let fn_attrs = &input.attrs;

    // Extract parameter names for the closure
    let param_names: Vec<_> = fn_inputs
        .iter()
        .filter_map(|arg| {
            if let FnArg::Typed(pat_type) = arg {
                if let syn::Pat::Ident(pat_ident) = &*pat_type.pat {
                    return Some(&pat_ident.ident);
                }
            }
            None
        })
        .collect();

    // Split the written Result<A, E> so the wrapper can return
    // Result<Option<A>, E>
    let return_type = match fn_output {
        ReturnType::Default => {
            return syn::Error::new_spanned(
                &input.sig,
                "Function must return Result<A, Error>",
            )
            .to_compile_error()
            .into();
        }
        ReturnType::Type(_, ty) => ty,
    };

    let Some((ok_type, err_type)) = result_arguments(return_type) else {
        return syn::Error::new_spanned(
            return_type,
            "Function must return Result<A, Error>",
        )
        .to_compile_error()
        .into();
    };

    // Generate the expanded function
    let expanded = quote! {
        #(#fn_attrs)*
        #fn_vis async fn #fn_name #fn_generics(#fn_inputs) -> ::std::result::Result<::std::option::Option<#ok_type>, #err_type> {
            let __horkos_id = #id;
            let __horkos = #horkos;

            __horkos.protect(__horkos_id, || async move {
                #(let #param_names = #param_names;)*
                #fn_block
            }).await
        }
    };

    TokenStream::from(expanded)
}

/// Pull `(A, E)` out of a written `Result<A, E>` return type.
fn result_arguments(ty: &Type) -> Option<(&Type, &Type)> {
    let Type::Path(type_path) = ty else {
        return None;
    };

    let segment = type_path.path.segments.last()?;
    if segment.ident != "Result" {
        return None;
    }

    let PathArguments::AngleBracketed(arguments) = &segment.arguments else {
        return None;
    };

    let mut types = arguments.args.iter().filter_map(|arg| match arg {
        GenericArgument::Type(inner) => Some(inner),
        _ => None,
    });

    let ok_type = types.next()?;
    let err_type = types.next()?;
    Some((ok_type, err_type))
}
