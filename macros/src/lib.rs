use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, spanned::Spanned, Ident, ItemFn, LitStr};

const USAGE: &str = "flowable_macro::test only accepts: #[flowable_macro::test], \
                     #[flowable_macro::test(current)], #[flowable_macro::test(shared)], or string \
                     equivalents";

/// Marks a test that runs the same way for sync and async bodies.
///
/// Sync functions become plain `#[test]`s. Async functions run on a tokio
/// runtime: `current` (the default) uses the current-thread flavor, `shared`
/// the multi-thread one.
#[proc_macro_attribute]
pub fn test(attr: TokenStream, item: TokenStream) -> TokenStream {
  let input = parse_macro_input!(item as ItemFn);

  let is_async = input.sig.asyncness.is_some();

  let raw_args = proc_macro2::TokenStream::from(attr);
  let tokio_args = if raw_args.is_empty() {
    proc_macro2::TokenStream::new()
  } else {
    if !is_async {
      return syn::Error::new(
        raw_args.span(),
        "flowable_macro::test flavor args are only supported for async tests. Use \
         #[flowable_macro::test] for sync tests, or make the function async.",
      )
      .to_compile_error()
      .into();
    }

    let flavor = if let Ok(ident) = syn::parse2::<Ident>(raw_args.clone()) {
      (ident.to_string(), ident.span())
    } else if let Ok(lit) = syn::parse2::<LitStr>(raw_args.clone()) {
      (lit.value(), lit.span())
    } else {
      return syn::Error::new(raw_args.span(), USAGE).to_compile_error().into();
    };

    match flavor.0.as_str() {
      "current" => quote!(flavor = "current_thread"),
      "shared" => quote!(flavor = "multi_thread"),
      _ => return syn::Error::new(flavor.1, USAGE).to_compile_error().into(),
    }
  };

  let attr = if is_async { quote!(tokio::test(#tokio_args)) } else { quote!(test) };

  let expanded = quote! {
      #[#attr]
      #input
  };

  TokenStream::from(expanded)
}
