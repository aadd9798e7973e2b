use proc_macro::TokenStream;
use quote::quote;
use syn::{ItemFn, LitInt, parse_macro_input};

/// A `#[test]` replacement that reports wall time and enforces a budget.
///
/// Without arguments the budget is 1 second; pass an integer for slow tests:
///
/// ```ignore
/// use test_macros::timed_test;
///
/// #[timed_test]
/// fn fast_test() {}
///
/// #[timed_test(120)]
/// fn convergence_test() {
///     // allowed up to 120 seconds
/// }
/// ```
#[proc_macro_attribute]
pub fn timed_test(attr: TokenStream, item: TokenStream) -> TokenStream {
    let budget_secs: u64 = if attr.is_empty() {
        1
    } else {
        parse_macro_input!(attr as LitInt)
            .base10_parse()
            .expect("timed_test budget must be an integer number of seconds")
    };

    let func = parse_macro_input!(item as ItemFn);
    let attrs = &func.attrs;
    let vis = &func.vis;
    let name = &func.sig.ident;
    let block = &func.block;

    let expanded = quote! {
        #(#attrs)*
        #[test]
        #vis fn #name() {
            let budget = ::std::time::Duration::from_secs(#budget_secs);
            let started = ::std::time::Instant::now();

            let outcome = ::std::panic::catch_unwind(
                ::std::panic::AssertUnwindSafe(|| #block)
            );

            let elapsed = started.elapsed();
            eprintln!(
                "[timed_test] {} finished in {:.3}s",
                stringify!(#name),
                elapsed.as_secs_f64()
            );

            if let ::std::result::Result::Err(panic) = outcome {
                ::std::panic::resume_unwind(panic);
            }

            assert!(
                elapsed < budget,
                "{} ran for {:.3}s, over its {}s budget",
                stringify!(#name),
                elapsed.as_secs_f64(),
                #budget_secs
            );
        }
    };

    expanded.into()
}
