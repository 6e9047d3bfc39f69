use proc_macro::TokenStream;

mod common;
mod operation;

/// Derives the `Operation` trait for a worker's request enum.
///
/// Every variant becomes one operation of the worker type. The generated
/// implementation reports the variant's operation name through
/// `Operation::name` and the whole static operation set through
/// `Operation::operations`, which a pool indexes once at construction to
/// validate calls and answer capability queries.
///
/// # Naming
///
/// Operation names default to the variant name in snake_case
/// (`SleepyWork` becomes `sleepy_work`). Use `rename` to pick another:
///
/// ```rust
/// # use starling_api::Operation;
/// #[derive(Clone, Debug, Operation)]
/// enum Request {
///     #[operation(rename = "work")]
///     SleepyWork { millis: u64 },
/// }
/// ```
///
/// # Visibility
///
/// Variants are public unless marked otherwise. Protected operations are
/// dispatchable and reported like public ones; private operations are
/// declared but never dispatchable through a pool.
///
/// ```rust
/// # use starling_api::Operation;
/// #[derive(Clone, Debug, Operation)]
/// enum Request {
///     Process(Option<String>),
///     #[operation(protected)]
///     Audit,
///     #[operation(private)]
///     Compact,
/// }
/// ```
///
/// # Arity
///
/// The arity recorded for an operation is the number of fields of its
/// variant.
#[proc_macro_derive(Operation, attributes(operation))]
pub fn derive_operation(input: TokenStream) -> TokenStream {
    operation::derive_operation_impl(input)
}
