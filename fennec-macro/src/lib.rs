use proc_macro::TokenStream;

mod model;

/// Derive macro generating a validation schema for a request model.
///
/// Every named field becomes a schema field. The Rust type decides the
/// wire type (`String` is a string, integers are ints, `Vec<_>` is a list,
/// `Option<_>` makes the field optional and nullable). Constraints are
/// declared with `#[field(...)]`.
///
/// # Example
/// ```ignore
/// use fennec::Model;
/// use serde::Deserialize;
///
/// #[derive(Deserialize, Model)]
/// pub struct CreateUser {
///     #[field(min_length = 2, max_length = 50)]
///     name: String,
///     email: String,
///     #[field(default = 18)]
///     age: i64,
///     #[field(validator = check_nickname)]
///     nickname: Option<String>,
/// }
/// ```
#[proc_macro_derive(Model, attributes(model, field))]
pub fn derive_model(input: TokenStream) -> TokenStream {
    model::derive_model(input)
}
