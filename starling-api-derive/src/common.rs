// Common utility functions shared by the derive macros

/// Convert a syn::Error to a TokenStream that can be returned from a proc_macro function
pub fn to_compile_error(error: syn::Error) -> proc_macro::TokenStream {
    error.to_compile_error().into()
}

/// Converts a variant identifier such as `SleepyWork` into `sleepy_work`.
pub fn snake_case(ident: &str) -> String {
    let mut out = String::with_capacity(ident.len() + 4);
    let chars: Vec<char> = ident.chars().collect();
    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            // Split before an uppercase letter that starts a new word:
            // `FooBar` -> `foo_bar`, `HTTPServer` -> `http_server`.
            let prev_lower = i > 0 && (chars[i - 1].is_lowercase() || chars[i - 1].is_ascii_digit());
            let next_lower = chars.get(i + 1).map(|n| n.is_lowercase()).unwrap_or(false);
            let prev_upper = i > 0 && chars[i - 1].is_uppercase();
            if i > 0 && (prev_lower || (prev_upper && next_lower)) && !out.ends_with('_') {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}
