//! Translation from configured route paths and methods to axum routing.
//!
//! Config paths use `:param` segments and a trailing `*name` catch-all
//! (`/users/:id`, `/static/*path`). [`axum_path`] rewrites them into
//! axum's `{param}` / `{*name}` syntax. Method lists become a single
//! [`MethodFilter`], so a request to a known path with a method outside
//! the list answers `405`.

use axum::http::Method;
use axum::routing::MethodFilter;

#[must_use]
pub fn axum_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if let Some(name) = segment.strip_prefix(':') {
                format!("{{{name}}}")
            } else if let Some(name) = segment.strip_prefix('*') {
                let name = if name.is_empty() { "rest" } else { name };
                format!("{{*{name}}}")
            } else {
                segment.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Union of the allowed methods. `None` when the list is empty or names
/// nothing axum can route on.
#[must_use]
pub fn method_filter(methods: &[String]) -> Option<MethodFilter> {
    methods
        .iter()
        .filter_map(|m| {
            let method = Method::from_bytes(m.to_uppercase().as_bytes()).ok()?;
            MethodFilter::try_from(method).ok()
        })
        .reduce(MethodFilter::or)
}

/// Nesting prefix for a static-file mount, `None` for the root.
#[must_use]
pub fn mount_path(path: &str) -> Option<&str> {
    let trimmed = path.trim_end_matches('/');
    (!trimmed.is_empty()).then_some(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_paths_unchanged() {
        assert_eq!(axum_path("/api"), "/api");
        assert_eq!(axum_path("/"), "/");
        assert_eq!(axum_path("/api/v1/"), "/api/v1/");
    }

    #[test]
    fn params_are_braced() {
        assert_eq!(axum_path("/users/:id"), "/users/{id}");
        assert_eq!(
            axum_path("/users/:user_id/orders/:order_id"),
            "/users/{user_id}/orders/{order_id}"
        );
    }

    #[test]
    fn catch_all_is_braced() {
        assert_eq!(axum_path("/static/*path"), "/static/{*path}");
        assert_eq!(axum_path("/files/*"), "/files/{*rest}");
    }

    #[test]
    fn methods_union() {
        assert!(method_filter(&["get".into(), "POST".into()]).is_some());
        assert!(method_filter(&[]).is_none());
        assert!(method_filter(&["BREW".into()]).is_none());
    }

    #[test]
    fn mount_paths() {
        assert_eq!(mount_path("/static/"), Some("/static"));
        assert_eq!(mount_path("/static"), Some("/static"));
        assert_eq!(mount_path("/"), None);
    }
}
