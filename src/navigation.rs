//! Navigation capability and the well-known surfaces.

use parking_lot::Mutex;

/// The login surface.
pub const LOGIN_PATH: &str = "/login";
/// The home surface.
pub const HOME_PATH: &str = "/";
/// Prefix of public profile views, which tolerate anonymous access.
pub const PROFILE_PREFIX: &str = "/profile/";

/// Moves the client between views.
///
/// Injected so the session recovery redirect and the access gate can be
/// driven and observed without a browser.
pub trait Navigator: Send + Sync {
    /// Returns the path of the current view.
    fn current_path(&self) -> String;

    /// Replaces the current view with `path`.
    fn redirect(&self, path: &str);
}

/// In-memory [`Navigator`] that records every redirect.
///
/// # Examples
///
/// ```
/// use posture_core::{MemoryNavigator, Navigator};
///
/// let nav = MemoryNavigator::at("/article/7");
/// nav.redirect("/login");
///
/// assert_eq!(nav.current_path(), "/login");
/// assert_eq!(nav.history(), vec!["/login".to_string()]);
/// ```
#[derive(Debug)]
pub struct MemoryNavigator {
    current: Mutex<String>,
    history: Mutex<Vec<String>>,
}

impl MemoryNavigator {
    /// Starts on the home surface.
    pub fn new() -> Self {
        Self::at(HOME_PATH)
    }

    /// Starts on `path`.
    pub fn at(path: impl Into<String>) -> Self {
        Self {
            current: Mutex::new(path.into()),
            history: Mutex::new(Vec::new()),
        }
    }

    /// Returns every redirect target, oldest first.
    pub fn history(&self) -> Vec<String> {
        self.history.lock().clone()
    }
}

impl Default for MemoryNavigator {
    fn default() -> Self {
        Self::new()
    }
}

impl Navigator for MemoryNavigator {
    fn current_path(&self) -> String {
        self.current.lock().clone()
    }

    fn redirect(&self, path: &str) {
        *self.current.lock() = path.to_string();
        self.history.lock().push(path.to_string());
    }
}

/// Returns `true` if an authentication failure seen on `path` should send the
/// user to the login surface.
///
/// The login surface itself and public profile views are exempt, so they
/// never redirect-loop while tolerating anonymous visitors.
pub fn should_redirect_to_login(path: &str) -> bool {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    let on_login = path == LOGIN_PATH || path.starts_with("/login/");
    !(on_login || path.starts_with(PROFILE_PREFIX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_and_profiles_are_exempt() {
        assert!(!should_redirect_to_login("/login"));
        assert!(!should_redirect_to_login("/login?next=/admin"));
        assert!(!should_redirect_to_login("/profile/alice"));
        assert!(!should_redirect_to_login("/profile/alice?tab=bio"));
    }

    #[test]
    fn everything_else_redirects() {
        assert!(should_redirect_to_login("/"));
        assert!(should_redirect_to_login("/admin/dashboard"));
        assert!(should_redirect_to_login("/article/3"));
        assert!(should_redirect_to_login("/loginx"));
        assert!(should_redirect_to_login("/search?q=/login"));
        assert!(should_redirect_to_login("/admin/profile/alice"));
        assert!(should_redirect_to_login("/profile"));
    }

    #[test]
    fn memory_navigator_records_history() {
        let nav = MemoryNavigator::new();
        assert_eq!(nav.current_path(), HOME_PATH);

        nav.redirect("/a");
        nav.redirect("/b");

        assert_eq!(nav.current_path(), "/b");
        assert_eq!(nav.history(), vec!["/a", "/b"]);
    }
}
