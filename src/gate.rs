use std::fmt;

use crate::navigation::{HOME_PATH, LOGIN_PATH};
use crate::session::{Role, Session};

/// A privilege a route can declare.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    /// Any authenticated session.
    Authenticated,
    /// An authenticated session holding this role.
    Role(Role),
}

impl Requirement {
    /// Shorthand for `Requirement::Role(Role::Admin)`.
    pub fn admin() -> Self {
        Requirement::Role(Role::Admin)
    }
}

/// Outcome of [`AccessGate::allow`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Render the route.
    Proceed,
    /// Navigate to this path instead.
    RedirectTo(&'static str),
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Proceed => write!(f, "proceed"),
            Decision::RedirectTo(path) => write!(f, "redirect to {}", path),
        }
    }
}

/// A navigable view.
///
/// Patterns are `/`-separated; a segment starting with `:` matches any
/// non-empty segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    name: String,
    pattern: String,
    requirement: Option<Requirement>,
    redirect: Option<String>,
}

impl Route {
    /// Creates a public route.
    pub fn new(name: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pattern: pattern.into(),
            requirement: None,
            redirect: None,
        }
    }

    /// Declares a privilege requirement.
    pub fn requires(mut self, requirement: Requirement) -> Self {
        self.requirement = Some(requirement);
        self
    }

    /// Makes this route an alias of `target`.
    pub fn redirects_to(mut self, target: impl Into<String>) -> Self {
        self.redirect = Some(target.into());
        self
    }

    /// Route name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path pattern.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Declared requirement, if any.
    pub fn requirement(&self) -> Option<&Requirement> {
        self.requirement.as_ref()
    }

    /// Alias target, if any.
    pub fn redirect(&self) -> Option<&str> {
        self.redirect.as_deref()
    }

    /// Returns `true` if `path` matches the pattern.
    pub fn matches(&self, path: &str) -> bool {
        let wanted = segments(&self.pattern);
        let actual = segments(path);
        wanted.len() == actual.len()
            && wanted.iter().zip(&actual).all(|(w, a)| {
                if w.starts_with(':') {
                    !a.is_empty()
                } else {
                    w == a
                }
            })
    }
}

fn segments(path: &str) -> Vec<&str> {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Ordered set of routes; the first match wins.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// The client's views. The three admin views require `ADMIN`.
    pub fn standard() -> Self {
        Self::new()
            .with(Route::new("home", HOME_PATH))
            .with(Route::new("login", LOGIN_PATH))
            .with(Route::new("register", "/register"))
            .with(Route::new("article", "/article/:id"))
            .with(Route::new("profile", "/profile/:username"))
            .with(Route::new("search", "/search"))
            .with(Route::new("feedback", "/feedback"))
            .with(
                Route::new("admin", "/admin")
                    .requires(Requirement::admin())
                    .redirects_to("/admin/dashboard"),
            )
            .with(Route::new("admin-dashboard", "/admin/dashboard").requires(Requirement::admin()))
            .with(Route::new("admin-feedbacks", "/admin/feedbacks").requires(Requirement::admin()))
    }

    /// Appends `route`.
    pub fn with(mut self, route: Route) -> Self {
        self.routes.push(route);
        self
    }

    /// Returns the first route matching `path`.
    ///
    /// Query strings, fragments and trailing slashes are ignored.
    pub fn resolve(&self, path: &str) -> Option<&Route> {
        self.routes.iter().find(|r| r.matches(path))
    }

    /// Returns every route, in match order.
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }
}

/// Guard evaluated before a route renders.
///
/// | Route requirement | Session                    | Decision                |
/// |-------------------|----------------------------|-------------------------|
/// | none              | any                        | `Proceed`               |
/// | any               | absent                     | `RedirectTo("/login")`  |
/// | `Role(r)`         | present, role is not `r`   | `RedirectTo("/")`       |
/// | `Role(r)`         | present, role is `r`       | `Proceed`               |
///
/// # Examples
///
/// ```
/// use posture_core::{AccessGate, Decision, Role, RouteTable, Session};
///
/// let table = RouteTable::standard();
/// let dashboard = table.resolve("/admin/dashboard").unwrap();
///
/// let admin = Session::new("alice", Role::Admin);
/// let user = Session::new("bob", Role::User);
///
/// assert_eq!(AccessGate::allow(dashboard, Some(&admin)), Decision::Proceed);
/// assert_eq!(AccessGate::allow(dashboard, Some(&user)), Decision::RedirectTo("/"));
/// assert_eq!(AccessGate::allow(dashboard, None), Decision::RedirectTo("/login"));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessGate;

impl AccessGate {
    /// Decides whether `session` may enter `route`. Pure.
    pub fn allow(route: &Route, session: Option<&Session>) -> Decision {
        match (route.requirement(), session) {
            (None, _) => Decision::Proceed,
            (Some(_), None) => Decision::RedirectTo(LOGIN_PATH),
            (Some(Requirement::Authenticated), Some(_)) => Decision::Proceed,
            (Some(Requirement::Role(required)), Some(session)) => {
                if session.role() == required {
                    Decision::Proceed
                } else {
                    Decision::RedirectTo(HOME_PATH)
                }
            }
        }
    }
}
