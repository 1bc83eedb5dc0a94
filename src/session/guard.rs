//! Role-gated navigation.

use std::fmt;

use super::Session;
use crate::domain::value_objects::Role;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Route {
    Login,
    Signup,
    Admin,
    Dashboard,
    Unauthorized,
}

impl Route {
    /// Role a route demands; `None` for public routes.
    pub fn required_role(&self) -> Option<Role> {
        match self {
            Self::Admin => Some(Role::Admin),
            Self::Dashboard => Some(Role::Customer),
            Self::Login | Self::Signup | Self::Unauthorized => None,
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            Self::Login => "/login",
            Self::Signup => "/signup",
            Self::Admin => "/admin",
            Self::Dashboard => "/dashboard",
            Self::Unauthorized => "/unauthorized",
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.path()) }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    Granted,
    Redirect(Route),
}

/// Where a visitor lands by default.
pub fn landing_route(session: Option<&Session>) -> Route {
    match session.filter(|s| s.has_token()).map(Session::role) {
        Some(Role::Admin) => Route::Admin,
        Some(Role::Customer) => Route::Dashboard,
        None => Route::Login,
    }
}

/// Protected routes need a session whose role matches exactly; without a
/// session, or with a blank token, every protected route sends the visitor
/// to login. Signed-in users
/// are bounced off the login and signup pages to their landing route.
pub fn guard(route: Route, session: Option<&Session>) -> Access {
    let session = session.filter(|s| s.has_token());
    match (route.required_role(), session) {
        (Some(_), None) => Access::Redirect(Route::Login),
        (Some(required), Some(s)) if s.role() != required => Access::Redirect(Route::Unauthorized),
        (Some(_), Some(_)) => Access::Granted,
        (None, Some(s)) if matches!(route, Route::Login | Route::Signup) => Access::Redirect(landing_route(Some(s))),
        (None, _) => Access::Granted,
    }
}
