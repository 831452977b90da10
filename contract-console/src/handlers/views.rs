use crate::authz::{AccessScope, AuthorizationRouter, Capability, Navigation, Resolution, View};
use crate::middleware::session::ConsoleSession;
use crate::models::Identity;
use askama::Template;
use axum::{
    extract::Path,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde::Serialize;

pub struct NavLink {
    pub href: String,
    pub label: &'static str,
    pub active: bool,
}

#[derive(Template)]
#[template(path = "shell.html")]
pub struct ShellTemplate {
    pub title: &'static str,
    pub view: &'static str,
    pub user_name: String,
    pub role: &'static str,
    pub nav: Vec<NavLink>,
    pub show_navigation: bool,
    pub can_compare: bool,
    pub can_upload: bool,
    pub can_manage_users: bool,
    pub can_manage_companies: bool,
}

impl ShellTemplate {
    fn new(view: View, identity: &Identity, resolution: &Resolution) -> Self {
        let show_navigation = resolution.can(Capability::Navigation);
        let nav = if show_navigation {
            resolution
                .permitted
                .iter()
                .map(|permitted| NavLink {
                    href: permitted.path(),
                    label: permitted.title(),
                    active: *permitted == view,
                })
                .collect()
        } else {
            Vec::new()
        };

        Self {
            title: view.title(),
            view: view.slug(),
            user_name: identity.display_name().to_string(),
            role: identity.role.as_str(),
            nav,
            show_navigation,
            can_compare: resolution.can(Capability::Compare),
            can_upload: resolution.can(Capability::UploadContracts),
            can_manage_users: resolution.can(Capability::ManageUsers),
            can_manage_companies: resolution.can(Capability::ManageCompanies),
        }
    }
}

/// Render a console view, or redirect to the entry view when the session may
/// not open it.
pub async fn view_handler(session: ConsoleSession, Path(slug): Path<String>) -> Response {
    let resolution = session.resolution();

    match AuthorizationRouter::navigate(&resolution, View::from_slug(&slug)) {
        Navigation::Render(view @ (View::Login | View::Register)) => {
            Redirect::to(&view.path()).into_response()
        }
        Navigation::Render(view) => match session.0.identity() {
            Some(identity) => ShellTemplate::new(view, &identity, &resolution).into_response(),
            None => Redirect::to(&View::Login.path()).into_response(),
        },
        Navigation::Redirect(target) => {
            tracing::debug!(requested = %slug, target = target.slug(), "View not permitted, redirecting");
            Redirect::to(&target.path()).into_response()
        }
    }
}

#[derive(Serialize)]
pub struct SessionSummary {
    pub authenticated: bool,
    pub identity: Option<Identity>,
    pub scope: Option<AccessScope>,
    #[serde(flatten)]
    pub resolution: Resolution,
}

/// What the current session resolves to, for client-side rendering.
pub async fn session_summary(session: ConsoleSession) -> Json<SessionSummary> {
    let state = session.0.state();
    let identity = state.identity().cloned();

    Json(SessionSummary {
        authenticated: state.is_authenticated(),
        scope: identity.as_ref().map(AccessScope::of),
        resolution: AuthorizationRouter::resolve(&state),
        identity,
    })
}
