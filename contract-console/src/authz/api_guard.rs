//! Capabilities required by gated remote actions.

use super::router::Capability;
use axum::http::Method;

/// The capability a remote call needs, if any.
///
/// Reads are left to the analysis service's own tenant scoping; the actions
/// listed here are the ones the console only offers to some roles, so it
/// refuses them before they leave the console.
pub fn required_capability(method: &Method, path: &str) -> Option<Capability> {
    let path = path.trim_matches('/');
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    match (method, segments.as_slice()) {
        (&Method::POST, ["contracts", "upload"]) => Some(Capability::UploadContracts),
        (&Method::POST, ["similarity", "compare", ..]) => Some(Capability::Compare),
        (_, ["auth", "users", ..]) => Some(Capability::ManageUsers),
        (&Method::POST, ["companies"]) => Some(Capability::ManageCompanies),
        _ => None,
    }
}

/// Whether `path` reaches the service exactly as the guard reads it.
///
/// The URL parser collapses dot segments (including `%2e` spellings) and
/// treats `\\` as a separator, `?` and `#` would cut the path short, and the
/// service decodes any remaining percent escapes before routing. A path with
/// any of these could land on a different route than the one checked.
pub fn is_forwardable(path: &str) -> bool {
    if path.contains(['?', '#', '\\', '%']) {
        return false;
    }

    path.split('/').all(|segment| segment != "." && segment != "..")
}
