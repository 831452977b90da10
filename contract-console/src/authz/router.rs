//! Role to entry view and capability mapping.
//!
//! The whole mapping lives in [`AuthorizationRouter::for_role`]. Views and
//! handlers only ask whether a view is permitted or a capability is present;
//! none of them branch on the role directly.

use crate::models::{Identity, Role};
use crate::session::SessionState;
use serde::Serialize;
use std::collections::BTreeSet;

/// Top-level console views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum View {
    #[serde(rename = "login")]
    Login,
    #[serde(rename = "register")]
    Register,
    #[serde(rename = "vendor")]
    VendorPortal,
    #[serde(rename = "platform")]
    PlatformAdmin,
    #[serde(rename = "dashboard")]
    Dashboard,
    #[serde(rename = "contracts")]
    Contracts,
    #[serde(rename = "compare")]
    Compare,
    #[serde(rename = "users")]
    UserManagement,
}

impl View {
    pub const ALL: [View; 8] = [
        View::Login,
        View::Register,
        View::VendorPortal,
        View::PlatformAdmin,
        View::Dashboard,
        View::Contracts,
        View::Compare,
        View::UserManagement,
    ];

    pub fn slug(&self) -> &'static str {
        match self {
            View::Login => "login",
            View::Register => "register",
            View::VendorPortal => "vendor",
            View::PlatformAdmin => "platform",
            View::Dashboard => "dashboard",
            View::Contracts => "contracts",
            View::Compare => "compare",
            View::UserManagement => "users",
        }
    }

    pub fn from_slug(slug: &str) -> Option<View> {
        View::ALL.into_iter().find(|v| v.slug() == slug)
    }

    pub fn title(&self) -> &'static str {
        match self {
            View::Login => "Sign In",
            View::Register => "Create Account",
            View::VendorPortal => "Vendor Portal",
            View::PlatformAdmin => "Platform Administration",
            View::Dashboard => "Dashboard",
            View::Contracts => "Contracts",
            View::Compare => "Compare",
            View::UserManagement => "Users",
        }
    }

    /// Where the view is served from.
    pub fn path(&self) -> String {
        match self {
            View::Login => "/login".to_string(),
            View::Register => "/register".to_string(),
            other => format!("/view/{}", other.slug()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// The general navigation bar across dashboard, contracts and compare.
    Navigation,
    Compare,
    ManageUsers,
    UploadContracts,
    ManageCompanies,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Navigation => "navigation",
            Capability::Compare => "compare",
            Capability::ManageUsers => "manage_users",
            Capability::UploadContracts => "upload_contracts",
            Capability::ManageCompanies => "manage_companies",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CapabilitySet(BTreeSet<Capability>);

impl CapabilitySet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn contains(&self, capability: Capability) -> bool {
        self.0.contains(&capability)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        self.0.iter().copied()
    }
}

impl<const N: usize> From<[Capability; N]> for CapabilitySet {
    fn from(caps: [Capability; N]) -> Self {
        Self(caps.into_iter().collect())
    }
}

/// Data boundary an identity operates within.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum AccessScope {
    Platform,
    Tenant(i64),
    Vendor(i64),
    None,
}

impl AccessScope {
    pub fn of(identity: &Identity) -> Self {
        match (identity.role, identity.company_id, identity.vendor_id) {
            (Role::SuperAdmin, _, _) => AccessScope::Platform,
            (Role::CompanyAdmin | Role::Manager, Some(company_id), _) => {
                AccessScope::Tenant(company_id)
            }
            (Role::Vendor, _, Some(vendor_id)) => AccessScope::Vendor(vendor_id),
            _ => AccessScope::None,
        }
    }
}

/// What a session may see: where it lands, which views it may open, and
/// which optional features are shown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub role: Option<Role>,
    pub entry_view: View,
    pub permitted: Vec<View>,
    pub capabilities: CapabilitySet,
}

impl Resolution {
    fn anonymous() -> Self {
        Self {
            role: None,
            entry_view: View::Login,
            permitted: vec![View::Login, View::Register],
            capabilities: CapabilitySet::empty(),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.role.is_none()
    }

    pub fn permits(&self, view: View) -> bool {
        self.permitted.contains(&view)
    }

    pub fn can(&self, capability: Capability) -> bool {
        self.capabilities.contains(capability)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Render(View),
    Redirect(View),
}

impl Navigation {
    pub fn view(&self) -> View {
        match self {
            Navigation::Render(view) | Navigation::Redirect(view) => *view,
        }
    }
}

pub struct AuthorizationRouter;

impl AuthorizationRouter {
    /// Resolve the current session. Unauthenticated sessions get the
    /// sign-in surface and no capabilities.
    pub fn resolve(state: &SessionState) -> Resolution {
        match state.identity() {
            Some(identity) => Self::for_role(identity.role),
            None => Resolution::anonymous(),
        }
    }

    /// Resolve a role as received from the wire. Anything outside the four
    /// known roles is an anomaly and resolves like an unauthenticated session.
    pub fn resolve_role(role: &str) -> Resolution {
        match role.parse::<Role>() {
            Ok(role) => Self::for_role(role),
            Err(e) => {
                tracing::warn!(role, error = %e, "Authorization anomaly: unrecognized role");
                metrics::counter!("console_authz_anomalies_total").increment(1);
                Resolution::anonymous()
            }
        }
    }

    pub fn for_role(role: Role) -> Resolution {
        let (entry_view, permitted, capabilities) = match role {
            Role::Vendor => (
                View::VendorPortal,
                vec![View::VendorPortal],
                CapabilitySet::empty(),
            ),
            Role::SuperAdmin => (
                View::PlatformAdmin,
                vec![
                    View::PlatformAdmin,
                    View::Dashboard,
                    View::Contracts,
                    View::UserManagement,
                ],
                CapabilitySet::from([
                    Capability::Navigation,
                    Capability::ManageUsers,
                    Capability::ManageCompanies,
                ]),
            ),
            Role::CompanyAdmin => (
                View::Dashboard,
                vec![
                    View::Dashboard,
                    View::Contracts,
                    View::Compare,
                    View::UserManagement,
                ],
                CapabilitySet::from([
                    Capability::Navigation,
                    Capability::Compare,
                    Capability::ManageUsers,
                    Capability::UploadContracts,
                ]),
            ),
            Role::Manager => (
                View::Dashboard,
                vec![View::Dashboard, View::Contracts, View::Compare],
                CapabilitySet::from([
                    Capability::Navigation,
                    Capability::Compare,
                    Capability::UploadContracts,
                ]),
            ),
        };

        Resolution {
            role: Some(role),
            entry_view,
            permitted,
            capabilities,
        }
    }

    /// Decide what to show for a navigation request. `None` stands for a
    /// view the console does not know; like any view outside the permitted
    /// set it is redirected to the entry view.
    pub fn navigate(resolution: &Resolution, requested: Option<View>) -> Navigation {
        match requested {
            Some(view) if resolution.permits(view) => Navigation::Render(view),
            _ => Navigation::Redirect(resolution.entry_view),
        }
    }
}
