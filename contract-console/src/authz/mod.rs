pub mod api_guard;
pub mod router;

pub use router::{
    AccessScope, AuthorizationRouter, Capability, CapabilitySet, Navigation, Resolution, View,
};
