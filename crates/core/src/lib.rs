//! Warden core types, access resolution and store contracts

pub mod access;
pub mod config;
pub mod error;
pub mod memory;
pub mod state;
pub mod types;

#[cfg(any(test, feature = "tests"))]
pub mod tests;

pub use config::WardenConfig;
pub use error::{Error, Result};
pub use memory::MemoryAccessStore;
pub use state::{AccessStore, AccessStoreAdmin, FeatureGate};
pub use types::{
    AccessControlId, AvailableFeature, MembershipId, MembershipLevel, Organization,
    OrganizationId, OrganizationMembership, RoleId, RoleMembership, Team, TeamId, UserId,
};
