use crate::access::{AccessControl, AccessControlFilter};
use crate::{
    AvailableFeature, Organization, OrganizationId, OrganizationMembership, Result, RoleId,
    RoleMembership, Team, TeamId, UserId,
};
use async_trait::async_trait;

/// Read-only lookups the access resolver needs
#[async_trait]
pub trait AccessStore: Send + Sync {
    async fn get_organization_membership(
        &self,
        organization_id: &OrganizationId,
        user_id: &UserId,
    ) -> Result<Option<OrganizationMembership>>;

    /// Roles the user currently holds
    async fn list_role_ids(&self, user_id: &UserId) -> Result<Vec<RoleId>>;

    async fn find_access_controls(
        &self,
        filter: &AccessControlFilter,
    ) -> Result<Vec<AccessControl>>;
}

/// Organization-level feature availability
#[async_trait]
pub trait FeatureGate: Send + Sync {
    async fn is_feature_available(
        &self,
        organization_id: &OrganizationId,
        feature: AvailableFeature,
    ) -> Result<bool>;
}

/// Writes used to seed a store; the resolver never calls these
#[async_trait]
pub trait AccessStoreAdmin: AccessStore + FeatureGate {
    async fn create_organization(&self, org: &Organization) -> Result<()>;
    async fn get_organization(&self, id: &OrganizationId) -> Result<Option<Organization>>;

    async fn create_team(&self, team: &Team) -> Result<()>;
    async fn get_team(&self, id: &TeamId) -> Result<Option<Team>>;

    async fn create_organization_membership(
        &self,
        membership: &OrganizationMembership,
    ) -> Result<()>;
    async fn add_role_membership(&self, membership: &RoleMembership) -> Result<()>;

    async fn create_access_control(&self, control: &AccessControl) -> Result<()>;
}

// Mock implementations for testing
#[cfg(test)]
pub mod mock {
    use super::*;
    use mockall::mock;

    mock! {
        pub AccessStore {}

        #[async_trait]
        impl AccessStore for AccessStore {
            async fn get_organization_membership(
                &self,
                organization_id: &OrganizationId,
                user_id: &UserId,
            ) -> Result<Option<OrganizationMembership>>;
            async fn list_role_ids(&self, user_id: &UserId) -> Result<Vec<RoleId>>;
            async fn find_access_controls(
                &self,
                filter: &AccessControlFilter,
            ) -> Result<Vec<AccessControl>>;
        }
    }

    mock! {
        pub FeatureGate {}

        #[async_trait]
        impl FeatureGate for FeatureGate {
            async fn is_feature_available(
                &self,
                organization_id: &OrganizationId,
                feature: AvailableFeature,
            ) -> Result<bool>;
        }
    }
}
