//! In-memory access store, for tests and embedders without a database

use crate::access::{AccessControl, AccessControlFilter};
use crate::state::{AccessStore, AccessStoreAdmin, FeatureGate};
use crate::{
    AvailableFeature, Error, Organization, OrganizationId, OrganizationMembership, Result, RoleId,
    RoleMembership, Team, TeamId, UserId,
};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
struct Inner {
    organizations: HashMap<OrganizationId, Organization>,
    teams: HashMap<TeamId, Team>,
    memberships: Vec<OrganizationMembership>,
    role_memberships: Vec<RoleMembership>,
    access_controls: Vec<AccessControl>,
}

#[derive(Default)]
pub struct MemoryAccessStore {
    inner: RwLock<Inner>,
}

impl MemoryAccessStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccessStore for MemoryAccessStore {
    async fn get_organization_membership(
        &self,
        organization_id: &OrganizationId,
        user_id: &UserId,
    ) -> Result<Option<OrganizationMembership>> {
        let inner = self.inner.read().await;
        Ok(inner
            .memberships
            .iter()
            .find(|m| &m.organization_id == organization_id && &m.user_id == user_id)
            .cloned())
    }

    async fn list_role_ids(&self, user_id: &UserId) -> Result<Vec<RoleId>> {
        let inner = self.inner.read().await;
        Ok(inner
            .role_memberships
            .iter()
            .filter(|m| &m.user_id == user_id)
            .map(|m| m.role_id.clone())
            .collect())
    }

    async fn find_access_controls(
        &self,
        filter: &AccessControlFilter,
    ) -> Result<Vec<AccessControl>> {
        let inner = self.inner.read().await;
        Ok(inner
            .access_controls
            .iter()
            .filter(|control| filter.matches(control))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl FeatureGate for MemoryAccessStore {
    async fn is_feature_available(
        &self,
        organization_id: &OrganizationId,
        feature: AvailableFeature,
    ) -> Result<bool> {
        let inner = self.inner.read().await;
        Ok(inner
            .organizations
            .get(organization_id)
            .is_some_and(|org| org.is_feature_available(feature)))
    }
}

#[async_trait]
impl AccessStoreAdmin for MemoryAccessStore {
    async fn create_organization(&self, org: &Organization) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.organizations.contains_key(&org.id) {
            return Err(Error::StateError(format!(
                "Organization {} already exists",
                org.id
            )));
        }
        inner.organizations.insert(org.id.clone(), org.clone());
        Ok(())
    }

    async fn get_organization(&self, id: &OrganizationId) -> Result<Option<Organization>> {
        Ok(self.inner.read().await.organizations.get(id).cloned())
    }

    async fn create_team(&self, team: &Team) -> Result<()> {
        let mut inner = self.inner.write().await;
        if !inner.organizations.contains_key(&team.organization_id) {
            return Err(Error::StateError(format!(
                "Organization {} not found",
                team.organization_id
            )));
        }
        if inner.teams.contains_key(&team.id) {
            return Err(Error::StateError(format!("Team {} already exists", team.id)));
        }
        inner.teams.insert(team.id.clone(), team.clone());
        Ok(())
    }

    async fn get_team(&self, id: &TeamId) -> Result<Option<Team>> {
        Ok(self.inner.read().await.teams.get(id).cloned())
    }

    async fn create_organization_membership(
        &self,
        membership: &OrganizationMembership,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        let duplicate = inner.memberships.iter().any(|m| {
            m.id == membership.id
                || (m.organization_id == membership.organization_id
                    && m.user_id == membership.user_id)
        });
        if duplicate {
            return Err(Error::StateError(format!(
                "User {} is already a member of organization {}",
                membership.user_id, membership.organization_id
            )));
        }
        inner.memberships.push(membership.clone());
        Ok(())
    }

    async fn add_role_membership(&self, membership: &RoleMembership) -> Result<()> {
        let mut inner = self.inner.write().await;
        if !inner.role_memberships.contains(membership) {
            inner.role_memberships.push(membership.clone());
        }
        Ok(())
    }

    async fn create_access_control(&self, control: &AccessControl) -> Result<()> {
        if control.is_virtual() {
            return Err(Error::StateError(
                "Virtual access controls cannot be stored".to_string(),
            ));
        }
        if control.scope().is_none() {
            return Err(Error::StateError(
                "Access control cannot target both a member and a role".to_string(),
            ));
        }

        let mut inner = self.inner.write().await;
        if !inner.teams.contains_key(&control.team_id) {
            return Err(Error::StateError(format!("Team {} not found", control.team_id)));
        }
        inner.access_controls.push(control.clone());
        Ok(())
    }
}
