//! Effective access resolution for one user within one team.

use super::control::{AccessCheck, AccessControl, AccessControlFilter, EffectiveAccess, GrantSource};
use super::level::{
    AccessLevel, access_level_index, access_level_satisfied, default_access_level,
    highest_access_level,
};
use super::resource::{Resource, ResourceKind, ResourceKindRegistry};
use crate::state::{AccessStore, FeatureGate};
use crate::{AvailableFeature, OrganizationMembership, Result, Team, UserId};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, instrument};

/// Resolves access levels for a single (user, team) pair.
///
/// The organization membership and feature availability are looked up at
/// most once per instance, so an instance should not outlive the request it
/// was built for.
pub struct UserAccessControl {
    store: Arc<dyn AccessStore>,
    features: Arc<dyn FeatureGate>,
    registry: Arc<ResourceKindRegistry>,
    user_id: UserId,
    team: Team,
    organization_membership: OnceCell<Option<OrganizationMembership>>,
    rbac_supported: OnceCell<bool>,
    access_controls_supported: OnceCell<bool>,
}

impl UserAccessControl {
    pub fn new(
        store: Arc<dyn AccessStore>,
        features: Arc<dyn FeatureGate>,
        registry: Arc<ResourceKindRegistry>,
        user_id: UserId,
        team: Team,
    ) -> Self {
        Self {
            store,
            features,
            registry,
            user_id,
            team,
            organization_membership: OnceCell::new(),
            rbac_supported: OnceCell::new(),
            access_controls_supported: OnceCell::new(),
        }
    }

    pub const fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub const fn team(&self) -> &Team {
        &self.team
    }

    pub fn resource_kind<R: Resource + ?Sized>(&self, object: &R) -> Result<ResourceKind> {
        self.registry.resource_kind_of(object)
    }

    pub async fn organization_membership(&self) -> Result<Option<&OrganizationMembership>> {
        let membership = self
            .organization_membership
            .get_or_try_init(|| async {
                self.store
                    .get_organization_membership(&self.team.organization_id, &self.user_id)
                    .await
            })
            .await?;

        Ok(membership.as_ref())
    }

    /// Whether role-scoped access controls apply in this organization
    pub async fn rbac_supported(&self) -> Result<bool> {
        self.rbac_supported
            .get_or_try_init(|| async {
                self.features
                    .is_feature_available(
                        &self.team.organization_id,
                        AvailableFeature::RoleBasedAccess,
                    )
                    .await
            })
            .await
            .copied()
    }

    /// Whether access controls apply at all in this organization.
    ///
    /// Either project-based permissioning or advanced permissions turns
    /// them on.
    pub async fn access_controls_supported(&self) -> Result<bool> {
        self.access_controls_supported
            .get_or_try_init(|| async {
                let organization_id = &self.team.organization_id;
                if self
                    .features
                    .is_feature_available(
                        organization_id,
                        AvailableFeature::ProjectBasedPermissioning,
                    )
                    .await?
                {
                    return Ok(true);
                }

                self.features
                    .is_feature_available(organization_id, AvailableFeature::AdvancedPermissions)
                    .await
            })
            .await
            .copied()
    }

    /// All stored access controls relevant to this user on `object`
    #[instrument(
        name = "access.controls_for_object",
        skip(self, object),
        fields(user_id = %self.user_id, team_id = %self.team.id)
    )]
    pub async fn access_controls_for_object<R: Resource + ?Sized>(
        &self,
        object: &R,
    ) -> Result<Vec<AccessControl>> {
        let resource = self.resource_kind(object)?;
        let resource_id = object.resource_id();

        // Skip the role lookup entirely rather than discarding its results
        let role_ids = if self.rbac_supported().await? {
            self.store.list_role_ids(&self.user_id).await?
        } else {
            Vec::new()
        };

        let membership_id = self
            .organization_membership()
            .await?
            .map(|membership| membership.id.clone());

        let filter = AccessControlFilter::new(self.team.id.clone(), resource, resource_id)
            .with_member(membership_id)
            .with_roles(role_ids);

        self.store.find_access_controls(&filter).await
    }

    /// The access control that determines this user's level on `object`
    #[instrument(
        name = "access.control_for_object",
        skip(self, object),
        fields(user_id = %self.user_id, team_id = %self.team.id)
    )]
    pub async fn access_control_for_object<R: Resource + ?Sized>(
        &self,
        object: &R,
    ) -> Result<EffectiveAccess> {
        let resource = self.resource_kind(object)?;
        let resource_id = object.resource_id();

        if !self.access_controls_supported().await? {
            debug!(%resource, "access controls not available for organization");
            return Ok(EffectiveAccess::Unrestricted);
        }

        // Normally already rejected by the organization permission check
        let Some(membership) = self.organization_membership().await? else {
            debug!(%resource, "user has no organization membership");
            return Ok(EffectiveAccess::Unrestricted);
        };

        if membership.level.is_admin() {
            let level = highest_access_level(&resource);
            debug!(%resource, %level, "organization admin override");
            return Ok(EffectiveAccess::Restricted {
                control: AccessControl::virtual_grant(
                    self.team.id.clone(),
                    resource,
                    resource_id,
                    level,
                ),
                source: GrantSource::OrganizationAdmin,
            });
        }

        let controls = self.access_controls_for_object(object).await?;
        let Some(control) = highest_access_control(&resource, controls)? else {
            let level = default_access_level(&resource);
            debug!(%resource, %level, "no access controls, using default");
            return Ok(EffectiveAccess::Restricted {
                control: AccessControl::virtual_grant(
                    self.team.id.clone(),
                    resource,
                    resource_id,
                    level,
                ),
                source: GrantSource::Default,
            });
        };

        debug!(%resource, level = %control.access_level, "resolved explicit access control");
        Ok(EffectiveAccess::Restricted {
            control,
            source: GrantSource::Explicit,
        })
    }

    /// Check that the user holds at least `required_level` on `object`.
    ///
    /// [`AccessCheck::Unrestricted`] means access controls do not apply and
    /// the caller should rely on its other permission layers.
    pub async fn check_access_level_for_object<R: Resource + ?Sized>(
        &self,
        object: &R,
        required_level: AccessLevel,
    ) -> Result<AccessCheck> {
        let access = self.access_control_for_object(object).await?;
        let Some(control) = access.control() else {
            return Ok(AccessCheck::Unrestricted);
        };

        let satisfied =
            access_level_satisfied(&control.resource, control.access_level, required_level)?;
        Ok(AccessCheck::from_satisfied(satisfied))
    }

    /// Whether the user may change who has access to `object`.
    ///
    /// Creators always may; everyone else needs admin on the current team.
    pub async fn check_can_modify_access_levels_for_object<R: Resource + ?Sized>(
        &self,
        object: &R,
    ) -> Result<AccessCheck> {
        if object.created_by() == Some(&self.user_id) {
            return Ok(AccessCheck::Allowed);
        }

        self.check_access_level_for_object(&self.team, AccessLevel::Admin)
            .await
    }

    /// Effective level to present alongside `object`, absent when
    /// access controls do not apply
    pub async fn user_access_level<R: Resource + ?Sized>(
        &self,
        object: &R,
    ) -> Result<Option<AccessLevel>> {
        Ok(self.access_control_for_object(object).await?.level())
    }

    /// Restrict `items` to those the user can access.
    // TODO: filter by the user's explicit project access controls once the
    // in/out semantics of the project-level setting are decided
    pub fn filter_by_access_level<T>(&self, items: Vec<T>) -> Vec<T> {
        items
    }
}

/// Pick the control with the highest level under the resource's ordering
fn highest_access_control(
    resource: &ResourceKind,
    controls: Vec<AccessControl>,
) -> Result<Option<AccessControl>> {
    let mut highest: Option<(usize, AccessControl)> = None;

    for control in controls {
        let rank = access_level_index(resource, control.access_level)?;
        if highest.as_ref().is_none_or(|(best, _)| rank > *best) {
            highest = Some((rank, control));
        }
    }

    Ok(highest.map(|(_, control)| control))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::ResourceRef;
    use crate::memory::MemoryAccessStore;
    use crate::state::AccessStoreAdmin;
    use crate::state::mock::{MockAccessStore, MockFeatureGate};
    use crate::{Error, MembershipLevel, Organization, OrganizationId, RoleMembership};
    use chrono::Utc;

    const ORG: &str = "org-1";
    const TEAM: &str = "team-1";
    const USER: &str = "user-1";

    fn dashboard(id: &str) -> ResourceRef {
        ResourceRef::new("Dashboard", id)
    }

    fn dashboard_kind() -> ResourceKind {
        ResourceKind::new("dashboard")
    }

    async fn seeded_store(features: &[AvailableFeature]) -> Arc<MemoryAccessStore> {
        let store = Arc::new(MemoryAccessStore::new());
        store
            .create_organization(&Organization {
                id: ORG.into(),
                name: "Org".to_string(),
                available_features: features.to_vec(),
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        store.create_team(&Team::new(TEAM, ORG, "Project")).await.unwrap();
        store
    }

    async fn add_member(store: &MemoryAccessStore, user: &str, level: MembershipLevel) -> String {
        let membership_id = format!("membership-{user}");
        store
            .create_organization_membership(&OrganizationMembership {
                id: membership_id.as_str().into(),
                organization_id: ORG.into(),
                user_id: user.into(),
                level,
                joined_at: Utc::now(),
            })
            .await
            .unwrap();
        membership_id
    }

    fn resolver(store: Arc<MemoryAccessStore>, user: &str) -> UserAccessControl {
        UserAccessControl::new(
            store.clone(),
            store,
            Arc::new(ResourceKindRegistry::default()),
            user.into(),
            Team::new(TEAM, ORG, "Project"),
        )
    }

    fn grant(id: &str, level: AccessLevel) -> AccessControl {
        AccessControl::new(TEAM, dashboard_kind(), id, level)
    }

    #[tokio::test]
    async fn test_unsupported_organization_is_unrestricted() {
        let store = seeded_store(&[]).await;
        add_member(&store, USER, MembershipLevel::Member).await;
        store
            .create_access_control(&grant("1", AccessLevel::Viewer))
            .await
            .unwrap();

        let access = resolver(store, USER);
        let effective = access.access_control_for_object(&dashboard("1")).await.unwrap();
        assert_eq!(effective, EffectiveAccess::Unrestricted);
        assert_eq!(
            access
                .check_access_level_for_object(&dashboard("1"), AccessLevel::Editor)
                .await
                .unwrap(),
            AccessCheck::Unrestricted
        );
    }

    #[tokio::test]
    async fn test_advanced_permissions_enable_access_controls() {
        let store = seeded_store(&[AvailableFeature::AdvancedPermissions]).await;
        add_member(&store, USER, MembershipLevel::Member).await;

        let access = resolver(store, USER);
        assert!(access.access_controls_supported().await.unwrap());
        assert!(access.access_control_for_object(&dashboard("1")).await.unwrap().is_restricted());
    }

    #[tokio::test]
    async fn test_non_member_is_unrestricted() {
        let store = seeded_store(&[AvailableFeature::ProjectBasedPermissioning]).await;
        let access = resolver(store, "stranger");
        let effective = access.access_control_for_object(&dashboard("1")).await.unwrap();
        assert_eq!(effective, EffectiveAccess::Unrestricted);
    }

    #[tokio::test]
    async fn test_org_admin_gets_highest_level() {
        let store = seeded_store(&[AvailableFeature::ProjectBasedPermissioning]).await;
        add_member(&store, "admin", MembershipLevel::Admin).await;
        add_member(&store, "owner", MembershipLevel::Owner).await;
        store
            .create_access_control(&grant("1", AccessLevel::Viewer))
            .await
            .unwrap();

        for user in ["admin", "owner"] {
            let access = resolver(store.clone(), user);

            let effective = access.access_control_for_object(&dashboard("1")).await.unwrap();
            assert_eq!(effective.level(), Some(AccessLevel::Editor));
            assert!(matches!(
                effective,
                EffectiveAccess::Restricted { source: GrantSource::OrganizationAdmin, ref control }
                    if control.is_virtual()
            ));

            let project = access.access_control_for_object(access.team()).await.unwrap();
            assert_eq!(project.level(), Some(AccessLevel::Admin));
        }
    }

    #[tokio::test]
    async fn test_no_grant_uses_default_level() {
        let store = seeded_store(&[AvailableFeature::ProjectBasedPermissioning]).await;
        add_member(&store, USER, MembershipLevel::Member).await;
        let access = resolver(store, USER);

        let effective = access.access_control_for_object(&dashboard("1")).await.unwrap();
        assert_eq!(effective.level(), Some(AccessLevel::Editor));
        assert!(matches!(
            effective,
            EffectiveAccess::Restricted { source: GrantSource::Default, .. }
        ));

        let project = access.access_control_for_object(access.team()).await.unwrap();
        assert_eq!(project.level(), Some(AccessLevel::Member));
    }

    #[tokio::test]
    async fn test_highest_grant_wins() {
        let store = seeded_store(&[AvailableFeature::ProjectBasedPermissioning]).await;
        let membership = add_member(&store, USER, MembershipLevel::Member).await;
        store
            .create_access_control(&grant("1", AccessLevel::Viewer))
            .await
            .unwrap();
        store
            .create_access_control(&grant("1", AccessLevel::Editor).for_member(membership))
            .await
            .unwrap();

        let access = resolver(store, USER);
        let effective = access.access_control_for_object(&dashboard("1")).await.unwrap();
        assert_eq!(effective.level(), Some(AccessLevel::Editor));
        assert!(matches!(
            effective,
            EffectiveAccess::Restricted { source: GrantSource::Explicit, .. }
        ));
    }

    #[tokio::test]
    async fn test_team_wide_viewer_denies_editor() {
        let store = seeded_store(&[AvailableFeature::ProjectBasedPermissioning]).await;
        add_member(&store, USER, MembershipLevel::Member).await;
        store
            .create_access_control(&grant("1", AccessLevel::Viewer))
            .await
            .unwrap();

        let access = resolver(store, USER);
        let object = dashboard("1");
        assert_eq!(
            access
                .check_access_level_for_object(&object, AccessLevel::Viewer)
                .await
                .unwrap(),
            AccessCheck::Allowed
        );
        assert_eq!(
            access
                .check_access_level_for_object(&object, AccessLevel::Editor)
                .await
                .unwrap(),
            AccessCheck::Denied
        );
        // Other objects keep the default
        assert_eq!(
            access
                .check_access_level_for_object(&dashboard("2"), AccessLevel::Editor)
                .await
                .unwrap(),
            AccessCheck::Allowed
        );
    }

    #[tokio::test]
    async fn test_other_members_grants_are_ignored() {
        let store = seeded_store(&[AvailableFeature::ProjectBasedPermissioning]).await;
        add_member(&store, USER, MembershipLevel::Member).await;
        let other = add_member(&store, "user-2", MembershipLevel::Member).await;
        store
            .create_access_control(&grant("1", AccessLevel::Viewer))
            .await
            .unwrap();
        store
            .create_access_control(&grant("1", AccessLevel::Editor).for_member(other))
            .await
            .unwrap();

        let access = resolver(store, USER);
        let effective = access.access_control_for_object(&dashboard("1")).await.unwrap();
        assert_eq!(effective.level(), Some(AccessLevel::Viewer));
    }

    #[tokio::test]
    async fn test_role_grants_apply_with_rbac() {
        let store = seeded_store(&[
            AvailableFeature::ProjectBasedPermissioning,
            AvailableFeature::RoleBasedAccess,
        ])
        .await;
        add_member(&store, USER, MembershipLevel::Member).await;
        store
            .add_role_membership(&RoleMembership {
                role_id: "role-1".into(),
                user_id: USER.into(),
            })
            .await
            .unwrap();
        store
            .create_access_control(&grant("1", AccessLevel::Viewer))
            .await
            .unwrap();
        store
            .create_access_control(&grant("1", AccessLevel::Editor).for_role("role-1"))
            .await
            .unwrap();

        let access = resolver(store, USER);
        let effective = access.access_control_for_object(&dashboard("1")).await.unwrap();
        assert_eq!(effective.level(), Some(AccessLevel::Editor));
    }

    #[tokio::test]
    async fn test_role_grants_ignored_without_rbac() {
        let store = seeded_store(&[AvailableFeature::ProjectBasedPermissioning]).await;
        add_member(&store, USER, MembershipLevel::Member).await;
        store
            .add_role_membership(&RoleMembership {
                role_id: "role-1".into(),
                user_id: USER.into(),
            })
            .await
            .unwrap();
        store
            .create_access_control(&grant("1", AccessLevel::Viewer))
            .await
            .unwrap();
        store
            .create_access_control(&grant("1", AccessLevel::Editor).for_role("role-1"))
            .await
            .unwrap();

        let access = resolver(store, USER);
        let effective = access.access_control_for_object(&dashboard("1")).await.unwrap();
        assert_eq!(effective.level(), Some(AccessLevel::Viewer));
    }

    #[tokio::test]
    async fn test_role_lookup_skipped_without_rbac() {
        let mut store = MockAccessStore::new();
        store
            .expect_get_organization_membership()
            .times(1)
            .returning(|_, _| {
                Ok(Some(OrganizationMembership {
                    id: "membership-1".into(),
                    organization_id: ORG.into(),
                    user_id: USER.into(),
                    level: MembershipLevel::Member,
                    joined_at: Utc::now(),
                }))
            });
        store.expect_list_role_ids().never();
        store
            .expect_find_access_controls()
            .withf(|filter| {
                filter.role_ids.is_empty()
                    && filter.organization_member.as_deref() == Some("membership-1")
                    && filter.resource_id == "1"
            })
            .times(2)
            .returning(|_| Ok(Vec::new()));

        let mut features = MockFeatureGate::new();
        features
            .expect_is_feature_available()
            .returning(|_, feature| Ok(feature == AvailableFeature::ProjectBasedPermissioning));

        let access = UserAccessControl::new(
            Arc::new(store),
            Arc::new(features),
            Arc::new(ResourceKindRegistry::default()),
            USER.into(),
            Team::new(TEAM, ORG, "Project"),
        );

        // Two resolutions share one membership lookup
        for _ in 0..2 {
            let effective = access.access_control_for_object(&dashboard("1")).await.unwrap();
            assert_eq!(effective.level(), Some(AccessLevel::Editor));
        }
    }

    #[tokio::test]
    async fn test_feature_gate_answers_are_memoized() {
        let store = MockAccessStore::new();
        let mut features = MockFeatureGate::new();
        features
            .expect_is_feature_available()
            .withf(|org, _| org == &OrganizationId::new(ORG))
            .times(2)
            .returning(|_, _| Ok(false));

        let access = UserAccessControl::new(
            Arc::new(store),
            Arc::new(features),
            Arc::new(ResourceKindRegistry::default()),
            USER.into(),
            Team::new(TEAM, ORG, "Project"),
        );

        for _ in 0..3 {
            assert_eq!(
                access.access_control_for_object(&dashboard("1")).await.unwrap(),
                EffectiveAccess::Unrestricted
            );
        }
    }

    #[tokio::test]
    async fn test_store_errors_propagate() {
        let mut store = MockAccessStore::new();
        store
            .expect_get_organization_membership()
            .returning(|_, _| Err(Error::StateError("connection reset".to_string())));
        let mut features = MockFeatureGate::new();
        features.expect_is_feature_available().returning(|_, _| Ok(true));

        let access = UserAccessControl::new(
            Arc::new(store),
            Arc::new(features),
            Arc::new(ResourceKindRegistry::default()),
            USER.into(),
            Team::new(TEAM, ORG, "Project"),
        );

        let err = access.access_control_for_object(&dashboard("1")).await.unwrap_err();
        assert!(matches!(err, Error::StateError(message) if message == "connection reset"));
    }

    #[tokio::test]
    async fn test_unknown_resource_kind() {
        let store = seeded_store(&[AvailableFeature::ProjectBasedPermissioning]).await;
        let access = resolver(store, USER);
        let err = access
            .access_control_for_object(&ResourceRef::new("Spaceship", "1"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnknownResourceKind(name) if name == "spaceship"));
    }

    #[tokio::test]
    async fn test_required_level_outside_ordering() {
        let store = seeded_store(&[AvailableFeature::ProjectBasedPermissioning]).await;
        add_member(&store, USER, MembershipLevel::Member).await;
        let access = resolver(store, USER);
        let err = access
            .check_access_level_for_object(&dashboard("1"), AccessLevel::Admin)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidAccessLevel { .. }));
    }

    #[tokio::test]
    async fn test_creator_can_modify_access_levels() {
        let store = seeded_store(&[AvailableFeature::ProjectBasedPermissioning]).await;
        add_member(&store, USER, MembershipLevel::Member).await;
        let access = resolver(store, USER);

        let own = dashboard("1").with_created_by(USER);
        assert_eq!(
            access.check_can_modify_access_levels_for_object(&own).await.unwrap(),
            AccessCheck::Allowed
        );
    }

    #[tokio::test]
    async fn test_team_admin_can_modify_access_levels() {
        let store = seeded_store(&[AvailableFeature::ProjectBasedPermissioning]).await;
        let membership = add_member(&store, USER, MembershipLevel::Member).await;
        store
            .create_access_control(
                &AccessControl::new(TEAM, ResourceKind::project(), TEAM, AccessLevel::Admin)
                    .for_member(membership),
            )
            .await
            .unwrap();

        let access = resolver(store, USER);
        let object = dashboard("1").with_created_by("someone-else");
        assert_eq!(
            access.check_can_modify_access_levels_for_object(&object).await.unwrap(),
            AccessCheck::Allowed
        );
    }

    #[tokio::test]
    async fn test_editor_cannot_modify_access_levels() {
        let store = seeded_store(&[AvailableFeature::ProjectBasedPermissioning]).await;
        let membership = add_member(&store, USER, MembershipLevel::Member).await;
        store
            .create_access_control(&grant("1", AccessLevel::Editor).for_member(membership))
            .await
            .unwrap();

        let access = resolver(store, USER);
        let object = dashboard("1").with_created_by("someone-else");
        assert_eq!(
            access
                .check_access_level_for_object(&object, AccessLevel::Editor)
                .await
                .unwrap(),
            AccessCheck::Allowed
        );
        assert_eq!(
            access.check_can_modify_access_levels_for_object(&object).await.unwrap(),
            AccessCheck::Denied
        );
    }

    #[tokio::test]
    async fn test_org_admin_can_modify_access_levels() {
        let store = seeded_store(&[AvailableFeature::ProjectBasedPermissioning]).await;
        add_member(&store, USER, MembershipLevel::Admin).await;
        let access = resolver(store, USER);
        assert_eq!(
            access
                .check_can_modify_access_levels_for_object(&dashboard("1"))
                .await
                .unwrap(),
            AccessCheck::Allowed
        );
    }

    #[tokio::test]
    async fn test_user_access_level() {
        let store = seeded_store(&[AvailableFeature::ProjectBasedPermissioning]).await;
        add_member(&store, USER, MembershipLevel::Member).await;
        let access = resolver(store.clone(), USER);
        assert_eq!(
            access.user_access_level(&dashboard("1")).await.unwrap(),
            Some(AccessLevel::Editor)
        );

        let unsupported = seeded_store(&[]).await;
        let access = resolver(unsupported, USER);
        assert_eq!(access.user_access_level(&dashboard("1")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_filter_by_access_level_passes_through() {
        let store = seeded_store(&[]).await;
        let access = resolver(store, USER);
        let teams = vec![Team::new(TEAM, ORG, "Project"), Team::new("team-2", ORG, "Other")];
        assert_eq!(access.filter_by_access_level(teams.clone()), teams);
    }

    #[test]
    fn test_highest_access_control_rejects_invalid_level() {
        let controls = vec![grant("1", AccessLevel::Viewer), grant("1", AccessLevel::Admin)];
        let err = highest_access_control(&dashboard_kind(), controls).unwrap_err();
        assert!(matches!(err, Error::InvalidAccessLevel { level: AccessLevel::Admin, .. }));
    }

    #[test]
    fn test_highest_access_control_of_nothing() {
        assert!(highest_access_control(&dashboard_kind(), Vec::new()).unwrap().is_none());
    }
}
