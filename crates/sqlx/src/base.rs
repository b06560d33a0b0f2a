//! Base generic SQLx implementation

use async_trait::async_trait;
use sqlx::{Database, Executor, FromRow, IntoArguments, Pool};
use std::marker::PhantomData;
use tracing::instrument;
use warden_core::access::{AccessControl, AccessControlFilter};
use warden_core::{
    AccessStore, AccessStoreAdmin, AvailableFeature, Error, FeatureGate, Organization,
    OrganizationId, OrganizationMembership, Result, RoleId, RoleMembership, Team, TeamId, UserId,
};

use crate::common::*;

const ACCESS_CONTROL_COLUMNS: &str = "id, team_id, resource, resource_id, organization_member_id, role_id, access_level, created_by, created_at";

/// Generic SQLx implementation of the access store traits
pub struct SqlxAccessStore<DB: Database> {
    pool: Pool<DB>,
    _phantom: PhantomData<DB>,
}

impl<DB: Database> SqlxAccessStore<DB> {
    pub fn from_pool(pool: Pool<DB>) -> Self {
        Self {
            pool,
            _phantom: PhantomData,
        }
    }

    /// Get the underlying pool (for running migrations externally)
    pub fn pool(&self) -> &Pool<DB> {
        &self.pool
    }
}

/// Builds the lookup for one object, keeping only the scopes the filter can
/// satisfy. Placeholders are numbered in bind order.
fn access_control_query(filter: &AccessControlFilter) -> String {
    let mut scopes = vec!["(organization_member_id IS NULL AND role_id IS NULL)".to_string()];
    let mut next = 4;

    if filter.organization_member.is_some() {
        scopes.push(format!("organization_member_id = ${next}"));
        next += 1;
    }

    if !filter.role_ids.is_empty() {
        let placeholders: Vec<String> = (next..next + filter.role_ids.len())
            .map(|n| format!("${n}"))
            .collect();
        scopes.push(format!(
            "(organization_member_id IS NULL AND role_id IN ({}))",
            placeholders.join(", ")
        ));
    }

    format!(
        "SELECT {ACCESS_CONTROL_COLUMNS} FROM access_controls \
         WHERE team_id = $1 AND resource = $2 AND resource_id = $3 AND ({})",
        scopes.join(" OR ")
    )
}

#[async_trait]
impl<DB> AccessStore for SqlxAccessStore<DB>
where
    DB: Database,
    for<'c> &'c mut <DB as Database>::Connection: Executor<'c, Database = DB>,
    for<'r> MembershipRow: FromRow<'r, DB::Row>,
    for<'r> RoleRow: FromRow<'r, DB::Row>,
    for<'r> AccessControlRow: FromRow<'r, DB::Row>,
    // Required for async_trait with generic parameters
    DB: Send + Sync,
    DB::Connection: Send,
    // Required for parameter binding
    for<'q> String: sqlx::Encode<'q, DB> + sqlx::Type<DB>,
    for<'q> &'q str: sqlx::Encode<'q, DB> + sqlx::Type<DB>,
    // Required for queries
    for<'q> <DB as Database>::Arguments<'q>: IntoArguments<'q, DB>,
{
    #[instrument(name = "db.get_organization_membership", skip(self))]
    async fn get_organization_membership(
        &self,
        organization_id: &OrganizationId,
        user_id: &UserId,
    ) -> Result<Option<OrganizationMembership>> {
        let row = sqlx::query_as::<_, MembershipRow>(
            "SELECT id, organization_id, user_id, level, joined_at FROM organization_memberships WHERE organization_id = $1 AND user_id = $2",
        )
        .bind(organization_id.as_str())
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::StateError(format!("Failed to get membership: {e}")))?;

        row.map(TryInto::try_into).transpose()
    }

    #[instrument(name = "db.list_role_ids", skip(self))]
    async fn list_role_ids(&self, user_id: &UserId) -> Result<Vec<RoleId>> {
        let rows = sqlx::query_as::<_, RoleRow>(
            "SELECT role_id FROM role_memberships WHERE user_id = $1",
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::StateError(format!("Failed to list roles: {e}")))?;

        Ok(rows.into_iter().map(|row| row.role_id.into()).collect())
    }

    #[instrument(
        name = "db.find_access_controls",
        skip(self, filter),
        fields(team_id = %filter.team_id, resource = %filter.resource, resource_id = %filter.resource_id)
    )]
    async fn find_access_controls(
        &self,
        filter: &AccessControlFilter,
    ) -> Result<Vec<AccessControl>> {
        let sql = access_control_query(filter);

        let mut query = sqlx::query_as::<_, AccessControlRow>(&sql)
            .bind(filter.team_id.to_string())
            .bind(filter.resource.to_string())
            .bind(filter.resource_id.clone());
        if let Some(member) = &filter.organization_member {
            query = query.bind(member.to_string());
        }
        for role in &filter.role_ids {
            query = query.bind(role.to_string());
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::StateError(format!("Failed to find access controls: {e}")))?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[async_trait]
impl<DB> FeatureGate for SqlxAccessStore<DB>
where
    DB: Database,
    for<'c> &'c mut <DB as Database>::Connection: Executor<'c, Database = DB>,
    for<'r> OrganizationRow: FromRow<'r, DB::Row>,
    DB: Send + Sync,
    DB::Connection: Send,
    for<'q> &'q str: sqlx::Encode<'q, DB> + sqlx::Type<DB>,
    for<'q> <DB as Database>::Arguments<'q>: IntoArguments<'q, DB>,
{
    #[instrument(name = "db.is_feature_available", skip(self))]
    async fn is_feature_available(
        &self,
        organization_id: &OrganizationId,
        feature: AvailableFeature,
    ) -> Result<bool> {
        let row = sqlx::query_as::<_, OrganizationRow>(
            "SELECT id, name, available_features, created_at FROM organizations WHERE id = $1",
        )
        .bind(organization_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::StateError(format!("Failed to get organization: {e}")))?;

        match row {
            Some(row) => Ok(Organization::try_from(row)?.is_feature_available(feature)),
            None => Ok(false),
        }
    }
}

#[async_trait]
impl<DB> AccessStoreAdmin for SqlxAccessStore<DB>
where
    DB: Database,
    for<'c> &'c mut <DB as Database>::Connection: Executor<'c, Database = DB>,
    for<'r> OrganizationRow: FromRow<'r, DB::Row>,
    for<'r> TeamRow: FromRow<'r, DB::Row>,
    for<'r> MembershipRow: FromRow<'r, DB::Row>,
    for<'r> RoleRow: FromRow<'r, DB::Row>,
    for<'r> AccessControlRow: FromRow<'r, DB::Row>,
    DB: Send + Sync,
    DB::Connection: Send,
    for<'q> String: sqlx::Encode<'q, DB> + sqlx::Type<DB>,
    for<'q> &'q str: sqlx::Encode<'q, DB> + sqlx::Type<DB>,
    for<'q> Option<String>: sqlx::Encode<'q, DB> + sqlx::Type<DB>,
    for<'q> i32: sqlx::Encode<'q, DB> + sqlx::Type<DB>,
    for<'q> <DB as Database>::Arguments<'q>: IntoArguments<'q, DB>,
{
    #[instrument(name = "db.create_organization", skip(self, org), fields(org_id = %org.id))]
    async fn create_organization(&self, org: &Organization) -> Result<()> {
        sqlx::query(
            "INSERT INTO organizations (id, name, available_features, created_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(org.id.as_str())
        .bind(org.name.as_str())
        .bind(features_to_string(&org.available_features)?)
        .bind(datetime_to_string(org.created_at))
        .execute(&self.pool)
        .await
        .map_err(|e| Error::StateError(format!("Failed to create organization: {e}")))?;

        Ok(())
    }

    #[instrument(name = "db.get_organization", skip(self))]
    async fn get_organization(&self, id: &OrganizationId) -> Result<Option<Organization>> {
        let row = sqlx::query_as::<_, OrganizationRow>(
            "SELECT id, name, available_features, created_at FROM organizations WHERE id = $1",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::StateError(format!("Failed to get organization: {e}")))?;

        row.map(TryInto::try_into).transpose()
    }

    #[instrument(name = "db.create_team", skip(self, team), fields(team_id = %team.id))]
    async fn create_team(&self, team: &Team) -> Result<()> {
        sqlx::query("INSERT INTO teams (id, organization_id, name) VALUES ($1, $2, $3)")
            .bind(team.id.as_str())
            .bind(team.organization_id.as_str())
            .bind(team.name.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| Error::StateError(format!("Failed to create team: {e}")))?;

        Ok(())
    }

    #[instrument(name = "db.get_team", skip(self))]
    async fn get_team(&self, id: &TeamId) -> Result<Option<Team>> {
        let row = sqlx::query_as::<_, TeamRow>(
            "SELECT id, organization_id, name FROM teams WHERE id = $1",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::StateError(format!("Failed to get team: {e}")))?;

        Ok(row.map(Into::into))
    }

    #[instrument(
        name = "db.create_organization_membership",
        skip(self, membership),
        fields(org_id = %membership.organization_id, user_id = %membership.user_id)
    )]
    async fn create_organization_membership(
        &self,
        membership: &OrganizationMembership,
    ) -> Result<()> {
        // Level ordinals are small, the cast cannot truncate
        let level = membership.level.ordinal() as i32;

        sqlx::query(
            "INSERT INTO organization_memberships (id, organization_id, user_id, level, joined_at) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(membership.id.as_str())
        .bind(membership.organization_id.as_str())
        .bind(membership.user_id.as_str())
        .bind(level)
        .bind(datetime_to_string(membership.joined_at))
        .execute(&self.pool)
        .await
        .map_err(|e| Error::StateError(format!("Failed to create membership: {e}")))?;

        Ok(())
    }

    #[instrument(name = "db.add_role_membership", skip(self))]
    async fn add_role_membership(&self, membership: &RoleMembership) -> Result<()> {
        sqlx::query(
            "INSERT INTO role_memberships (role_id, user_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(membership.role_id.as_str())
        .bind(membership.user_id.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| Error::StateError(format!("Failed to add role membership: {e}")))?;

        Ok(())
    }

    #[instrument(
        name = "db.create_access_control",
        skip(self, control),
        fields(team_id = %control.team_id, resource = %control.resource)
    )]
    async fn create_access_control(&self, control: &AccessControl) -> Result<()> {
        let Some(id) = &control.id else {
            return Err(Error::StateError(
                "Virtual access controls cannot be stored".to_string(),
            ));
        };
        if control.scope().is_none() {
            return Err(Error::StateError(
                "Access control cannot target both a member and a role".to_string(),
            ));
        }

        sqlx::query(&format!(
            "INSERT INTO access_controls ({ACCESS_CONTROL_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"
        ))
        .bind(id.to_string())
        .bind(control.team_id.to_string())
        .bind(control.resource.to_string())
        .bind(control.resource_id.clone())
        .bind(control.organization_member.as_ref().map(ToString::to_string))
        .bind(control.role.as_ref().map(ToString::to_string))
        .bind(control.access_level.to_string())
        .bind(control.created_by.as_ref().map(ToString::to_string))
        .bind(control.created_at.map(datetime_to_string))
        .execute(&self.pool)
        .await
        .map_err(|e| Error::StateError(format!("Failed to create access control: {e}")))?;

        Ok(())
    }
}
