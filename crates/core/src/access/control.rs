use super::level::AccessLevel;
use super::resource::ResourceKind;
use crate::types::{AccessControlId, MembershipId, RoleId, TeamId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A grant of an access level on a resource within a team.
///
/// At most one of `organization_member` and `role` is set. When both are
/// absent the grant applies to everyone in the team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessControl {
    /// Absent for virtual grants synthesized by the resolver
    pub id: Option<AccessControlId>,
    pub team_id: TeamId,
    pub resource: ResourceKind,
    pub resource_id: Option<String>,
    pub organization_member: Option<MembershipId>,
    pub role: Option<RoleId>,
    pub access_level: AccessLevel,
    pub created_by: Option<UserId>,
    pub created_at: Option<DateTime<Utc>>,
}

impl AccessControl {
    /// A new team-wide grant on a single object
    pub fn new(
        team_id: impl Into<TeamId>,
        resource: ResourceKind,
        resource_id: impl Into<String>,
        access_level: AccessLevel,
    ) -> Self {
        Self {
            id: Some(AccessControlId::new(uuid::Uuid::new_v4().to_string())),
            team_id: team_id.into(),
            resource,
            resource_id: Some(resource_id.into()),
            organization_member: None,
            role: None,
            access_level,
            created_by: None,
            created_at: Some(Utc::now()),
        }
    }

    /// A grant that is never stored, e.g. the admin override
    pub fn virtual_grant(
        team_id: TeamId,
        resource: ResourceKind,
        resource_id: String,
        access_level: AccessLevel,
    ) -> Self {
        Self {
            id: None,
            team_id,
            resource,
            resource_id: Some(resource_id),
            organization_member: None,
            role: None,
            access_level,
            created_by: None,
            created_at: None,
        }
    }

    #[must_use]
    pub fn for_member(mut self, membership_id: impl Into<MembershipId>) -> Self {
        self.organization_member = Some(membership_id.into());
        self.role = None;
        self
    }

    #[must_use]
    pub fn for_role(mut self, role_id: impl Into<RoleId>) -> Self {
        self.role = Some(role_id.into());
        self.organization_member = None;
        self
    }

    #[must_use]
    pub fn with_created_by(mut self, user_id: impl Into<UserId>) -> Self {
        self.created_by = Some(user_id.into());
        self
    }

    pub const fn is_virtual(&self) -> bool {
        self.id.is_none()
    }

    /// Who the grant applies to, or `None` for a malformed record that names
    /// both a member and a role
    pub fn scope(&self) -> Option<GrantScope<'_>> {
        match (&self.organization_member, &self.role) {
            (None, None) => Some(GrantScope::Team),
            (Some(member), None) => Some(GrantScope::Member(member)),
            (None, Some(role)) => Some(GrantScope::Role(role)),
            (Some(_), Some(_)) => None,
        }
    }
}

/// Subject an access control is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantScope<'a> {
    Team,
    Member(&'a MembershipId),
    Role(&'a RoleId),
}

/// Criteria for the access controls relevant to one user and one object.
///
/// Matches controls on exactly this team, resource and object id that are
/// either team-wide, attached to `organization_member`, or attached to one
/// of `role_ids`. An absent member or an empty role list drops that scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessControlFilter {
    pub team_id: TeamId,
    pub resource: ResourceKind,
    pub resource_id: String,
    pub organization_member: Option<MembershipId>,
    pub role_ids: Vec<RoleId>,
}

impl AccessControlFilter {
    pub fn new(team_id: TeamId, resource: ResourceKind, resource_id: String) -> Self {
        Self {
            team_id,
            resource,
            resource_id,
            organization_member: None,
            role_ids: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_member(mut self, membership_id: Option<MembershipId>) -> Self {
        self.organization_member = membership_id;
        self
    }

    #[must_use]
    pub fn with_roles(mut self, role_ids: Vec<RoleId>) -> Self {
        self.role_ids = role_ids;
        self
    }

    pub fn matches(&self, control: &AccessControl) -> bool {
        if control.team_id != self.team_id
            || control.resource != self.resource
            || control.resource_id.as_deref() != Some(self.resource_id.as_str())
        {
            return false;
        }

        match control.scope() {
            Some(GrantScope::Team) => true,
            Some(GrantScope::Member(member)) => self.organization_member.as_ref() == Some(member),
            Some(GrantScope::Role(role)) => self.role_ids.contains(role),
            None => false,
        }
    }
}

/// Why a user ended up with a given level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantSource {
    /// Organization admins always hold the highest level
    OrganizationAdmin,
    /// No access control applied, the resource default was used
    Default,
    /// Highest stored access control
    Explicit,
}

/// Outcome of resolving the effective access control for an object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EffectiveAccess {
    /// Access controls do not apply; other authorization layers decide
    Unrestricted,
    Restricted {
        control: AccessControl,
        source: GrantSource,
    },
}

impl EffectiveAccess {
    pub const fn control(&self) -> Option<&AccessControl> {
        match self {
            Self::Unrestricted => None,
            Self::Restricted { control, .. } => Some(control),
        }
    }

    pub fn level(&self) -> Option<AccessLevel> {
        self.control().map(|control| control.access_level)
    }

    pub const fn is_restricted(&self) -> bool {
        matches!(self, Self::Restricted { .. })
    }
}

/// Result of checking a required level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessCheck {
    /// Access controls do not apply; the caller should skip this check
    Unrestricted,
    Allowed,
    Denied,
}

impl AccessCheck {
    pub const fn from_satisfied(satisfied: bool) -> Self {
        if satisfied { Self::Allowed } else { Self::Denied }
    }

    /// `None` when unrestricted, otherwise whether access is allowed
    pub const fn as_option(self) -> Option<bool> {
        match self {
            Self::Unrestricted => None,
            Self::Allowed => Some(true),
            Self::Denied => Some(false),
        }
    }

    pub const fn is_denied(self) -> bool {
        matches!(self, Self::Denied)
    }
}
