use crate::access::Resource;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::ops::Deref;
use std::str::FromStr;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Deref for $name {
            type Target = str;

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// Identifier of a user
    UserId
);
string_id!(
    /// Identifier of a team (project)
    TeamId
);
string_id!(
    /// Identifier of an organization
    OrganizationId
);
string_id!(
    /// Identifier of a role
    RoleId
);
string_id!(
    /// Identifier of an organization membership record
    MembershipId
);
string_id!(
    /// Identifier of a stored access control
    AccessControlId
);

/// Features an organization may have available
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AvailableFeature {
    RoleBasedAccess,
    ProjectBasedPermissioning,
    AdvancedPermissions,
}

impl AvailableFeature {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RoleBasedAccess => "role_based_access",
            Self::ProjectBasedPermissioning => "project_based_permissioning",
            Self::AdvancedPermissions => "advanced_permissions",
        }
    }
}

impl Display for AvailableFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AvailableFeature {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "role_based_access" => Ok(Self::RoleBasedAccess),
            "project_based_permissioning" => Ok(Self::ProjectBasedPermissioning),
            "advanced_permissions" => Ok(Self::AdvancedPermissions),
            other => Err(Error::Config(format!("unknown feature: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    pub id: OrganizationId,
    pub name: String,
    pub available_features: Vec<AvailableFeature>,
    pub created_at: DateTime<Utc>,
}

impl Organization {
    pub fn is_feature_available(&self, feature: AvailableFeature) -> bool {
        self.available_features.contains(&feature)
    }
}

/// A project inside an organization; access checks are always scoped to one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub organization_id: OrganizationId,
    pub name: String,
}

impl Team {
    pub fn new(
        id: impl Into<TeamId>,
        organization_id: impl Into<OrganizationId>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            organization_id: organization_id.into(),
            name: name.into(),
        }
    }
}

impl Resource for Team {
    fn type_name(&self) -> &str {
        "Team"
    }

    fn resource_id(&self) -> String {
        self.id.to_string()
    }
}

/// Ordinal level of an organization membership
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum MembershipLevel {
    Member = 1,
    Admin = 8,
    Owner = 15,
}

impl MembershipLevel {
    pub const fn ordinal(self) -> i64 {
        self as i64
    }

    pub const fn is_admin(self) -> bool {
        self.ordinal() >= Self::Admin.ordinal()
    }
}

impl TryFrom<i64> for MembershipLevel {
    type Error = Error;

    fn try_from(value: i64) -> Result<Self> {
        match value {
            1 => Ok(Self::Member),
            8 => Ok(Self::Admin),
            15 => Ok(Self::Owner),
            other => Err(Error::InvalidMembershipLevel(other)),
        }
    }
}

impl From<MembershipLevel> for i64 {
    fn from(level: MembershipLevel) -> Self {
        level.ordinal()
    }
}

impl FromStr for MembershipLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "member" => Ok(Self::Member),
            "admin" => Ok(Self::Admin),
            "owner" => Ok(Self::Owner),
            other => other
                .parse::<i64>()
                .map_err(|_| Error::Config(format!("unknown membership level: {other}")))
                .and_then(Self::try_from),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationMembership {
    pub id: MembershipId,
    pub organization_id: OrganizationId,
    pub user_id: UserId,
    pub level: MembershipLevel,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleMembership {
    pub role_id: RoleId,
    pub user_id: UserId,
}
