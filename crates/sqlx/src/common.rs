//! Row types and conversions shared between database implementations

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use warden_core::access::{AccessControl, AccessLevel, ResourceKind};
use warden_core::{
    AvailableFeature, Error, MembershipLevel, Organization, OrganizationMembership, Result, Team,
};

// Helper functions for timestamp conversion
pub fn datetime_to_string(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

pub fn string_to_datetime(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::StateError(format!("Invalid timestamp format: {e}")))
}

pub fn features_to_string(features: &[AvailableFeature]) -> Result<String> {
    Ok(serde_json::to_string(features)?)
}

#[derive(FromRow)]
pub struct OrganizationRow {
    pub id: String,
    pub name: String,
    pub available_features: String, // JSON array
    pub created_at: String,         // ISO8601 format
}

#[derive(FromRow)]
pub struct TeamRow {
    pub id: String,
    pub organization_id: String,
    pub name: String,
}

#[derive(FromRow)]
pub struct MembershipRow {
    pub id: String,
    pub organization_id: String,
    pub user_id: String,
    pub level: i32,
    pub joined_at: String, // ISO8601 format
}

#[derive(FromRow)]
pub struct RoleRow {
    pub role_id: String,
}

#[derive(FromRow)]
pub struct AccessControlRow {
    pub id: String,
    pub team_id: String,
    pub resource: String,
    pub resource_id: Option<String>,
    pub organization_member_id: Option<String>,
    pub role_id: Option<String>,
    pub access_level: String,
    pub created_by: Option<String>,
    pub created_at: Option<String>, // ISO8601 format
}

impl TryFrom<OrganizationRow> for Organization {
    type Error = Error;

    fn try_from(row: OrganizationRow) -> Result<Self> {
        Ok(Organization {
            id: row.id.into(),
            name: row.name,
            available_features: serde_json::from_str(&row.available_features)?,
            created_at: string_to_datetime(&row.created_at)?,
        })
    }
}

impl From<TeamRow> for Team {
    fn from(row: TeamRow) -> Self {
        Team::new(row.id, row.organization_id, row.name)
    }
}

impl TryFrom<MembershipRow> for OrganizationMembership {
    type Error = Error;

    fn try_from(row: MembershipRow) -> Result<Self> {
        Ok(OrganizationMembership {
            id: row.id.into(),
            organization_id: row.organization_id.into(),
            user_id: row.user_id.into(),
            level: MembershipLevel::try_from(i64::from(row.level))?,
            joined_at: string_to_datetime(&row.joined_at)?,
        })
    }
}

impl TryFrom<AccessControlRow> for AccessControl {
    type Error = Error;

    fn try_from(row: AccessControlRow) -> Result<Self> {
        Ok(AccessControl {
            id: Some(row.id.into()),
            team_id: row.team_id.into(),
            resource: ResourceKind::new(row.resource),
            resource_id: row.resource_id,
            organization_member: row.organization_member_id.map(Into::into),
            role: row.role_id.map(Into::into),
            access_level: row.access_level.parse::<AccessLevel>()?,
            created_by: row.created_by.map(Into::into),
            created_at: row
                .created_at
                .as_deref()
                .map(string_to_datetime)
                .transpose()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_round_trip() {
        let now = Utc::now();
        let parsed = string_to_datetime(&datetime_to_string(now)).unwrap();
        assert_eq!(parsed, now);
        assert!(string_to_datetime("yesterday").is_err());
    }

    #[test]
    fn test_access_control_row_rejects_unknown_level() {
        let row = AccessControlRow {
            id: "ac-1".to_string(),
            team_id: "team-1".to_string(),
            resource: "dashboard".to_string(),
            resource_id: Some("1".to_string()),
            organization_member_id: None,
            role_id: None,
            access_level: "owner".to_string(),
            created_by: None,
            created_at: None,
        };
        let err = AccessControl::try_from(row).unwrap_err();
        assert!(matches!(err, Error::UnknownAccessLevel(_)));
    }

    #[test]
    fn test_membership_row_rejects_unknown_level() {
        let row = MembershipRow {
            id: "m-1".to_string(),
            organization_id: "org-1".to_string(),
            user_id: "user-1".to_string(),
            level: 3,
            joined_at: datetime_to_string(Utc::now()),
        };
        let err = OrganizationMembership::try_from(row).unwrap_err();
        assert!(matches!(err, Error::InvalidMembershipLevel(3)));
    }

    #[test]
    fn test_organization_row_parses_features() {
        let row = OrganizationRow {
            id: "org-1".to_string(),
            name: "Acme".to_string(),
            available_features: r#"["role_based_access","advanced_permissions"]"#.to_string(),
            created_at: datetime_to_string(Utc::now()),
        };
        let org = Organization::try_from(row).unwrap();
        assert!(org.is_feature_available(AvailableFeature::RoleBasedAccess));
        assert!(!org.is_feature_available(AvailableFeature::ProjectBasedPermissioning));
    }
}
