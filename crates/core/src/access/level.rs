//! Access levels and their per-resource orderings.
//!
//! Levels are plain names; which one is "higher" depends on the resource
//! kind. Always compare through [`access_level_satisfied`] or
//! [`access_level_index`], never by the enum itself.

use super::resource::ResourceKind;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    None,
    Member,
    Admin,
    Viewer,
    Editor,
}

impl AccessLevel {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Member => "member",
            Self::Admin => "admin",
            Self::Viewer => "viewer",
            Self::Editor => "editor",
        }
    }
}

impl Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "none" => Ok(Self::None),
            "member" => Ok(Self::Member),
            "admin" => Ok(Self::Admin),
            "viewer" => Ok(Self::Viewer),
            "editor" => Ok(Self::Editor),
            other => Err(Error::UnknownAccessLevel(other.to_string())),
        }
    }
}

pub const MEMBER_BASED_ACCESS_LEVELS: &[AccessLevel] =
    &[AccessLevel::None, AccessLevel::Member, AccessLevel::Admin];

pub const RESOURCE_BASED_ACCESS_LEVELS: &[AccessLevel] = &[AccessLevel::Viewer, AccessLevel::Editor];

/// Levels valid for `resource`, lowest first
pub fn ordered_access_levels(resource: &ResourceKind) -> &'static [AccessLevel] {
    if resource.is_member_based() {
        MEMBER_BASED_ACCESS_LEVELS
    } else {
        RESOURCE_BASED_ACCESS_LEVELS
    }
}

/// Level applied when no explicit access control exists
pub fn default_access_level(resource: &ResourceKind) -> AccessLevel {
    if resource.is_member_based() {
        AccessLevel::Member
    } else {
        AccessLevel::Editor
    }
}

/// Highest level in the resource's ordering
pub fn highest_access_level(resource: &ResourceKind) -> AccessLevel {
    let levels = ordered_access_levels(resource);
    levels[levels.len() - 1]
}

/// Position of `level` in the resource's ordering
pub fn access_level_index(resource: &ResourceKind, level: AccessLevel) -> Result<usize> {
    ordered_access_levels(resource)
        .iter()
        .position(|candidate| *candidate == level)
        .ok_or_else(|| Error::InvalidAccessLevel {
            resource: resource.clone(),
            level,
        })
}

pub fn access_level_satisfied(
    resource: &ResourceKind,
    current_level: AccessLevel,
    required_level: AccessLevel,
) -> Result<bool> {
    Ok(access_level_index(resource, current_level)? >= access_level_index(resource, required_level)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dashboard() -> ResourceKind {
        ResourceKind::new("dashboard")
    }

    #[test]
    fn test_member_based_ordering() {
        for resource in [ResourceKind::project(), ResourceKind::organization()] {
            assert_eq!(
                ordered_access_levels(&resource),
                &[AccessLevel::None, AccessLevel::Member, AccessLevel::Admin]
            );
        }
    }

    #[test]
    fn test_resource_based_ordering() {
        for name in ["dashboard", "feature_flag", "notebook", "insight"] {
            assert_eq!(
                ordered_access_levels(&ResourceKind::new(name)),
                &[AccessLevel::Viewer, AccessLevel::Editor]
            );
        }
    }

    #[test]
    fn test_default_levels() {
        assert_eq!(default_access_level(&ResourceKind::project()), AccessLevel::Member);
        assert_eq!(default_access_level(&ResourceKind::organization()), AccessLevel::Member);
        assert_eq!(default_access_level(&dashboard()), AccessLevel::Editor);
    }

    #[test]
    fn test_highest_levels() {
        assert_eq!(highest_access_level(&ResourceKind::project()), AccessLevel::Admin);
        assert_eq!(highest_access_level(&dashboard()), AccessLevel::Editor);
    }

    #[test]
    fn test_satisfied_is_reflexive() {
        for resource in [ResourceKind::project(), dashboard()] {
            for level in ordered_access_levels(&resource) {
                assert!(access_level_satisfied(&resource, *level, *level).unwrap());
            }
        }
    }

    #[test]
    fn test_satisfied_is_monotonic() {
        for resource in [ResourceKind::project(), dashboard()] {
            let levels = ordered_access_levels(&resource);
            for a in levels {
                for b in levels {
                    for c in levels {
                        let ab = access_level_satisfied(&resource, *a, *b).unwrap();
                        let bc = access_level_satisfied(&resource, *b, *c).unwrap();
                        if ab && bc {
                            assert!(access_level_satisfied(&resource, *a, *c).unwrap());
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_satisfied_compares_by_position() {
        let project = ResourceKind::project();
        assert!(access_level_satisfied(&project, AccessLevel::Admin, AccessLevel::Member).unwrap());
        assert!(!access_level_satisfied(&project, AccessLevel::None, AccessLevel::Member).unwrap());
        assert!(access_level_satisfied(&dashboard(), AccessLevel::Editor, AccessLevel::Viewer).unwrap());
        assert!(!access_level_satisfied(&dashboard(), AccessLevel::Viewer, AccessLevel::Editor).unwrap());
    }

    #[test]
    fn test_level_outside_ordering_is_an_error() {
        let err = access_level_satisfied(&dashboard(), AccessLevel::Admin, AccessLevel::Viewer)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidAccessLevel { level: AccessLevel::Admin, .. }
        ));
    }

    #[test]
    fn test_level_parsing() {
        assert_eq!("editor".parse::<AccessLevel>().unwrap(), AccessLevel::Editor);
        assert_eq!("none".parse::<AccessLevel>().unwrap(), AccessLevel::None);
        assert!(matches!(
            "owner".parse::<AccessLevel>(),
            Err(Error::UnknownAccessLevel(level)) if level == "owner"
        ));
        assert_eq!(serde_json::to_string(&AccessLevel::Viewer).unwrap(), "\"viewer\"");
    }
}
