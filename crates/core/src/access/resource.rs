use crate::types::UserId;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::{self, Display};
use std::ops::Deref;

/// Resource kinds known out of the box
pub const DEFAULT_RESOURCE_KINDS: &[&str] = &[
    "action",
    "activity_log",
    "annotation",
    "batch_export",
    "cohort",
    "dashboard",
    "dashboard_template",
    "early_access_feature",
    "event_definition",
    "experiment",
    "export",
    "feature_flag",
    "group",
    "insight",
    "query",
    "notebook",
    "organization",
    "organization_member",
    "person",
    "plugin",
    "project",
    "property_definition",
    "session_recording",
    "session_recording_playlist",
    "sharing_configuration",
    "subscription",
    "survey",
    "user",
    "webhook",
];

const PROJECT: &str = "project";
const ORGANIZATION: &str = "organization";

/// Category of object an access control applies to
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceKind(String);

impl ResourceKind {
    /// Wrap a kind read back from storage. Type names coming from callers
    /// should go through [`ResourceKindRegistry::resolve`] instead.
    pub fn new(kind: impl Into<String>) -> Self {
        Self(kind.into())
    }

    pub fn project() -> Self {
        Self(PROJECT.to_string())
    }

    pub fn organization() -> Self {
        Self(ORGANIZATION.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Projects and organizations use membership levels instead of
    /// viewer/editor levels
    pub fn is_member_based(&self) -> bool {
        matches!(self.0.as_str(), PROJECT | ORGANIZATION)
    }
}

impl Deref for ResourceKind {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An object that access controls can be attached to.
///
/// Every domain type declares the type name its resource kind is derived
/// from, so resolution never depends on runtime type inspection.
pub trait Resource: Send + Sync {
    /// Type name of the object, e.g. `"Dashboard"` or `"FeatureFlag"`
    fn type_name(&self) -> &str;

    /// Identifier of the object, as stored in `resource_id`
    fn resource_id(&self) -> String;

    /// User who created the object, if tracked
    fn created_by(&self) -> Option<&UserId> {
        None
    }
}

/// A reference to an arbitrary object, for callers that only know it by name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRef {
    pub type_name: String,
    pub id: String,
    pub created_by: Option<UserId>,
}

impl ResourceRef {
    pub fn new(type_name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            id: id.into(),
            created_by: None,
        }
    }

    #[must_use]
    pub fn with_created_by(mut self, user_id: impl Into<UserId>) -> Self {
        self.created_by = Some(user_id.into());
        self
    }
}

impl Resource for ResourceRef {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn resource_id(&self) -> String {
        self.id.clone()
    }

    fn created_by(&self) -> Option<&UserId> {
        self.created_by.as_ref()
    }
}

/// The fixed set of resource kinds access controls may reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceKindRegistry {
    kinds: BTreeSet<String>,
}

impl ResourceKindRegistry {
    /// Build a registry from a list of kinds. `project` and `organization`
    /// are always present.
    pub fn new<I, S>(kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut kinds: BTreeSet<String> = kinds.into_iter().map(Into::into).collect();
        kinds.insert(PROJECT.to_string());
        kinds.insert(ORGANIZATION.to_string());
        Self { kinds }
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.kinds.contains(kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.kinds.iter().map(String::as_str)
    }

    /// Map a type name to its resource kind
    pub fn resolve(&self, type_name: &str) -> Result<ResourceKind> {
        let name = type_name.to_lowercase();

        if name == "team" {
            return Ok(ResourceKind::project());
        }
        if name == "featureflag" {
            return Ok(ResourceKind::new("feature_flag"));
        }

        if !self.contains(&name) {
            return Err(Error::UnknownResourceKind(name));
        }

        Ok(ResourceKind(name))
    }

    pub fn resource_kind_of<R: Resource + ?Sized>(&self, resource: &R) -> Result<ResourceKind> {
        self.resolve(resource.type_name())
    }
}

impl Default for ResourceKindRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_RESOURCE_KINDS.iter().copied())
    }
}
