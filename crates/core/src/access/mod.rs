pub mod control;
pub mod level;
pub mod resolver;
pub mod resource;

pub use control::{
    AccessCheck, AccessControl, AccessControlFilter, EffectiveAccess, GrantScope, GrantSource,
};
pub use level::{
    AccessLevel, MEMBER_BASED_ACCESS_LEVELS, RESOURCE_BASED_ACCESS_LEVELS, access_level_index,
    access_level_satisfied, default_access_level, highest_access_level, ordered_access_levels,
};
pub use resolver::UserAccessControl;
pub use resource::{
    DEFAULT_RESOURCE_KINDS, Resource, ResourceKind, ResourceKindRegistry, ResourceRef,
};
