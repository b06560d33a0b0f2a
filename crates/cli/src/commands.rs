//! CLI commands

use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::Subcommand;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use warden_core::access::{
    AccessControl, AccessLevel, ResourceKind, ResourceRef, UserAccessControl, access_level_index,
};
use warden_core::{
    AccessStore, AccessStoreAdmin, AvailableFeature, FeatureGate, MembershipLevel, Organization,
    OrganizationMembership, RoleMembership, Team, TeamId, UserId, WardenConfig,
};

use crate::config;

/// Flags shared by every subcommand
pub struct GlobalOptions {
    pub config: Option<PathBuf>,
    pub database_url: Option<String>,
}

/// The object whose access is being resolved
#[derive(clap::Args, Debug)]
pub struct ObjectArgs {
    /// User to resolve access for
    #[arg(long)]
    user: String,

    /// Team (project) the object belongs to
    #[arg(long)]
    team: String,

    /// Object type, e.g. Dashboard or feature_flag
    #[arg(long = "type")]
    object_type: String,

    /// Object id
    #[arg(long)]
    id: String,

    /// User who created the object
    #[arg(long)]
    created_by: Option<String>,
}

impl ObjectArgs {
    fn object(&self) -> ResourceRef {
        let object = ResourceRef::new(self.object_type.as_str(), self.id.as_str());
        match &self.created_by {
            Some(creator) => object.with_created_by(creator.as_str()),
            None => object,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve the effective access control for an object
    Resolve {
        #[command(flatten)]
        object: ObjectArgs,
    },

    /// Check whether a user holds at least a given level on an object
    Check {
        #[command(flatten)]
        object: ObjectArgs,

        /// Required access level
        #[arg(long)]
        level: AccessLevel,
    },

    /// Check whether a user may change access levels on an object
    CanModify {
        #[command(flatten)]
        object: ObjectArgs,
    },

    /// List the configured resource kinds
    Kinds,

    /// Insert records into the access store
    Seed {
        #[command(subcommand)]
        command: SeedCommands,
    },

    /// Configuration file operations
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum SeedCommands {
    /// Create an organization
    Organization {
        #[arg(long)]
        id: String,

        #[arg(long)]
        name: String,

        /// Feature available to the organization (repeatable)
        #[arg(long = "feature")]
        features: Vec<AvailableFeature>,
    },

    /// Create a team (project) in an organization
    Team {
        #[arg(long)]
        id: String,

        #[arg(long)]
        organization: String,

        #[arg(long)]
        name: String,
    },

    /// Add a user to an organization
    Member {
        #[arg(long)]
        organization: String,

        #[arg(long)]
        user: String,

        /// member, admin, owner or the numeric level
        #[arg(long, default_value = "member")]
        level: MembershipLevel,

        /// Membership id (generated when omitted)
        #[arg(long)]
        id: Option<String>,
    },

    /// Give a user a role
    Role {
        #[arg(long)]
        role: String,

        #[arg(long)]
        user: String,
    },

    /// Store an access control on an object
    Grant {
        #[arg(long)]
        team: String,

        /// Resource kind, e.g. dashboard
        #[arg(long)]
        resource: String,

        #[arg(long)]
        resource_id: String,

        #[arg(long)]
        level: AccessLevel,

        /// Restrict the grant to this organization membership
        #[arg(long, conflicts_with = "role")]
        member: Option<String>,

        /// Restrict the grant to holders of this role
        #[arg(long)]
        role: Option<String>,

        #[arg(long)]
        created_by: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Write the default configuration file
    Generate {
        /// Output file path (defaults to the user config directory)
        output: Option<PathBuf>,
    },
}

impl GlobalOptions {
    fn load_config(&self) -> Result<WardenConfig> {
        config::load_config(self.config.as_deref(), self.database_url.clone())
    }
}

impl Commands {
    pub async fn execute(self, options: GlobalOptions) -> Result<()> {
        match self {
            Commands::Resolve { object } => {
                let config = options.load_config()?;
                let access = resolver(&config, &object).await?;
                let effective = access.access_control_for_object(&object.object()).await?;
                print_json(&json!({
                    "access": effective,
                    "user_access_level": effective.level(),
                }))
            }
            Commands::Check { object, level } => {
                let config = options.load_config()?;
                let access = resolver(&config, &object).await?;
                let check = access
                    .check_access_level_for_object(&object.object(), level)
                    .await?;
                print_json(&json!({ "required_level": level, "result": check }))
            }
            Commands::CanModify { object } => {
                let config = options.load_config()?;
                let access = resolver(&config, &object).await?;
                let check = access
                    .check_can_modify_access_levels_for_object(&object.object())
                    .await?;
                print_json(&json!({ "result": check }))
            }
            Commands::Kinds => {
                let registry = options.load_config()?.registry();
                print_json(&json!(registry.iter().collect::<Vec<_>>()))
            }
            Commands::Seed { command } => {
                let config = options.load_config()?;
                let store = connect(&config).await?;
                command.execute(store.as_ref(), &config).await
            }
            Commands::Config { command } => command.execute(),
        }
    }
}

impl SeedCommands {
    async fn execute(self, store: &dyn AccessStoreAdmin, config: &WardenConfig) -> Result<()> {
        match self {
            SeedCommands::Organization { id, name, features } => {
                store
                    .create_organization(&Organization {
                        id: id.clone().into(),
                        name,
                        available_features: features,
                        created_at: Utc::now(),
                    })
                    .await?;
                info!(org_id = %id, "Created organization");
                print_json(&json!({ "organization": id }))
            }
            SeedCommands::Team {
                id,
                organization,
                name,
            } => {
                let team = Team::new(id, organization, name);
                store.create_team(&team).await?;
                info!(team_id = %team.id, "Created team");
                print_json(&json!({ "team": team.id }))
            }
            SeedCommands::Member {
                organization,
                user,
                level,
                id,
            } => {
                let membership = OrganizationMembership {
                    id: id
                        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
                        .into(),
                    organization_id: organization.into(),
                    user_id: user.into(),
                    level,
                    joined_at: Utc::now(),
                };
                store.create_organization_membership(&membership).await?;
                info!(membership_id = %membership.id, "Created organization membership");
                print_json(&json!({ "membership": membership.id }))
            }
            SeedCommands::Role { role, user } => {
                store
                    .add_role_membership(&RoleMembership {
                        role_id: role.into(),
                        user_id: user.into(),
                    })
                    .await?;
                print_json(&json!({ "added": true }))
            }
            SeedCommands::Grant {
                team,
                resource,
                resource_id,
                level,
                member,
                role,
                created_by,
            } => {
                let registry = config.registry();
                if !registry.contains(&resource) {
                    bail!("Unknown resource kind: {resource}");
                }
                let resource = ResourceKind::new(resource);
                // Reject levels outside the kind's ordering before storing
                access_level_index(&resource, level)?;

                let mut control = AccessControl::new(team, resource, resource_id, level);
                if let Some(member) = member {
                    control = control.for_member(member);
                }
                if let Some(role) = role {
                    control = control.for_role(role);
                }
                if let Some(created_by) = created_by {
                    control = control.with_created_by(created_by);
                }

                store.create_access_control(&control).await?;
                info!(id = ?control.id, "Created access control");
                print_json(&json!({ "access_control": control }))
            }
        }
    }
}

impl ConfigCommands {
    fn execute(self) -> Result<()> {
        match self {
            ConfigCommands::Generate { output } => {
                let config_path = output.unwrap_or_else(config::default_config_path);

                // Create parent directory if it doesn't exist
                if let Some(parent) = config_path.parent() {
                    std::fs::create_dir_all(parent)?;
                }

                config::generate_default_config(&config_path)?;
                println!("Generated configuration at: {}", config_path.display());
                Ok(())
            }
        }
    }
}

async fn connect(config: &WardenConfig) -> Result<Arc<dyn AccessStoreAdmin>> {
    warden_sqlx::connect(&config.database_url)
        .await
        .with_context(|| format!("Failed to open access store at {}", config.database_url))
}

async fn resolver(config: &WardenConfig, object: &ObjectArgs) -> Result<UserAccessControl> {
    let admin = connect(config).await?;

    let team_id = TeamId::new(object.team.as_str());
    let Some(team) = admin.get_team(&team_id).await? else {
        bail!("Team {team_id} not found");
    };

    let store: Arc<dyn AccessStore> = admin.clone();
    let features: Arc<dyn FeatureGate> = admin;

    Ok(UserAccessControl::new(
        store,
        features,
        Arc::new(config.registry()),
        UserId::new(object.user.as_str()),
        team,
    ))
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
