//! # Circa CLI Module
//!
//! This module implements the CLI interface for Circa.
//!
//! ## Available Commands
//!
//! - `server` - Start the HTTP server
//! - `init` - Initialize a new database
//! - `status` - Show record counts
//! - `project` / `projects` - Create / list projects
//! - `material` - Create a material
//! - `node` - Create a node
//! - `relation` - Create a relation
//! - `delete-node` - Delete a node and its relations
//! - `graph` - Print a project's assembled graph
//! - `finalize` - Persist composite weights
//! - `score` - Compute and persist sustainability scores
//! - `load` - Create a project from a JSON design file

mod commands;
pub mod design;

use crate::config::{Backend, Config, Overrides};
use circa_core::CircaError;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Circa - Circular Design Toolkit
///
/// Tracks product designs as component trees, derives composite weights
/// and scores every component for its environmental impact.
#[derive(Parser, Debug)]
#[command(name = "circa")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to the database (default: circa.db)
    #[arg(short = 'D', long, global = true)]
    pub database: Option<PathBuf>,

    /// Storage backend (default: redb)
    #[arg(short = 'B', long, global = true, value_enum)]
    pub backend: Option<Backend>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP server
    Server {
        /// Host to bind to
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Initialize a new empty database
    Init {
        /// Overwrite an existing database
        #[arg(short, long)]
        force: bool,
    },

    /// Show record counts
    Status,

    /// Create a project
    Project {
        /// Project name
        #[arg(short, long)]
        name: String,
    },

    /// List projects
    Projects,

    /// Create a material
    Material {
        /// Material name
        #[arg(short, long)]
        name: String,

        /// Reference weight (> 0)
        #[arg(short, long)]
        weight: f64,

        /// CO2 value per unit weight (> 0)
        #[arg(long)]
        co2: f64,

        /// Hardness (> 0)
        #[arg(long)]
        hardness: f64,
    },

    /// Create a node
    Node {
        /// Owning project id
        #[arg(short, long)]
        project: u64,

        /// Material id
        #[arg(short, long)]
        material: u64,

        /// Node name
        #[arg(short, long)]
        name: String,

        /// Parent node id (required when level > 0)
        #[arg(long)]
        parent: Option<u64>,

        /// Tree level; 0 for roots
        #[arg(short, long, default_value = "0")]
        level: u32,

        /// Node is atomic (carries its own weight)
        #[arg(short, long)]
        atomic: bool,

        /// Weight (required for atomic nodes)
        #[arg(short, long)]
        weight: Option<f64>,

        /// Connection type: a name, a numeric code or a custom tag
        #[arg(short = 't', long)]
        connection: Option<String>,

        /// Component can be reused
        #[arg(long)]
        reusable: bool,

        /// Component can be recycled
        #[arg(long)]
        recyclable: bool,
    },

    /// Create a relation between two nodes
    Relation {
        /// Owning project id
        #[arg(short, long)]
        project: u64,

        /// Source node id
        #[arg(short, long)]
        source: u64,

        /// Target node id
        #[arg(short, long)]
        target: u64,
    },

    /// Delete a node and every relation that references it
    DeleteNode {
        /// Node id
        #[arg(short, long)]
        id: u64,
    },

    /// Print a project's graph with previewed composite weights
    Graph {
        /// Project id
        #[arg(short, long)]
        project: u64,
    },

    /// Persist aggregated composite weights
    Finalize {
        /// Project id
        #[arg(short, long)]
        project: u64,
    },

    /// Compute and persist sustainability scores
    Score {
        /// Project id
        #[arg(short, long)]
        project: u64,
    },

    /// Create a project from a JSON design file
    Load {
        /// Path to the design file
        #[arg(short, long)]
        file: PathBuf,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Resolve the effective configuration from file and flags.
pub fn resolve_config(cli: &Cli) -> Result<Config, CircaError> {
    let (host, port) = match &cli.command {
        Some(Commands::Server { host, port }) => (host.clone(), *port),
        _ => (None, None),
    };
    let config = Config::load(cli.config.as_deref())?.with_overrides(Overrides {
        database: cli.database.clone(),
        backend: cli.backend,
        host,
        port,
    });
    if cli.verbose {
        tracing::info!(?config, "Resolved configuration");
    }
    Ok(config)
}

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), CircaError> {
    let config = resolve_config(&cli)?;
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Server { .. }) => cmd_server(&config).await,
        Some(Commands::Init { force }) => cmd_init(&config, force),
        Some(Commands::Status) | None => cmd_status(&config, json_mode),
        Some(Commands::Project { name }) => cmd_project(&config, json_mode, &name),
        Some(Commands::Projects) => cmd_projects(&config, json_mode),
        Some(Commands::Material {
            name,
            weight,
            co2,
            hardness,
        }) => cmd_material(
            &config,
            json_mode,
            circa_core::NewMaterial {
                name,
                weight,
                co2_value: co2,
                hardness,
            },
        ),
        Some(Commands::Node {
            project,
            material,
            name,
            parent,
            level,
            atomic,
            weight,
            connection,
            reusable,
            recyclable,
        }) => cmd_node(
            &config,
            json_mode,
            circa_core::NewNode {
                project_id: circa_core::ProjectId(project),
                material_id: circa_core::MaterialId(material),
                name,
                parent_id: parent.map(circa_core::NodeId),
                atomic,
                reusable,
                connection_type: connection.as_deref().map(circa_core::ConnectionType::parse),
                level,
                weight,
                recyclable,
            },
        ),
        Some(Commands::Relation {
            project,
            source,
            target,
        }) => cmd_relation(
            &config,
            json_mode,
            circa_core::NewRelation {
                project_id: circa_core::ProjectId(project),
                source_id: circa_core::NodeId(source),
                target_id: circa_core::NodeId(target),
            },
        ),
        Some(Commands::DeleteNode { id }) => cmd_delete_node(&config, json_mode, id),
        Some(Commands::Graph { project }) => cmd_graph(&config, json_mode, project),
        Some(Commands::Finalize { project }) => cmd_finalize(&config, json_mode, project),
        Some(Commands::Score { project }) => cmd_score(&config, json_mode, project),
        Some(Commands::Load { file }) => cmd_load(&config, json_mode, &file),
    }
}

// =============================================================================
// TESTS
// =============================================================================
