//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.
//!
//! Every command opens the configured backend, runs one session operation
//! and, for the file backend, writes the snapshot back after a mutation.

use super::design::DesignFile;
use crate::api;
use crate::config::{Backend, Config};
use circa_core::{
    CircaError, GraphView, NewMaterial, NewNode, NewRelation, NodeId, ProjectId, Session,
    store_from_bytes, store_to_bytes,
};
use serde::Serialize;
use std::path::{Path, PathBuf};

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum size of a design file (16 MB).
const MAX_DESIGN_FILE_SIZE: u64 = 16 * 1024 * 1024;

/// Maximum size of a snapshot database file (256 MB).
const MAX_SNAPSHOT_FILE_SIZE: u64 = 256 * 1024 * 1024;

/// Validate file size before reading.
fn validate_file_size(path: &Path, max_size: u64) -> Result<(), CircaError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| CircaError::Io(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(CircaError::InvalidInput(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Resolve an input path to an existing regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, CircaError> {
    let canonical = path.canonicalize().map_err(|e| {
        CircaError::Io(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(CircaError::Io(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

// =============================================================================
// OUTPUT
// =============================================================================

fn print_json<T: Serialize>(value: &T) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_server(config: &Config) -> Result<(), CircaError> {
    let session = load_or_create_session(config)?;

    println!("Circa Server Starting...");
    println!();
    println!("Configuration:");
    println!("  Host:      {}", config.server.host);
    println!("  Port:      {}", config.server.port);
    println!("  Backend:   {}", config.storage.backend);
    println!("  Database:  {:?}", config.storage.database);
    println!("  Policy:    {:?}", config.validation.composite_weight);
    println!();
    println!("Endpoints:");
    println!("  GET  /projects/{{id}}/graph     - Assembled graph");
    println!("  POST /projects/{{id}}/finalize  - Persist composite weights");
    println!("  POST /score/{{project_id}}      - Score a project");
    println!("  POST /nodes                   - Create a node");
    println!("  GET  /socket/projects/{{id}}    - Live events (websocket)");
    println!("  GET  /health                  - Health check");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let session = api::run_server(config, session).await?;
    save_session(&session, config)
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Initialize a new empty database.
pub fn cmd_init(config: &Config, force: bool) -> Result<(), CircaError> {
    let db_path = &config.storage.database;
    if db_path.exists() {
        if !force {
            return Err(CircaError::InvalidInput(
                "Database already exists. Use --force to overwrite.".to_string(),
            ));
        }
        std::fs::remove_file(db_path)
            .map_err(|e| CircaError::Io(format!("Remove db: {}", e)))?;
    }

    match config.storage.backend {
        Backend::Redb => {
            let _session = Session::with_redb(db_path)?;
            println!("Initialized new redb database at {:?}", db_path);
        }
        Backend::File => {
            save_session(&Session::new(), config)?;
            println!("Initialized new snapshot file at {:?}", db_path);
        }
    }

    Ok(())
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show record counts.
pub fn cmd_status(config: &Config, json_mode: bool) -> Result<(), CircaError> {
    let session = load_or_create_session(config)?;
    let stats = session.stats()?;

    if json_mode {
        print_json(&serde_json::json!({
            "database": config.storage.database.to_string_lossy(),
            "backend": config.storage.backend.to_string(),
            "projects": stats.projects,
            "materials": stats.materials,
            "nodes": stats.nodes,
            "relations": stats.relations,
        }));
        return Ok(());
    }

    println!("Circa Status");
    println!("============");
    println!("Database:  {:?}", config.storage.database);
    println!("Backend:   {}", config.storage.backend);
    println!();
    println!("Projects:  {}", stats.projects);
    println!("Materials: {}", stats.materials);
    println!("Nodes:     {}", stats.nodes);
    println!("Relations: {}", stats.relations);

    Ok(())
}

// =============================================================================
// RECORD COMMANDS
// =============================================================================

/// Create a project.
pub fn cmd_project(config: &Config, json_mode: bool, name: &str) -> Result<(), CircaError> {
    let mut session = load_or_create_session(config)?;
    let project = session.create_project(name)?;
    save_session(&session, config)?;

    if json_mode {
        print_json(&project);
    } else {
        println!("Created project {} ({})", project.id, project.name);
    }
    Ok(())
}

/// List projects.
pub fn cmd_projects(config: &Config, json_mode: bool) -> Result<(), CircaError> {
    let session = load_or_create_session(config)?;
    let projects = session.projects()?;

    if json_mode {
        print_json(&projects);
        return Ok(());
    }

    if projects.is_empty() {
        println!("No projects");
    }
    for project in &projects {
        println!("{:>6}  {}", project.id, project.name);
    }
    Ok(())
}

/// Create a material.
pub fn cmd_material(
    config: &Config,
    json_mode: bool,
    material: NewMaterial,
) -> Result<(), CircaError> {
    let mut session = load_or_create_session(config)?;
    let material = session.create_material(material)?;
    save_session(&session, config)?;

    if json_mode {
        print_json(&material);
    } else {
        println!("Created material {} ({})", material.id, material.name);
    }
    Ok(())
}

/// Create a node.
pub fn cmd_node(config: &Config, json_mode: bool, node: NewNode) -> Result<(), CircaError> {
    let mut session = load_or_create_session(config)?;
    let node = session.create_node(node)?;
    save_session(&session, config)?;

    if json_mode {
        print_json(&node);
    } else {
        println!(
            "Created node {} ({}) in project {} at level {}",
            node.id, node.name, node.project_id, node.level
        );
    }
    Ok(())
}

/// Create a relation.
pub fn cmd_relation(
    config: &Config,
    json_mode: bool,
    relation: NewRelation,
) -> Result<(), CircaError> {
    let mut session = load_or_create_session(config)?;
    let relation = session.create_relation(relation)?;
    save_session(&session, config)?;

    if json_mode {
        print_json(&relation);
    } else {
        println!(
            "Created relation {}: {} -> {}",
            relation.id, relation.source_id, relation.target_id
        );
    }
    Ok(())
}

/// Delete a node and its relations.
pub fn cmd_delete_node(config: &Config, json_mode: bool, id: u64) -> Result<(), CircaError> {
    let mut session = load_or_create_session(config)?;
    let deleted = session.delete_node(NodeId(id))?;
    save_session(&session, config)?;

    if json_mode {
        print_json(&serde_json::json!({ "ok": true, "deleted": deleted.is_some() }));
    } else if deleted.is_some() {
        println!("Deleted node {}", id);
    } else {
        println!("Node {} did not exist", id);
    }
    Ok(())
}

// =============================================================================
// ENGINE COMMANDS
// =============================================================================

fn print_graph(graph: &GraphView) {
    println!(
        "{} nodes, {} edges, {} materials",
        graph.nodes.len(),
        graph.edges.len(),
        graph.materials.len()
    );
    println!();
    for node in &graph.nodes {
        let indent = "  ".repeat(node.level as usize);
        let kind = if node.atomic { "atomic" } else { "composite" };
        let weight = node
            .weight
            .map_or_else(|| "-".to_string(), |w| format!("{w:.3}"));
        println!("{indent}[{}] {} ({kind}, weight {weight})", node.id, node.name);
    }
    if !graph.edges.is_empty() {
        println!();
        for edge in &graph.edges {
            println!("relation {}: {} -> {}", edge.id, edge.source, edge.target);
        }
    }
}

/// Print a project's graph with previewed composite weights.
pub fn cmd_graph(config: &Config, json_mode: bool, project: u64) -> Result<(), CircaError> {
    let session = load_or_create_session(config)?;
    let graph = session.assemble_graph(ProjectId(project))?;

    if json_mode {
        print_json(&graph);
    } else {
        print_graph(&graph);
    }
    Ok(())
}

/// Persist composite weights.
pub fn cmd_finalize(config: &Config, json_mode: bool, project: u64) -> Result<(), CircaError> {
    let mut session = load_or_create_session(config)?;
    let nodes = session.finalize(ProjectId(project))?;
    save_session(&session, config)?;

    if json_mode {
        print_json(&nodes);
        return Ok(());
    }

    println!("Finalized project {}", project);
    for node in nodes.iter().filter(|n| !n.atomic) {
        println!(
            "  [{}] {} = {:.3}",
            node.id,
            node.name,
            node.weight.unwrap_or(0.0)
        );
    }
    Ok(())
}

/// Compute and persist sustainability scores.
pub fn cmd_score(config: &Config, json_mode: bool, project: u64) -> Result<(), CircaError> {
    let mut session = load_or_create_session(config)?;
    let scores = session.score(ProjectId(project))?;
    save_session(&session, config)?;

    if json_mode {
        print_json(&scores);
        return Ok(());
    }

    println!("Sustainability scores for project {}", project);
    for score in &scores {
        println!("  [{}] {:.4}", score.id, score.sustainability_score);
    }
    let total: f64 = scores.iter().map(|s| s.sustainability_score).sum();
    println!("Total: {:.4}", total);
    Ok(())
}

/// Create a project from a design file.
pub fn cmd_load(config: &Config, json_mode: bool, file: &Path) -> Result<(), CircaError> {
    let path = validate_file_path(file)?;
    validate_file_size(&path, MAX_DESIGN_FILE_SIZE)?;
    let bytes = std::fs::read(&path).map_err(|e| CircaError::Io(format!("Read file: {}", e)))?;
    let design = DesignFile::from_json(&bytes)?;

    tracing::info!("Loading design {:?} from {:?}", design.project, path);

    let mut session = load_or_create_session(config)?;
    let summary = design.apply(&mut session)?;
    save_session(&session, config)?;

    if json_mode {
        print_json(&serde_json::json!({
            "project": summary.project,
            "materials": summary.materials,
            "nodes": summary.nodes,
            "relations": summary.relations,
        }));
    } else {
        println!(
            "Loaded project {} ({}): {} materials, {} nodes, {} relations",
            summary.project.id,
            summary.project.name,
            summary.materials,
            summary.nodes,
            summary.relations
        );
    }
    Ok(())
}

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Open the configured backend.
///
/// The file backend starts empty when the snapshot does not exist yet.
pub fn load_or_create_session(config: &Config) -> Result<Session, CircaError> {
    let db_path = &config.storage.database;
    let session = match config.storage.backend {
        Backend::Redb => Session::with_redb(db_path)?,
        Backend::File => {
            if db_path.exists() {
                validate_file_size(db_path, MAX_SNAPSHOT_FILE_SIZE)?;
                let data = std::fs::read(db_path)
                    .map_err(|e| CircaError::Io(format!("Read db: {}", e)))?;
                Session::with_store(store_from_bytes(&data)?)
            } else {
                Session::new()
            }
        }
    };
    Ok(session.with_policy(config.validation.composite_weight))
}

/// Write the snapshot for in-memory sessions. Persistent sessions are a no-op.
pub fn save_session(session: &Session, config: &Config) -> Result<(), CircaError> {
    let Some(store) = session.memory_store_opt() else {
        return Ok(());
    };
    let data = store_to_bytes(store)?;
    std::fs::write(&config.storage.database, data)
        .map_err(|e| CircaError::Io(format!("Write db: {}", e)))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;
    use circa_core::MaterialId;

    fn config(backend: Backend, database: PathBuf) -> Config {
        Config {
            storage: StorageConfig { backend, database },
            ..Config::default()
        }
    }

    fn build_tree(config: &Config) -> ProjectId {
        cmd_project(config, true, "Shelf").expect("project");
        cmd_material(
            config,
            true,
            NewMaterial {
                name: "Pine".to_string(),
                weight: 1.0,
                co2_value: 2.0,
                hardness: 1.0,
            },
        )
        .expect("material");

        let node = |name: &str, parent: Option<u64>, level: u32, weight: Option<f64>| NewNode {
            project_id: ProjectId(1),
            material_id: MaterialId(1),
            name: name.to_string(),
            parent_id: parent.map(NodeId),
            atomic: weight.is_some(),
            reusable: false,
            connection_type: None,
            level,
            weight,
            recyclable: false,
        };
        cmd_node(config, true, node("frame", None, 0, None)).expect("root");
        cmd_node(config, true, node("board", Some(1), 1, Some(2.0))).expect("board");
        cmd_node(config, true, node("side", Some(1), 1, Some(3.0))).expect("side");
        ProjectId(1)
    }

    #[test]
    fn file_backend_persists_between_commands() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = config(Backend::File, dir.path().join("shelf.circa"));

        let project = build_tree(&config);
        cmd_finalize(&config, true, project.0).expect("finalize");

        let session = load_or_create_session(&config).expect("reload");
        assert_eq!(session.stats().expect("stats").nodes, 3);
        assert_eq!(session.get_node(NodeId(1)).expect("root").weight, Some(5.0));
    }

    #[test]
    fn redb_backend_persists_between_commands() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = config(Backend::Redb, dir.path().join("shelf.db"));

        let project = build_tree(&config);
        cmd_score(&config, true, project.0).expect("score");

        let session = load_or_create_session(&config).expect("reopen");
        let board = session.get_node(NodeId(2)).expect("board");
        assert_eq!(board.sustainability_score, Some(4.0));
    }

    #[test]
    fn init_refuses_to_overwrite_without_force() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = config(Backend::File, dir.path().join("db.circa"));

        cmd_init(&config, false).expect("first init");
        cmd_project(&config, true, "Kept").expect("project");
        assert!(cmd_init(&config, false).is_err());

        cmd_init(&config, true).expect("forced init");
        let session = load_or_create_session(&config).expect("reload");
        assert_eq!(session.stats().expect("stats").projects, 0);
    }

    #[test]
    fn corrupt_snapshot_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bad.circa");
        std::fs::write(&path, b"not a snapshot").expect("write");

        let result = load_or_create_session(&config(Backend::File, path));
        assert!(result.is_err());
    }

    #[test]
    fn load_command_reads_design_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = config(Backend::File, dir.path().join("db.circa"));
        let design = dir.path().join("design.json");
        std::fs::write(
            &design,
            r#"{
                "project": "Lamp",
                "materials": [ { "key": "steel", "name": "Steel", "weight": 7.8, "co2_value": 1.9, "hardness": 5 } ],
                "nodes": [
                    { "key": "lamp", "material": "steel", "name": "Lamp", "atomic": false },
                    { "key": "arm", "material": "steel", "name": "Arm", "parent": "lamp", "atomic": true, "weight": 0.4 }
                ]
            }"#,
        )
        .expect("write design");

        cmd_load(&config, true, &design).expect("load");

        let session = load_or_create_session(&config).expect("reload");
        let graph = session.assemble_graph(ProjectId(1)).expect("graph");
        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(graph.nodes[0].weight, Some(0.4));
    }

    #[test]
    fn load_rejects_missing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = config(Backend::File, dir.path().join("db.circa"));
        assert!(cmd_load(&config, true, &dir.path().join("absent.json")).is_err());
    }
}
