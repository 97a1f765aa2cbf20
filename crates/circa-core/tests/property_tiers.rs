//! # Property Tier Tests
//!
//! If ANY tier fails, the engine is INVALID.
//!
//! Every check runs against both the in-memory and the redb backend.
//!
//! ## Tiers
//! - T0: Aggregation correctness and atomic weight immutability
//! - T1: Cycle rejection
//! - T2: Level/parent invariant
//! - T3: Score formula and persistence
//! - T4: Cascade delete
//! - T5: Durability
//! - T6: Notification scoping

use circa_core::{
    CircaError, ConnectionKind, ConnectionType, MaterialId, NewMaterial, NewNode, NewRelation,
    NodeId, NodeStore, ProjectId, Session,
};

// =============================================================================
// HELPERS
// =============================================================================

/// Run `check` against a fresh in-memory session and a fresh redb session.
fn for_each_backend(check: impl Fn(&mut Session)) {
    let mut memory = Session::new();
    check(&mut memory);

    let temp = tempfile::tempdir().expect("temp dir");
    let mut redb = Session::with_redb(temp.path().join("tiers.redb")).expect("open redb");
    check(&mut redb);
}

fn material(session: &mut Session, co2: f64) -> MaterialId {
    session
        .create_material(NewMaterial {
            name: "plywood".to_string(),
            weight: 0.6,
            co2_value: co2,
            hardness: 2.0,
        })
        .expect("material")
        .id
}

fn new_node(
    project: ProjectId,
    material: MaterialId,
    parent: Option<NodeId>,
    level: u32,
    weight: Option<f64>,
) -> NewNode {
    NewNode {
        project_id: project,
        material_id: material,
        name: "part".to_string(),
        parent_id: parent,
        atomic: weight.is_some(),
        reusable: false,
        connection_type: None,
        level,
        weight,
        recyclable: true,
    }
}

// =============================================================================
// TIER T0: AGGREGATION
// =============================================================================

mod t0_aggregation {
    use super::*;

    /// T0.1: A composite weighs the sum of its atomic children.
    #[test]
    fn finalize_sums_children() {
        for_each_backend(|session| {
            let project = session.create_project("box").expect("project").id;
            let m = material(session, 1.0);
            let a = session
                .create_node(new_node(project, m, None, 0, None))
                .expect("A");
            session
                .create_node(new_node(project, m, Some(a.id), 1, Some(2.0)))
                .expect("B");
            session
                .create_node(new_node(project, m, Some(a.id), 1, Some(3.0)))
                .expect("C");

            session.finalize(project).expect("finalize");
            assert_eq!(session.get_node(a.id).expect("A").weight, Some(5.0));
        });
    }

    /// T0.2: Aggregation never overwrites an atomic weight.
    #[test]
    fn atomic_weights_are_untouched() {
        for_each_backend(|session| {
            let project = session.create_project("box").expect("project").id;
            let m = material(session, 1.0);
            let a = session
                .create_node(new_node(project, m, None, 0, None))
                .expect("A");
            let b = session
                .create_node(new_node(project, m, Some(a.id), 1, Some(2.25)))
                .expect("B");

            session.assemble_graph(project).expect("graph");
            session.finalize(project).expect("finalize");
            assert_eq!(session.get_node(b.id).expect("B").weight, Some(2.25));
        });
    }

    /// T0.3: Finalizing twice yields identical weights.
    #[test]
    fn finalize_is_idempotent() {
        for_each_backend(|session| {
            let project = session.create_project("box").expect("project").id;
            let m = material(session, 1.0);
            let a = session
                .create_node(new_node(project, m, None, 0, None))
                .expect("A");
            let sub = session
                .create_node(new_node(project, m, Some(a.id), 1, None))
                .expect("sub");
            session
                .create_node(new_node(project, m, Some(sub.id), 2, Some(1.5)))
                .expect("leaf");

            let first = session.finalize(project).expect("first");
            let second = session.finalize(project).expect("second");
            assert_eq!(first, second);
            assert_eq!(first[0].weight, Some(1.5));
        });
    }

    /// T0.4: The graph view previews weights without persisting them.
    #[test]
    fn graph_view_is_read_only() {
        for_each_backend(|session| {
            let project = session.create_project("box").expect("project").id;
            let m = material(session, 1.0);
            let a = session
                .create_node(new_node(project, m, None, 0, None))
                .expect("A");
            session
                .create_node(new_node(project, m, Some(a.id), 1, Some(4.0)))
                .expect("B");

            let view = session.assemble_graph(project).expect("graph");
            assert_eq!(view.nodes[0].weight, Some(4.0));
            assert_eq!(session.get_node(a.id).expect("A").weight, None);
        });
    }
}

// =============================================================================
// TIER T1: CYCLE REJECTION
// =============================================================================

mod t1_cycles {
    use super::*;
    use circa_core::{MemoryStore, RedbStore, assemble_graph, finalize};

    /// Insert a two-node parent loop directly, bypassing validation.
    fn seed_cycle<S: NodeStore>(store: &mut S) -> (ProjectId, NodeId, NodeId) {
        let project = store.create_project("loop").expect("project").id;
        let m = store
            .create_material(NewMaterial {
                name: "steel".to_string(),
                weight: 7.8,
                co2_value: 1.9,
                hardness: 10.0,
            })
            .expect("material")
            .id;
        let a = store
            .create_node(new_node(project, m, Some(NodeId(2)), 1, None))
            .expect("A");
        let b = store
            .create_node(new_node(project, m, Some(a.id), 1, None))
            .expect("B");
        (project, a.id, b.id)
    }

    fn check_cycle<S: NodeStore>(store: &mut S) {
        let (project, a, b) = seed_cycle(store);

        assert!(matches!(
            assemble_graph(store, project),
            Err(CircaError::CycleDetected(_))
        ));
        assert!(matches!(
            finalize(store, project),
            Err(CircaError::CycleDetected(_))
        ));
        assert_eq!(store.get_node(a).expect("A").expect("A").weight, None);
        assert_eq!(store.get_node(b).expect("B").expect("B").weight, None);
    }

    /// T1.1: A two-node loop fails graph assembly and finalize on the memory store.
    #[test]
    fn memory_store_rejects_cycle() {
        check_cycle(&mut MemoryStore::new());
    }

    /// T1.2: The same loop fails identically on redb.
    #[test]
    fn redb_store_rejects_cycle() {
        let temp = tempfile::tempdir().expect("temp dir");
        let mut store = RedbStore::open(temp.path().join("cycle.redb")).expect("open");
        check_cycle(&mut store);
    }

    /// T1.3: Scoring a looped project persists nothing.
    #[test]
    fn score_rejects_cycle() {
        let mut store = MemoryStore::new();
        let (project, a, _) = seed_cycle(&mut store);
        let mut session = Session::with_store(store);

        assert!(matches!(
            session.score(project),
            Err(CircaError::CycleDetected(_))
        ));
        assert_eq!(
            session.get_node(a).expect("A").sustainability_score,
            None
        );
    }
}

// =============================================================================
// TIER T2: LEVEL/PARENT INVARIANT
// =============================================================================

mod t2_levels {
    use super::*;

    /// T2.1: Skipping a level is rejected; the direct level is accepted.
    #[test]
    fn level_must_follow_parent() {
        for_each_backend(|session| {
            let project = session.create_project("shelf").expect("project").id;
            let m = material(session, 1.0);
            let root = session
                .create_node(new_node(project, m, None, 0, None))
                .expect("root");

            let skipped = session.create_node(new_node(project, m, Some(root.id), 2, Some(1.0)));
            assert!(matches!(skipped, Err(CircaError::InvalidLevel(_))));

            let direct = session.create_node(new_node(project, m, Some(root.id), 1, Some(1.0)));
            assert!(direct.is_ok());
        });
    }

    /// T2.2: A parent in another project is not found.
    #[test]
    fn parent_is_scoped_to_project() {
        for_each_backend(|session| {
            let first = session.create_project("a").expect("project").id;
            let second = session.create_project("b").expect("project").id;
            let m = material(session, 1.0);
            let root = session
                .create_node(new_node(first, m, None, 0, None))
                .expect("root");

            let result = session.create_node(new_node(second, m, Some(root.id), 1, Some(1.0)));
            assert!(matches!(result, Err(CircaError::ParentNotFound { .. })));
            assert_eq!(session.stats().expect("stats").nodes, 1);
        });
    }

    /// T2.3: Atomic nodes need a positive weight.
    #[test]
    fn atomic_weight_is_required() {
        for_each_backend(|session| {
            let project = session.create_project("a").expect("project").id;
            let m = material(session, 1.0);
            let mut node = new_node(project, m, None, 0, None);
            node.atomic = true;

            assert!(matches!(
                session.create_node(node),
                Err(CircaError::InvalidWeight(_))
            ));
        });
    }
}

// =============================================================================
// TIER T3: SCORING
// =============================================================================

mod t3_scoring {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    /// T3.1: Formula examples, persisted onto the nodes.
    #[test]
    fn score_formula_and_persistence() {
        for_each_backend(|session| {
            let project = session.create_project("chair").expect("project").id;
            let heavy = material(session, 2.0);
            let light = material(session, 1.0);

            let mut bolted = new_node(project, heavy, None, 0, Some(1.0));
            bolted.connection_type = Some(ConnectionType::Known(ConnectionKind::Bolt));
            let bolted = session.create_node(bolted).expect("bolted");

            let mut glued = new_node(project, light, None, 0, Some(2.0));
            glued.connection_type = Some(ConnectionType::parse("glue"));
            glued.reusable = true;
            let glued = session.create_node(glued).expect("glued");

            let scores = session.score(project).expect("score");
            assert_eq!(scores.len(), 2);
            assert_eq!(scores[0].id, bolted.id);
            assert!(close(scores[0].sustainability_score, 2.0));
            assert_eq!(scores[1].id, glued.id);
            assert!(close(scores[1].sustainability_score, 1.2));

            let stored = session.get_node(glued.id).expect("glued");
            assert!(stored.sustainability_score.is_some_and(|s| close(s, 1.2)));
        });
    }

    /// T3.2: A deleted material scores zero instead of failing.
    #[test]
    fn missing_material_scores_zero() {
        for_each_backend(|session| {
            let project = session.create_project("chair").expect("project").id;
            let m = material(session, 3.0);
            session
                .create_node(new_node(project, m, None, 0, Some(1.0)))
                .expect("node");
            session.delete_material(m).expect("delete");

            let scores = session.score(project).expect("score");
            assert!(close(scores[0].sustainability_score, 0.0));
        });
    }
}

// =============================================================================
// TIER T4: CASCADE DELETE
// =============================================================================

mod t4_cascade {
    use super::*;

    /// T4.1: Deleting a node removes every relation that touches it.
    #[test]
    fn delete_node_removes_edges() {
        for_each_backend(|session| {
            let project = session.create_project("frame").expect("project").id;
            let m = material(session, 1.0);
            let x = session
                .create_node(new_node(project, m, None, 0, Some(1.0)))
                .expect("x");
            let y = session
                .create_node(new_node(project, m, None, 0, Some(1.0)))
                .expect("y");
            let z = session
                .create_node(new_node(project, m, None, 0, Some(1.0)))
                .expect("z");
            for (source, target) in [(x.id, y.id), (y.id, x.id), (y.id, z.id)] {
                session
                    .create_relation(NewRelation {
                        project_id: project,
                        source_id: source,
                        target_id: target,
                    })
                    .expect("relation");
            }

            session.delete_node(x.id).expect("delete");

            let view = session.assemble_graph(project).expect("graph");
            assert_eq!(view.edges.len(), 1);
            assert!(
                view.edges
                    .iter()
                    .all(|e| e.source != x.id && e.target != x.id)
            );
        });
    }

    /// T4.2: Children of a deleted composite become orphans that still aggregate.
    #[test]
    fn orphans_survive_parent_delete() {
        for_each_backend(|session| {
            let project = session.create_project("frame").expect("project").id;
            let m = material(session, 1.0);
            let root = session
                .create_node(new_node(project, m, None, 0, None))
                .expect("root");
            let sub = session
                .create_node(new_node(project, m, Some(root.id), 1, None))
                .expect("sub");
            session
                .create_node(new_node(project, m, Some(sub.id), 2, Some(2.0)))
                .expect("leaf");

            session.delete_node(root.id).expect("delete");
            let nodes = session.finalize(project).expect("finalize");
            assert_eq!(nodes.len(), 2);
            assert_eq!(session.get_node(sub.id).expect("sub").parent_id, Some(root.id));
            assert_eq!(session.get_node(sub.id).expect("sub").weight, Some(2.0));
        });
    }

    /// T4.3: Relations require both endpoints inside the project.
    #[test]
    fn relation_endpoints_must_exist() {
        for_each_backend(|session| {
            let project = session.create_project("frame").expect("project").id;
            let m = material(session, 1.0);
            let x = session
                .create_node(new_node(project, m, None, 0, Some(1.0)))
                .expect("x");

            let result = session.create_relation(NewRelation {
                project_id: project,
                source_id: x.id,
                target_id: NodeId(404),
            });
            assert!(matches!(result, Err(CircaError::NotFound { .. })));
        });
    }
}

// =============================================================================
// TIER T5: DURABILITY
// =============================================================================

mod t5_durability {
    use super::*;
    use circa_core::{MemoryStore, store_from_bytes, store_to_bytes};

    /// T5.1: Finalized weights and scores survive a redb reopen.
    #[test]
    fn redb_survives_reopen() {
        let temp = tempfile::tempdir().expect("temp dir");
        let path = temp.path().join("durable.redb");

        let (project, root) = {
            let mut session = Session::with_redb(&path).expect("open");
            let project = session.create_project("bench").expect("project").id;
            let m = material(&mut session, 2.0);
            let root = session
                .create_node(new_node(project, m, None, 0, None))
                .expect("root");
            session
                .create_node(new_node(project, m, Some(root.id), 1, Some(3.0)))
                .expect("leaf");
            session.finalize(project).expect("finalize");
            session.score(project).expect("score");
            (project, root.id)
        };

        let session = Session::with_redb(&path).expect("reopen");
        let stored = session.get_node(root).expect("root");
        assert_eq!(stored.weight, Some(3.0));
        assert!(stored.sustainability_score.is_some());
        assert_eq!(session.nodes(project).expect("nodes").len(), 2);
    }

    /// T5.2: Snapshot bytes restore an identical store.
    #[test]
    fn snapshot_survives_save_load() {
        let mut session = Session::new();
        let project = session.create_project("bench").expect("project").id;
        let m = material(&mut session, 2.0);
        session
            .create_node(new_node(project, m, None, 0, Some(3.0)))
            .expect("node");
        session.score(project).expect("score");

        let store = session.memory_store_opt().expect("in-memory");
        let bytes = store_to_bytes(store).expect("serialize");
        let restored: MemoryStore = store_from_bytes(&bytes).expect("deserialize");
        assert_eq!(&restored, store);
    }
}

// =============================================================================
// TIER T6: NOTIFICATION SCOPING
// =============================================================================

mod t6_notifications {
    use super::*;
    use circa_core::{ChangeEvent, RecordingSink};
    use std::sync::Arc;

    /// T6.1: Subscribers see their project's events plus broadcasts only.
    #[test]
    fn subscribers_receive_own_project_and_broadcasts() {
        let sink = Arc::new(RecordingSink::new());
        let mut session = Session::new().with_sink(sink.clone());

        let first = session.create_project("a").expect("project").id;
        let second = session.create_project("b").expect("project").id;
        let m = material(&mut session, 1.0);
        let node = session
            .create_node(new_node(first, m, None, 0, Some(1.0)))
            .expect("node");
        session
            .create_node(new_node(second, m, None, 0, Some(1.0)))
            .expect("node");
        session.delete_node(node.id).expect("delete");

        let seen_by_second: Vec<&str> = sink
            .received_by(second)
            .iter()
            .map(ChangeEvent::op)
            .collect();
        assert_eq!(
            seen_by_second,
            vec![
                "create_project",
                "create_project",
                "create_material",
                "create_node"
            ]
        );

        assert_eq!(sink.received_by(first).len(), 5);
        assert_eq!(sink.received_by(ProjectId(0)).len(), 6);
    }
}
