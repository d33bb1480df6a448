use estplan::geometries::{Body, SphereShape};
use estplan::{
    CollisionOracle, Configuration, Exploration, JobId, JobStatus, ObjectKind, Planner,
    PlannerConfig, PlannerError,
};
use glam::DVec3;
use std::thread;
use std::time::Duration;

fn planner(max_runtime_ms: u64) -> Planner {
    let mut config = PlannerConfig::default();
    config.workers.threads = 2;
    config.workers.seed = Some(3);
    config.explorer.max_runtime_ms = max_runtime_ms;
    config.jobs.abort_grace_ms = 50;
    Planner::new(config).expect("planner starts")
}

fn at(x: f64, y: f64, z: f64) -> Configuration {
    Configuration::from_position(DVec3::new(x, y, z))
}

#[test]
fn test_submit_fetch_joins_history() {
    let planner = planner(30_000);
    let root = at(0.0, 0.0, 0.0);
    let id = planner.world().add_movable(Body::sphere(0.05), root);

    let job = planner.submit(id, root, at(0.8, 0.0, 0.0), true).expect("submitted");
    assert!(planner.status(job).exists());

    let fetched = planner.fetch(job).expect("job exists");
    assert!(fetched.exploration.is_solved());
    assert_eq!(fetched.matched_index, None);
    assert_eq!(fetched.path()[0], root);

    let tree = planner.world().world_tree(id).expect("movable exists");
    assert_eq!(fetched.joined, Some(tree.position_index()));
    assert_eq!(tree.position().as_ref(), fetched.path().last());

    assert_eq!(planner.status(job), JobStatus::NotFound);
    assert!(matches!(planner.fetch(job), Err(PlannerError::UnknownJob(j)) if j == job));
}

#[test]
fn test_status_reports_finished_job() {
    let planner = planner(30_000);
    let root = at(0.0, 0.0, 0.0);
    let id = planner.world().add_movable(Body::sphere(0.05), root);
    let job = planner.submit(id, root, root, true).expect("submitted");

    let mut status = planner.status(job);
    for _ in 0..3000 {
        if status.is_finished() {
            break;
        }
        thread::sleep(Duration::from_millis(10));
        status = planner.status(job);
    }
    assert_eq!(status, JobStatus::Finished);
    assert_eq!(planner.job_count(), 1);
    planner.fetch(job).expect("job exists");
    assert_eq!(planner.job_count(), 0);
}

#[test]
fn test_unknown_job_and_movable() {
    let planner = planner(1_000);
    assert_eq!(planner.status(JobId(99)), JobStatus::NotFound);
    assert!(!planner.abort(JobId(99)));
    assert!(matches!(planner.fetch(JobId(99)), Err(PlannerError::UnknownJob(_))));
    assert!(matches!(
        planner.submit(5, Configuration::IDENTITY, Configuration::IDENTITY, true),
        Err(PlannerError::UnknownMovable(5))
    ));
    assert!(matches!(
        planner.move_object(5, &Configuration::IDENTITY, &Configuration::IDENTITY),
        Err(PlannerError::UnknownMovable(5))
    ));
}

#[test]
fn test_abort_is_idempotent() {
    let planner = planner(60_000);
    let root = at(0.0, 0.0, 0.0);
    let id = planner.world().add_movable(Body::sphere(0.05), root);
    // Unreachable: the target sits inside an obstacle.
    planner
        .world()
        .add_static(SphereShape { radius: 0.3 }, at(1.0, 0.0, 0.0));

    let job = planner.submit(id, root, at(1.0, 0.0, 0.0), true).expect("submitted");
    thread::sleep(Duration::from_millis(100));
    assert!(planner.abort(job));
    assert_eq!(planner.status(job), JobStatus::NotFound);
    assert!(!planner.abort(job));

    // The explorer is free again once the aborted run has wound down.
    let next = planner.submit(id, root, at(0.0, 0.5, 0.0), true).expect("submitted");
    let fetched = planner.fetch(next).expect("job exists");
    assert!(fetched.exploration.solution().is_some());
}

#[test]
fn test_new_submission_cancels_previous_run() {
    let planner = planner(60_000);
    let root = at(0.0, 0.0, 0.0);
    let id = planner.world().add_movable(Body::sphere(0.05), root);
    planner
        .world()
        .add_static(SphereShape { radius: 0.3 }, at(1.0, 0.0, 0.0));

    let first = planner.submit(id, root, at(1.0, 0.0, 0.0), true).expect("submitted");
    thread::sleep(Duration::from_millis(100));
    let second = planner.submit(id, root, at(0.0, 0.4, 0.0), true).expect("submitted");

    let first = planner.fetch(first).expect("job exists");
    assert_eq!(first.exploration, Exploration::Cancelled);
    assert_eq!(first.joined, None);

    let second = planner.fetch(second).expect("job exists");
    assert!(second.exploration.solution().is_some());
    assert!(second.joined.is_some());
}

#[test]
fn test_submit_towards_picks_first_free_candidate() {
    let planner = planner(30_000);
    let root = at(0.0, 0.0, 0.0);
    let id = planner.world().add_movable(Body::sphere(0.05), root);
    planner
        .world()
        .add_static(SphereShape { radius: 0.2 }, at(1.0, 0.0, 0.0));

    let candidates = [at(1.0, 0.0, 0.0), at(1.05, 0.0, 0.0), at(0.0, 0.6, 0.0)];
    assert!(planner.world().collides(id, &candidates[0]));
    assert!(planner.world().collides(id, &candidates[1]));

    let job = planner.submit_towards(id, root, &candidates).expect("submitted");
    let fetched = planner.fetch(job).expect("job exists");
    if fetched.exploration.is_solved() {
        assert_eq!(fetched.matched_index, Some(2));
    } else {
        assert_eq!(fetched.matched_index, None);
    }

    assert!(matches!(
        planner.submit_towards(id, root, &[]),
        Err(PlannerError::EmptyCandidates)
    ));
}

#[test]
fn test_move_object_validates_start() {
    let planner = planner(1_000);
    let root = at(0.0, 0.0, 0.0);
    let id = planner.world().add_movable(Body::sphere(0.05), root);

    assert_eq!(planner.move_object(id, &root, &at(0.1, 0.0, 0.0)).ok(), Some(1));
    assert!(matches!(
        planner.move_object(id, &root, &at(0.2, 0.0, 0.0)),
        Err(PlannerError::PositionMismatch { .. })
    ));
    let tree = planner.world().world_tree(id).expect("movable exists");
    assert_eq!(tree.size(), 2);
}

#[test]
fn test_fetch_reports_rejected_join() {
    let planner = planner(30_000);
    let id = planner.world().add_movable(Body::sphere(0.05), at(0.0, 0.0, 0.0));

    // Plans from somewhere the object is not.
    let elsewhere = at(0.5, 0.5, 0.0);
    let job = planner.submit(id, elsewhere, at(0.5, 0.9, 0.0), true).expect("submitted");
    let fetched = planner.fetch(job).expect("join failures never fail the fetch");
    assert!(fetched.exploration.solution().is_some());
    assert_eq!(fetched.joined, None);
    assert_eq!(planner.world().world_tree(id).expect("movable exists").size(), 1);
}

#[test]
fn test_slots_are_reused() {
    let planner = planner(1_000);
    let world = planner.world();
    let a = world.add_movable(Body::sphere(0.1), Configuration::IDENTITY);
    let b = world.add_movable(Body::sphere(0.1), Configuration::IDENTITY);
    let s = world.add_static(SphereShape { radius: 1.0 }, at(5.0, 0.0, 0.0));
    assert_eq!((a, b, s), (0, 1, 0));

    assert!(world.remove(ObjectKind::Movable, a));
    assert!(!world.remove(ObjectKind::Movable, a));
    assert!(!world.has_movable(a));
    assert_eq!(world.add_movable(Body::sphere(0.2), Configuration::IDENTITY), a);
    assert_eq!(world.bounding_radius(a), 0.2);
    assert_eq!(world.add_movable(Body::sphere(0.2), Configuration::IDENTITY), 2);

    assert!(world.remove(ObjectKind::Static, s));
    assert!(!world.has_static(s));
    assert_eq!(world.add_static(SphereShape { radius: 1.0 }, at(5.0, 0.0, 0.0)), s);
}

#[test]
fn test_clear_empties_world_and_jobs() {
    let planner = planner(60_000);
    let root = at(0.0, 0.0, 0.0);
    let id = planner.world().add_movable(Body::sphere(0.05), root);
    planner
        .world()
        .add_static(SphereShape { radius: 0.3 }, at(1.0, 0.0, 0.0));
    let job = planner.submit(id, root, at(1.0, 0.0, 0.0), true).expect("submitted");

    planner.clear();
    assert_eq!(planner.status(job), JobStatus::NotFound);
    assert_eq!(planner.job_count(), 0);
    assert_eq!(planner.world().movable_count(), 0);
    assert_eq!(planner.world().static_count(), 0);
}

#[test]
fn test_world_tree_dump() {
    let planner = planner(1_000);
    let root = at(0.0, 0.0, 0.0);
    let id = planner.world().add_movable(Body::sphere(0.05), root);
    planner.move_object(id, &root, &at(0.1, 0.0, 0.0)).expect("move");

    let path = std::env::temp_dir().join(format!("estplan-world-tree-{}.json", std::process::id()));
    planner.dump_world_tree(id, &path).expect("dump written");
    let written = std::fs::read_to_string(&path).expect("dump readable");
    let value: serde_json::Value = serde_json::from_str(&written).expect("valid json");
    assert_eq!(value["position"].as_u64(), Some(1));
    assert_eq!(value["nodes"].as_array().map(Vec::len), Some(2));
    let _ = std::fs::remove_file(&path);
}

fn wait_until_finished(planner: &Planner, job: JobId) {
    for _ in 0..3000 {
        if planner.status(job).is_finished() {
            return;
        }
        thread::sleep(Duration::from_millis(10));
    }
    panic!("job {} did not finish", job);
}

#[test]
fn test_fetch_after_slot_reuse_leaves_new_object_alone() {
    let planner = planner(30_000);
    let start = at(0.0, 0.0, 0.0);
    let old = planner.world().add_movable(Body::sphere(0.05), start);
    let job = planner.submit(old, start, at(0.8, 0.0, 0.0), true).expect("submitted");
    wait_until_finished(&planner, job);

    assert!(planner.world().remove(ObjectKind::Movable, old));
    let new = planner.world().add_movable(Body::sphere(0.05), start);
    assert_eq!(new, old);

    // The new object's first run has the same run number as the old job's.
    let explorer = planner.world().explorer(new).expect("movable exists");
    let own = explorer.explore(&**planner.world(), &start, &at(0.0, -0.8, 0.0), true);
    assert_eq!(own.solution().map(|s| s.run), Some(1));

    let fetched = planner.fetch(job).expect("job exists");
    assert!(fetched.exploration.solution().is_some());
    assert_eq!(fetched.joined, None);

    let tree = planner.world().world_tree(new).expect("movable exists");
    assert_eq!(tree.size(), 1);
    assert_eq!(tree.position(), Some(start));
}

#[test]
fn test_back_to_back_submissions_keep_the_newest() {
    let planner = planner(60_000);
    let root = at(0.0, 0.0, 0.0);
    let id = planner.world().add_movable(Body::sphere(0.05), root);
    planner
        .world()
        .add_static(SphereShape { radius: 0.3 }, at(1.0, 0.0, 0.0));

    for _ in 0..5 {
        // The older search can never finish on its own.
        let older = planner.submit(id, root, at(1.0, 0.0, 0.0), true).expect("submitted");
        let newer = planner.submit(id, root, at(0.0, 0.4, 0.0), true).expect("submitted");

        let newer = planner.fetch(newer).expect("job exists");
        assert!(newer.exploration.solution().is_some());
        let older = planner.fetch(older).expect("job exists");
        assert_eq!(older.exploration, Exploration::Cancelled);

        let tree = planner.world().world_tree(id).expect("movable exists");
        if let Some(last) = tree.position() {
            planner.move_object(id, &last, &root).expect("move back");
        }
    }
}
