use estplan::geometries::{Body, CylinderShape};
use estplan::{Configuration, DQuat, DVec3, Planner, PlannerConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Optional TOML file with planner settings as the first argument.
    let config = match std::env::args().nth(1) {
        Some(path) => PlannerConfig::load(path)?,
        None => PlannerConfig::default(),
    };
    let planner = Planner::new(config)?;

    // A dumbbell: two spheres on a short bar.
    let body = Body::sphere(0.04)
        .with_sphere(DVec3::new(0.1, 0.0, 0.0), 0.04)
        .with_sphere(DVec3::new(-0.1, 0.0, 0.0), 0.04);
    let start = Configuration::IDENTITY;
    let id = planner.world().add_movable(body, start);

    // A pillar standing right on the straight line to the goal.
    planner.world().add_static(
        CylinderShape {
            radius: 0.15,
            half_height: 1.0,
        },
        Configuration::from_position(DVec3::new(0.5, 0.0, 0.0)),
    );

    let goal = Configuration::new(DVec3::new(1.0, 0.0, 0.0), DQuat::from_rotation_z(1.2));
    let job = planner.submit(id, start, goal, true)?;
    println!("Submitted job {}", job);

    let fetched = planner.fetch(job)?;
    println!(
        "Exploration: solved={}, cancelled={}, {} poses",
        fetched.exploration.is_solved(),
        fetched.exploration.is_cancelled(),
        fetched.path().len()
    );
    for (i, pose) in fetched.path().iter().enumerate() {
        println!(
            "{:4}: position=({:+.3}, {:+.3}, {:+.3}) rotation=({:+.3}, {:+.3}, {:+.3}, {:+.3})",
            i,
            pose.position.x,
            pose.position.y,
            pose.position.z,
            pose.rotation.x,
            pose.rotation.y,
            pose.rotation.z,
            pose.rotation.w
        );
    }

    if let Some(position) = fetched.joined {
        let tree = planner.world().world_tree(id)?;
        println!("Movement history now has {} nodes, position node {}", tree.size(), position);
    }
    Ok(())
}
