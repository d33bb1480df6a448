use estplan::{ConfigBox, ConfigKdTree, Configuration, DistancePair, RatedPoint, Sampler};
use glam::DVec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_points(seed: u64, count: usize, extent: f64) -> Vec<RatedPoint> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut sampler = Sampler::new(seed);
    (0..count)
        .map(|_| {
            let position = DVec3::new(
                rng.gen_range(-extent..extent),
                rng.gen_range(-extent..extent),
                rng.gen_range(-extent..extent),
            );
            RatedPoint::new(Configuration::new(position, sampler.unit_quaternion()))
        })
        .collect()
}

fn brute_force(data: &[RatedPoint], query: &Configuration, limits: DistancePair) -> Vec<usize> {
    data.iter()
        .enumerate()
        .filter(|(_, p)| query.pair_distance(&p.config).within(&limits))
        .map(|(i, _)| i)
        .collect()
}

fn sorted(mut v: Vec<usize>) -> Vec<usize> {
    v.sort_unstable();
    v
}

#[test]
fn test_range_search_matches_brute_force() {
    let limits = DistancePair::new(0.3, 1.2);
    let mut data = random_points(1, 2000, 1.0);
    let domain = ConfigBox::around(&Configuration::IDENTITY, 1.0);
    let mut tree = ConfigKdTree::new(domain, limits, 16);
    tree.revalidate(&mut data);
    assert!(tree.is_consistent(&data));

    let queries = random_points(2, 100, 1.0);
    for query in &queries {
        let expected = brute_force(&data, &query.config, limits);
        let found = tree.range_search(&data, &query.config, limits);
        assert_eq!(found.len(), expected.len(), "duplicate or missing matches");
        assert_eq!(sorted(found), expected);
    }
}

#[test]
fn test_negated_query_finds_same_set() {
    let limits = DistancePair::new(0.4, 0.9);
    let mut data = random_points(3, 1000, 1.0);
    let mut tree = ConfigKdTree::new(ConfigBox::around(&Configuration::IDENTITY, 1.0), limits, 8);
    tree.revalidate(&mut data);

    for query in random_points(4, 50, 1.0) {
        let direct = sorted(tree.range_search(&data, &query.config, limits));
        let negated = sorted(tree.range_search(&data, &query.config.with_negated_rotation(), limits));
        assert_eq!(direct, negated);
    }
}

#[test]
fn test_inserted_point_found_through_double_cover() {
    let limits = DistancePair::new(0.1, 0.1);
    let mut data = random_points(5, 200, 1.0);
    let mut tree = ConfigKdTree::new(ConfigBox::around(&Configuration::IDENTITY, 1.0), limits, 4);
    tree.revalidate(&mut data);

    for (i, point) in data.iter().enumerate() {
        let negated = point.config.with_negated_rotation();
        assert!(tree.range_search(&data, &negated, limits).contains(&i));
    }
}

#[test]
fn test_full_rotation_limit_ignores_orientation() {
    let limits = DistancePair::new(0.5, 4.0);
    let mut data = random_points(6, 500, 1.0);
    let mut tree = ConfigKdTree::new(ConfigBox::around(&Configuration::IDENTITY, 1.0), limits, 8);
    tree.revalidate(&mut data);

    let query = Configuration::IDENTITY;
    let expected: Vec<usize> = data
        .iter()
        .enumerate()
        .filter(|(_, p)| p.config.positional_distance(&query) < 0.5)
        .map(|(i, _)| i)
        .collect();
    assert_eq!(sorted(tree.range_search(&data, &query, limits)), expected);
}

#[test]
fn test_ratings_count_matches() {
    let limits = DistancePair::new(0.25, 1.0);
    let mut data = random_points(7, 600, 1.0);
    let mut tree = ConfigKdTree::new(ConfigBox::around(&Configuration::IDENTITY, 1.0), limits, 16);

    // Ratings never decrease while later batches are picked up.
    let mut previous = vec![0usize; data.len()];
    for end in [100, 250, 251, 600] {
        let added = tree.revalidate(&mut data[..end]);
        assert!(added > 0);
        assert_eq!(tree.len(), end);
        for i in 0..end {
            assert!(data[i].rating >= previous[i], "rating of {} decreased", i);
            previous[i] = data[i].rating;
        }
    }

    // Each point is rated by every other point within the limits.
    for (i, point) in data.iter().enumerate() {
        let neighbours = brute_force(&data, &point.config, limits)
            .into_iter()
            .filter(|&j| j != i)
            .count();
        assert_eq!(point.rating, neighbours, "point {}", i);
    }
}

#[test]
fn test_revalidate_without_new_points_is_noop() {
    let limits = DistancePair::new(0.2, 0.5);
    let mut data = random_points(8, 50, 1.0);
    let mut tree = ConfigKdTree::new(ConfigBox::around(&Configuration::IDENTITY, 1.0), limits, 4);
    assert_eq!(tree.revalidate(&mut data), 50);
    let ratings: Vec<usize> = data.iter().map(|p| p.rating).collect();
    assert_eq!(tree.revalidate(&mut data), 0);
    assert_eq!(ratings, data.iter().map(|p| p.rating).collect::<Vec<_>>());
}

#[test]
fn test_leaf_capacity_respected() {
    let limits = DistancePair::new(0.1, 0.5);
    for capacity in [1, 2, 7, 64] {
        let mut data = random_points(9, 1500, 2.0);
        let mut tree =
            ConfigKdTree::new(ConfigBox::around(&Configuration::IDENTITY, 2.0), limits, capacity);
        for end in (100..=1500).step_by(350) {
            tree.revalidate(&mut data[..end]);
            for (_, points) in tree.leaves() {
                assert!(points.len() <= capacity, "leaf of {} with capacity {}", points.len(), capacity);
            }
        }
        tree.revalidate(&mut data);
        assert!(tree.is_consistent(&data));
    }
}

#[test]
fn test_points_outside_domain_are_indexed() {
    let limits = DistancePair::new(0.5, 1.0);
    let mut data = random_points(10, 300, 5.0);
    let mut tree = ConfigKdTree::new(ConfigBox::around(&Configuration::IDENTITY, 1.0), limits, 8);
    tree.revalidate(&mut data);
    assert!(tree.is_consistent(&data));

    for query in random_points(11, 30, 5.0) {
        let expected = brute_force(&data, &query.config, limits);
        assert_eq!(sorted(tree.range_search(&data, &query.config, limits)), expected);
    }
}

#[test]
fn test_clear_resets_index() {
    let limits = DistancePair::new(0.2, 0.5);
    let mut data = random_points(12, 100, 1.0);
    let mut tree = ConfigKdTree::new(ConfigBox::around(&Configuration::IDENTITY, 1.0), limits, 4);
    tree.revalidate(&mut data);
    tree.clear();
    assert!(tree.is_empty());
    assert_eq!(tree.node_count(), 1);
    assert!(tree.matches(&data, &data[0].config).is_empty());
}
