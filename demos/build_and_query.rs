//! Builds an index over a random point cloud and runs both query kinds,
//! single-probe and batched.

use hashgrid3d::{BuildOptions, GridIndex, KnnQueryOptions, Point, RadiusQueryOptions};
use rand::Rng;

fn random_points(n: usize, extent: f32) -> Vec<Point> {
    let mut rng = rand::rng();
    (0..n)
        .map(|_| {
            Point::new(
                rng.random_range(0.0..extent),
                rng.random_range(0.0..extent),
                rng.random_range(0.0..extent),
            )
        })
        .collect()
}

fn main() {
    env_logger::init();

    let points = random_points(20_000, 100.0);
    let radius = 2.0;
    let index = GridIndex::build(&points, BuildOptions::with_radius(radius));
    println!(
        "built index over {} points, grid dims {:?}, cell_size {}",
        points.len(),
        index.dims(),
        index.cell_size()
    );

    let probe = Point::new(50.0, 50.0, 50.0);

    let mut dists_sq = [0.0f32; 64];
    let mut indices = [0i32; 64];
    let n = index
        .radius_search(
            probe,
            RadiusQueryOptions::new(radius, 64).sorted(),
            &mut dists_sq,
            &mut indices,
        )
        .expect("radius query contract upheld");
    println!("radius_search({probe:?}, r={radius}) -> {n} neighbors");

    let mut knn_dists_sq = [0.0f32; 10];
    let mut knn_indices = [0i32; 10];
    let k = index
        .knn_search(
            probe,
            KnnQueryOptions::new(10).sorted(),
            &mut knn_dists_sq,
            &mut knn_indices,
        )
        .expect("knn query contract upheld");
    println!("knn_search({probe:?}, k=10) -> {k} neighbors, nearest dist_sq={}", knn_dists_sq[0]);

    let queries = random_points(2_000, 100.0);
    let stride = 32;
    let mut batch_dists_sq = vec![0.0f32; queries.len() * stride];
    let mut batch_indices = vec![0i32; queries.len() * stride];
    let mut n_neighbors = vec![0usize; queries.len()];
    let total = index
        .par_radius_search(
            &queries,
            RadiusQueryOptions::new(radius, stride),
            &mut batch_dists_sq,
            &mut batch_indices,
            Some(&mut n_neighbors),
        )
        .expect("batch contract upheld");
    println!(
        "par_radius_search over {} queries -> {} total neighbors",
        queries.len(),
        total
    );
}
