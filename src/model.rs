//! K-Means clustering model implementation
//!
//! Lloyd's algorithm over the five behavioral dimensions, written for
//! reproducibility: centroids are seeded from the first `k` feature rows in
//! input order, assignment ties break to the lowest cluster index, and an
//! empty cluster keeps its previous centroid. Two runs over the same input
//! sequence produce identical clusters.

use ndarray::{Array2, ArrayView1};
use tracing::debug;

use crate::features::{FeatureSet, FEATURE_DIMS};

/// Fitted K-Means model with per-customer cluster assignments.
#[derive(Debug, Clone)]
pub struct KMeansModel {
    /// Effective number of clusters (may be fewer than requested, see
    /// [`fit_kmeans`]).
    pub n_clusters: usize,
    /// Cluster assignment for each feature row, in input order.
    pub labels: Vec<usize>,
    /// Final cluster centroids, one row per cluster.
    pub centroids: Array2<f64>,
    /// Iterations the clustering loop actually ran.
    pub iterations: usize,
    /// Whether an assignment pass produced no changes before the cap.
    pub converged: bool,
    /// Within-cluster sum of squares (inertia)
    pub inertia: f64,
}

impl KMeansModel {
    /// Nearest-centroid cluster for a new behavior point; ties break to the
    /// lowest cluster index.
    pub fn predict(&self, behavior: &[f64; FEATURE_DIMS]) -> usize {
        let mut closest_cluster = 0;
        let mut min_distance = f64::INFINITY;

        for (cluster_idx, centroid) in self.centroids.outer_iter().enumerate() {
            let distance = behavior
                .iter()
                .zip(centroid.iter())
                .map(|(a, b)| (a - b).powi(2))
                .sum::<f64>()
                .sqrt();

            if distance < min_distance {
                min_distance = distance;
                closest_cluster = cluster_idx;
            }
        }

        closest_cluster
    }

    /// Get cluster sizes
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.n_clusters];
        for &label in &self.labels {
            if label < self.n_clusters {
                sizes[label] += 1;
            }
        }
        sizes
    }
}

/// Fit a K-Means model on extracted behavior features.
///
/// Fewer customers than `n_clusters` shrinks the effective cluster count to
/// the customer count rather than seeding out of range; callers get
/// `min(n_clusters, n)` clusters back. The iteration loop stops as soon as
/// an assignment pass changes nothing (the centroid update of that final
/// pass still runs) or when `max_iters` is reached.
///
/// Values are clustered as-is: NaN or out-of-range inputs propagate into
/// distances and centroids instead of being rejected.
pub fn fit_kmeans(
    feature_set: &FeatureSet,
    n_clusters: usize,
    max_iters: usize,
) -> crate::Result<KMeansModel> {
    if n_clusters == 0 {
        anyhow::bail!("number of clusters must be at least 1");
    }
    if feature_set.is_empty() {
        anyhow::bail!("cannot cluster an empty feature set");
    }

    let n = feature_set.len();
    let k = n_clusters.min(n);
    let data = &feature_set.features;
    let dims = data.ncols();

    // Seed centroids from the first k rows in input order. The upstream
    // implementation labeled this step random; it never was, and runs must
    // stay reproducible for a fixed input ordering.
    let mut centroids = Array2::zeros((k, dims));
    for cluster in 0..k {
        centroids.row_mut(cluster).assign(&data.row(cluster));
    }

    let mut labels = vec![0usize; n];
    let mut iterations = 0;
    let mut converged = false;

    for _ in 0..max_iters {
        iterations += 1;

        // Assignment step: nearest centroid wins, ties to the lowest index.
        let mut changed = false;
        for (i, label) in labels.iter_mut().enumerate() {
            let point = data.row(i);
            let mut closest = 0;
            let mut min_distance = f64::INFINITY;

            for cluster in 0..k {
                let distance = euclidean_distance(&point, &centroids.row(cluster));
                if distance < min_distance {
                    min_distance = distance;
                    closest = cluster;
                }
            }

            if *label != closest {
                *label = closest;
                changed = true;
            }
        }

        // Update step: each non-empty cluster moves to the mean of its
        // members; an empty cluster keeps its previous centroid and can
        // surface downstream as a zero-customer segment.
        let mut sums = Array2::<f64>::zeros((k, dims));
        let mut counts = vec![0usize; k];
        for (i, &label) in labels.iter().enumerate() {
            for j in 0..dims {
                sums[[label, j]] += data[[i, j]];
            }
            counts[label] += 1;
        }
        for cluster in 0..k {
            if counts[cluster] > 0 {
                for j in 0..dims {
                    centroids[[cluster, j]] = sums[[cluster, j]] / counts[cluster] as f64;
                }
            }
        }

        if !changed {
            converged = true;
            break;
        }
    }

    let inertia = compute_inertia(data, &labels, &centroids);
    debug!(k, iterations, converged, inertia, "k-means finished");

    Ok(KMeansModel {
        n_clusters: k,
        labels,
        centroids,
        iterations,
        converged,
        inertia,
    })
}

/// Euclidean distance between two behavior points.
fn euclidean_distance(point1: &ArrayView1<f64>, point2: &ArrayView1<f64>) -> f64 {
    point1
        .iter()
        .zip(point2.iter())
        .map(|(a, b)| (a - b).powi(2))
        .sum::<f64>()
        .sqrt()
}

/// Compute within-cluster sum of squares (inertia)
fn compute_inertia(features: &Array2<f64>, labels: &[usize], centroids: &Array2<f64>) -> f64 {
    let mut inertia = 0.0;

    for (i, &cluster) in labels.iter().enumerate() {
        if cluster < centroids.nrows() {
            let point = features.row(i);
            let centroid = centroids.row(cluster);
            let distance_sq = point
                .iter()
                .zip(centroid.iter())
                .map(|(a, b)| (a - b).powi(2))
                .sum::<f64>();
            inertia += distance_sq;
        }
    }

    inertia
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::test_support::test_customer;
    use crate::features::extract_features;

    fn feature_set_from(rows: &[(&str, f64, f64, f64, f64, f64)]) -> FeatureSet {
        let customers: Vec<_> = rows
            .iter()
            .map(|&(id, o, c, p, d, v)| test_customer(id, o, c, p, d, v))
            .collect();
        extract_features(&customers).unwrap()
    }

    #[test]
    fn test_fit_partitions_all_points() {
        let features = feature_set_from(&[
            ("c-1", 0.7, 0.3, 0.3, 0.3, 40.0),
            ("c-2", 0.8, 0.4, 0.1, 0.05, 80.0),
            ("c-3", 0.5, 0.2, 0.7, 0.05, 120.0),
            ("c-4", 0.1, 0.05, 0.1, 0.1, 10.0),
            ("c-5", 0.45, 0.2, 0.4, 0.1, 60.0),
            ("c-6", 0.72, 0.31, 0.32, 0.28, 41.0),
            ("c-7", 0.79, 0.38, 0.12, 0.06, 79.0),
        ]);

        let model = fit_kmeans(&features, 5, 100).unwrap();

        assert_eq!(model.n_clusters, 5);
        assert_eq!(model.labels.len(), 7);
        assert!(model.labels.iter().all(|&label| label < 5));
        assert_eq!(model.cluster_sizes().iter().sum::<usize>(), 7);
        assert!(model.iterations <= 100);
    }

    #[test]
    fn test_fit_separates_distant_groups() {
        let features = feature_set_from(&[
            ("low-1", 0.5, 0.2, 0.3, 0.1, 10.0),
            ("high-1", 0.5, 0.2, 0.3, 0.1, 200.0),
            ("low-2", 0.5, 0.2, 0.3, 0.1, 12.0),
            ("high-2", 0.5, 0.2, 0.3, 0.1, 198.0),
        ]);

        let model = fit_kmeans(&features, 2, 100).unwrap();

        assert_eq!(model.labels[0], model.labels[2]);
        assert_eq!(model.labels[1], model.labels[3]);
        assert_ne!(model.labels[0], model.labels[1]);
        assert!(model.converged);
    }

    #[test]
    fn test_fit_is_deterministic() {
        let features = feature_set_from(&[
            ("c-1", 0.7, 0.3, 0.3, 0.3, 40.0),
            ("c-2", 0.8, 0.4, 0.1, 0.05, 80.0),
            ("c-3", 0.5, 0.2, 0.7, 0.05, 120.0),
            ("c-4", 0.1, 0.05, 0.1, 0.1, 10.0),
            ("c-5", 0.45, 0.2, 0.4, 0.1, 60.0),
        ]);

        let model1 = fit_kmeans(&features, 3, 100).unwrap();
        let model2 = fit_kmeans(&features, 3, 100).unwrap();

        assert_eq!(model1.labels, model2.labels);
        assert_eq!(model1.centroids, model2.centroids);
        assert_eq!(model1.iterations, model2.iterations);
    }

    #[test]
    fn test_fit_stable_once_converged() {
        let features = feature_set_from(&[
            ("c-1", 0.7, 0.3, 0.3, 0.3, 40.0),
            ("c-2", 0.8, 0.4, 0.1, 0.05, 80.0),
            ("c-3", 0.5, 0.2, 0.7, 0.05, 120.0),
            ("c-4", 0.1, 0.05, 0.1, 0.1, 10.0),
        ]);

        let model = fit_kmeans(&features, 2, 100).unwrap();
        assert!(model.converged);

        // A longer cap cannot change a converged assignment.
        let rerun = fit_kmeans(&features, 2, 500).unwrap();
        assert_eq!(model.labels, rerun.labels);
        assert_eq!(model.centroids, rerun.centroids);
    }

    #[test]
    fn test_duplicate_points_tie_to_lowest_cluster() {
        // Both seeds are the same point, so every distance ties and the
        // scan order keeps everything in cluster 0.
        let features = feature_set_from(&[
            ("c-1", 0.5, 0.2, 0.3, 0.1, 50.0),
            ("c-2", 0.5, 0.2, 0.3, 0.1, 50.0),
            ("c-3", 0.5, 0.2, 0.3, 0.1, 50.0),
        ]);

        let model = fit_kmeans(&features, 2, 100).unwrap();

        assert!(model.labels.iter().all(|&label| label == 0));
        // The empty cluster keeps its seed centroid untouched.
        assert_eq!(model.centroids.row(1), features.features.row(1));
        assert_eq!(model.cluster_sizes(), vec![3, 0]);
    }

    #[test]
    fn test_outlier_isolated_with_exact_centroid() {
        // k == n: every point seeds its own cluster, so the severe outlier
        // ends up alone and its centroid equals the point exactly.
        let features = feature_set_from(&[
            ("c-1", 0.5, 0.2, 0.3, 0.1, 50.0),
            ("c-2", 0.55, 0.25, 0.35, 0.12, 55.0),
            ("c-3", 0.45, 0.15, 0.25, 0.08, 45.0),
            ("outlier", 0.01, 0.0, 0.99, 0.9, 900.0),
            ("c-5", 0.52, 0.22, 0.32, 0.11, 52.0),
        ]);

        let model = fit_kmeans(&features, 5, 100).unwrap();

        assert_eq!(model.labels[3], 3);
        assert_eq!(model.cluster_sizes()[3], 1);
        assert_eq!(model.centroids.row(3), features.features.row(3));
    }

    #[test]
    fn test_k_shrinks_to_available_customers() {
        let features = feature_set_from(&[
            ("c-1", 0.5, 0.2, 0.3, 0.1, 50.0),
            ("c-2", 0.8, 0.4, 0.1, 0.05, 120.0),
        ]);

        let model = fit_kmeans(&features, 5, 100).unwrap();

        assert_eq!(model.n_clusters, 2);
        assert_eq!(model.centroids.nrows(), 2);
    }

    #[test]
    fn test_zero_clusters_error() {
        let features = feature_set_from(&[("c-1", 0.5, 0.2, 0.3, 0.1, 50.0)]);
        assert!(fit_kmeans(&features, 0, 100).is_err());
    }

    #[test]
    fn test_predict_nearest_centroid() {
        let features = feature_set_from(&[
            ("low", 0.5, 0.2, 0.3, 0.1, 10.0),
            ("high", 0.5, 0.2, 0.3, 0.1, 200.0),
        ]);

        let model = fit_kmeans(&features, 2, 100).unwrap();

        let near_low = model.predict(&[0.5, 0.2, 0.3, 0.1, 15.0]);
        let near_high = model.predict(&[0.5, 0.2, 0.3, 0.1, 190.0]);
        assert_eq!(near_low, model.labels[0]);
        assert_eq!(near_high, model.labels[1]);
    }

    #[test]
    fn test_inertia_is_finite_and_nonnegative() {
        let features = feature_set_from(&[
            ("c-1", 0.5, 0.2, 0.3, 0.1, 50.0),
            ("c-2", 0.8, 0.4, 0.1, 0.05, 120.0),
            ("c-3", 0.1, 0.05, 0.6, 0.3, 20.0),
        ]);

        let model = fit_kmeans(&features, 2, 100).unwrap();

        assert!(model.inertia >= 0.0);
        assert!(model.inertia.is_finite());
    }
}
