//! Dataset downsampling.
//!
//! Three methods, chosen by the caller:
//!
//! - **Random**: partial Fisher–Yates, first `k` of the shuffle
//! - **Stratified**: proportional allocation across caller-defined strata,
//!   every non-empty stratum gets at least one item when `k` allows it
//! - **Systematic**: fixed stride `n / k`, deterministic (input should be
//!   pre-sorted to avoid periodic bias)

use std::collections::BTreeMap;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use cider_common::SamplingMethod;
use cider_config::SamplingSettings;

/// How (and whether) to sample a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingConfig {
    pub enabled: bool,
    pub sample_size: usize,
    pub method: SamplingMethod,
    /// Name of the stratification attribute, for reporting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stratification_key: Option<String>,
}

/// Describes the sample that was actually drawn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingMetadata {
    pub sampled: bool,
    pub sample_size: usize,
    pub total_population: usize,
    pub method: SamplingMethod,
    pub confidence_level: f64,
}

impl SamplingMetadata {
    /// Metadata for a dataset used in full.
    pub fn unsampled(population: usize, method: SamplingMethod) -> Self {
        Self {
            sampled: false,
            sample_size: population,
            total_population: population,
            method,
            confidence_level: calculate_confidence_level(population, population),
        }
    }

    /// Multiplier that turns a sample total into a population estimate.
    pub fn scale_factor(&self) -> f64 {
        if self.sampled && self.sample_size > 0 {
            self.total_population as f64 / self.sample_size as f64
        } else {
            1.0
        }
    }
}

/// Whether a dataset of `size` items should be sampled at all.
pub fn should_sample(size: usize, threshold: usize) -> bool {
    size > threshold
}

/// Sample size for a population, tiered by magnitude and capped at the
/// population.
pub fn calculate_sample_size(population: usize, settings: &SamplingSettings) -> usize {
    let size = if !should_sample(population, settings.threshold) {
        population
    } else if population < settings.large_population {
        settings.small_sample_size
    } else {
        settings.large_sample_size
    };
    size.min(population)
}

/// Confidence level as a step function of the sampling ratio.
pub fn calculate_confidence_level(sample_size: usize, population: usize) -> f64 {
    if population == 0 {
        return 0.95;
    }
    let ratio = sample_size as f64 / population as f64;
    if ratio >= 0.5 {
        0.95
    } else if ratio >= 0.2 {
        0.90
    } else if ratio >= 0.1 {
        0.85
    } else {
        0.75
    }
}

/// Stratified by period when the dataset crosses the threshold, otherwise off.
pub fn create_default_strategy(size: usize, settings: &SamplingSettings) -> SamplingConfig {
    SamplingConfig {
        enabled: should_sample(size, settings.threshold),
        sample_size: calculate_sample_size(size, settings),
        method: SamplingMethod::Stratified,
        stratification_key: Some("period".to_string()),
    }
}

/// Sample `items` with the thread-local RNG.
///
/// `stratum_of` is consulted only by the stratified method.
pub fn apply_sampling<T, K, F>(
    items: &[T],
    config: &SamplingConfig,
    stratum_of: F,
) -> (Vec<T>, SamplingMetadata)
where
    T: Clone,
    K: Ord,
    F: Fn(&T) -> K,
{
    apply_sampling_with_rng(items, config, stratum_of, &mut rand::rng())
}

/// [`apply_sampling`] with an explicit RNG.
pub fn apply_sampling_with_rng<T, K, F, R>(
    items: &[T],
    config: &SamplingConfig,
    stratum_of: F,
    rng: &mut R,
) -> (Vec<T>, SamplingMetadata)
where
    T: Clone,
    K: Ord,
    F: Fn(&T) -> K,
    R: Rng,
{
    let population = items.len();
    let k = config.sample_size.min(population);
    if !config.enabled || k >= population {
        return (
            items.to_vec(),
            SamplingMetadata::unsampled(population, config.method),
        );
    }

    let indices = match config.method {
        SamplingMethod::Random => random_indices(population, k, rng),
        SamplingMethod::Systematic => systematic_indices(population, k),
        SamplingMethod::Stratified => {
            let strata: Vec<K> = items.iter().map(&stratum_of).collect();
            stratified_indices(&strata, k, rng)
        }
    };

    let sample: Vec<T> = indices.iter().map(|&i| items[i].clone()).collect();
    debug!(
        method = %config.method,
        population,
        sample = sample.len(),
        "dataset sampled"
    );
    let metadata = SamplingMetadata {
        sampled: true,
        sample_size: sample.len(),
        total_population: population,
        method: config.method,
        confidence_level: calculate_confidence_level(sample.len(), population),
    };
    (sample, metadata)
}

/// `k` distinct positions of `0..n` in random order, in O(k) space.
fn random_indices<R: Rng>(n: usize, k: usize, rng: &mut R) -> Vec<usize> {
    rand::seq::index::sample(rng, n, k.min(n)).into_vec()
}

fn partial_shuffle<T, R: Rng>(pool: &mut [T], k: usize, rng: &mut R) {
    let n = pool.len();
    for i in 0..k.min(n) {
        let j = rng.random_range(i..n);
        pool.swap(i, j);
    }
}

fn systematic_indices(n: usize, k: usize) -> Vec<usize> {
    if k == 0 {
        return Vec::new();
    }
    let stride = n as f64 / k as f64;
    (0..k)
        .map(|i| ((i as f64 * stride).floor() as usize).min(n - 1))
        .collect()
}

fn stratified_indices<K: Ord, R: Rng>(strata: &[K], k: usize, rng: &mut R) -> Vec<usize> {
    let mut groups: BTreeMap<&K, Vec<usize>> = BTreeMap::new();
    for (i, key) in strata.iter().enumerate() {
        groups.entry(key).or_default().push(i);
    }
    let sizes: Vec<usize> = groups.values().map(Vec::len).collect();
    let quotas = allocate(&sizes, k);

    let mut picked = Vec::with_capacity(k);
    for (members, quota) in groups.into_values().zip(quotas) {
        let mut members = members;
        partial_shuffle(&mut members, quota, rng);
        picked.extend_from_slice(&members[..quota]);
    }
    picked
}

/// Proportional allocation of `k` slots over strata of the given sizes.
///
/// Sums to exactly `min(k, Σ sizes)`; no stratum exceeds its size; every
/// stratum gets at least one slot when `k >= sizes.len()`.
fn allocate(sizes: &[usize], k: usize) -> Vec<usize> {
    let total: usize = sizes.iter().sum();
    let k = k.min(total);
    if total == 0 || k == 0 {
        return vec![0; sizes.len()];
    }

    let exact: Vec<f64> = sizes
        .iter()
        .map(|&s| k as f64 * s as f64 / total as f64)
        .collect();
    let mut quotas: Vec<usize> = exact
        .iter()
        .zip(sizes)
        .map(|(&e, &s)| (e.floor() as usize).min(s))
        .collect();

    if k >= sizes.len() {
        for (q, &s) in quotas.iter_mut().zip(sizes) {
            if *q == 0 && s > 0 {
                *q = 1;
            }
        }
    }

    let mut assigned: usize = quotas.iter().sum();
    // The one-per-stratum floor can overshoot; take back from the largest.
    while assigned > k {
        let Some(largest) = (0..quotas.len())
            .filter(|&i| quotas[i] > 1)
            .max_by_key(|&i| quotas[i])
        else {
            break;
        };
        quotas[largest] -= 1;
        assigned -= 1;
    }

    // Largest remainder first, ties by stratum order.
    let mut order: Vec<usize> = (0..sizes.len()).collect();
    order.sort_by(|&a, &b| {
        let ra = exact[a] - exact[a].floor();
        let rb = exact[b] - exact[b].floor();
        rb.total_cmp(&ra).then(a.cmp(&b))
    });
    while assigned < k {
        let mut progressed = false;
        for &i in &order {
            if assigned == k {
                break;
            }
            if quotas[i] < sizes[i] {
                quotas[i] += 1;
                assigned += 1;
                progressed = true;
            }
        }
        if !progressed {
            break;
        }
    }
    quotas
}
