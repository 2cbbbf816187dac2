//! Adaptive source-view selection and multi-view cost aggregation.
use super::field::MAX_COST;
use super::params::PropagationParams;
use crate::device::MAX_IMAGES;

/// Maximum number of source views per problem.
pub const MAX_SOURCES: usize = MAX_IMAGES - 1;

/// Per-source-view costs of one hypothesis.
pub type ViewCosts = [f32; MAX_SOURCES];

/// Selected views (bitmask) and their aggregation weights.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewWeights {
    pub mask: u32,
    pub weights: [f32; MAX_SOURCES],
}

impl ViewWeights {
    /// Equal weights over the views in `mask`.
    pub fn uniform(mask: u32, num_sources: usize) -> Self {
        let mut weights = [0.0; MAX_SOURCES];
        for (j, w) in weights.iter_mut().enumerate().take(num_sources) {
            if mask & (1 << j) != 0 {
                *w = 1.0;
            }
        }
        Self { mask, weights }
    }

    /// Weighted mean of `costs` over the selected views.
    pub fn aggregate(&self, costs: &ViewCosts, num_sources: usize) -> f32 {
        let mut sum = 0.0f32;
        let mut total = 0.0f32;
        for j in 0..num_sources {
            let w = self.weights[j];
            if w > 0.0 {
                sum += w * costs[j];
                total += w;
            }
        }
        if total <= 0.0 {
            return MAX_COST;
        }
        (sum / total).min(MAX_COST)
    }
}

/// Mask with the first `n` bits set.
#[inline]
pub fn full_mask(n: usize) -> u32 {
    if n >= 32 {
        u32::MAX
    } else {
        (1u32 << n) - 1
    }
}

/// Mean of the `k` lowest view costs and the mask of the views used.
pub fn top_k(costs: &ViewCosts, num_sources: usize, k: usize) -> (f32, u32) {
    let mut order: Vec<usize> = (0..num_sources).collect();
    order.sort_by(|&a, &b| costs[a].total_cmp(&costs[b]));
    let k = k.clamp(1, num_sources.max(1)).min(num_sources);
    if k == 0 {
        return (MAX_COST, 0);
    }
    let mut mask = 0u32;
    let mut sum = 0.0;
    for &j in &order[..k] {
        mask |= 1 << j;
        sum += costs[j];
    }
    ((sum / k as f32).min(MAX_COST), mask)
}

/// Choose the source views that agree across the propagation candidates.
///
/// A view is kept when more than `min_good` candidates match it well and
/// fewer than `max_bad` match it badly; its weight is the mean Gaussian
/// confidence of the good matches. When nothing qualifies the previous
/// selection is reused, then the `top_k` views with the lowest best cost.
pub fn select_views(
    candidates: &[ViewCosts],
    num_sources: usize,
    previous: u32,
    iteration: usize,
    params: &PropagationParams,
) -> ViewWeights {
    let good_threshold = params.good_threshold(iteration);
    let two_beta_sq = 2.0 * params.view_weight_beta * params.view_weight_beta;
    let mut mask = 0u32;
    let mut weights = [0.0f32; MAX_SOURCES];
    for j in 0..num_sources {
        let mut good = 0usize;
        let mut bad = 0usize;
        let mut confidence = 0.0f32;
        for costs in candidates {
            let c = costs[j];
            if c < good_threshold {
                good += 1;
                confidence += (-(c * c) / two_beta_sq).exp();
            } else if c > params.bad_cost {
                bad += 1;
            }
        }
        if good > params.min_good && bad < params.max_bad {
            mask |= 1 << j;
            weights[j] = confidence / good as f32;
        }
    }
    if mask != 0 {
        return ViewWeights { mask, weights };
    }

    let previous = previous & full_mask(num_sources);
    if previous != 0 {
        return ViewWeights::uniform(previous, num_sources);
    }

    let mut best = [MAX_COST; MAX_SOURCES];
    for costs in candidates {
        for j in 0..num_sources {
            best[j] = best[j].min(costs[j]);
        }
    }
    let (_, mask) = top_k(&best, num_sources, params.top_k);
    ViewWeights::uniform(mask, num_sources)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn costs(values: &[f32]) -> ViewCosts {
        let mut out = [MAX_COST; MAX_SOURCES];
        out[..values.len()].copy_from_slice(values);
        out
    }

    #[test]
    fn consistent_views_are_selected() {
        let params = PropagationParams::default();
        // View 0 matches every candidate, view 1 never, view 2 for half.
        let candidates: Vec<ViewCosts> = (0..8)
            .map(|i| costs(&[0.1, 1.8, if i % 2 == 0 { 0.2 } else { 1.5 }]))
            .collect();
        let sel = select_views(&candidates, 3, 0, 0, &params);
        assert_eq!(sel.mask, 0b001);
        assert!(sel.weights[0] > 0.9);
        assert_eq!(sel.weights[1], 0.0);
    }

    #[test]
    fn falls_back_to_previous_then_top_k() {
        let params = PropagationParams {
            top_k: 2,
            ..Default::default()
        };
        let candidates = vec![costs(&[1.9, 1.0, 1.9, 0.9])];
        let sel = select_views(&candidates, 4, 0b0100, 0, &params);
        assert_eq!(sel.mask, 0b0100);
        let sel = select_views(&candidates, 4, 0, 0, &params);
        assert_eq!(sel.mask, 0b1010);
    }

    #[test]
    fn aggregation_is_weighted_mean() {
        let sel = ViewWeights {
            mask: 0b11,
            weights: {
                let mut w = [0.0; MAX_SOURCES];
                w[0] = 1.0;
                w[1] = 3.0;
                w
            },
        };
        let c = costs(&[0.2, 0.6, 0.0]);
        assert!((sel.aggregate(&c, 3) - 0.5).abs() < 1e-6);
        assert_eq!(ViewWeights::uniform(0, 3).aggregate(&c, 3), MAX_COST);
    }

    #[test]
    fn top_k_averages_lowest_costs() {
        let (mean, mask) = top_k(&costs(&[0.9, 0.1, 0.5, 0.3]), 4, 2);
        assert!((mean - 0.2).abs() < 1e-6);
        assert_eq!(mask, 0b1010);
    }
}
