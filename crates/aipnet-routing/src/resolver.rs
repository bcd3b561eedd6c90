//! SAD resolver: hard-constraint veto plus weighted soft-constraint scoring
//! over a candidate's advertised SAD (spec §4.6).

use crate::sad::{FieldType, Sad};

/// Sentinel returned for a disqualified candidate.
pub const DISQUALIFIED: f64 = -1.0;

/// Soft-constraint weights. Must sum to roughly 1.0; the resolver clamps the
/// composite score to `[0, 1]` regardless.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Weights {
    pub capability: f64,
    pub latency: f64,
    pub cost: f64,
    pub context_window: f64,
    pub trust: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            capability: 0.30,
            latency: 0.25,
            cost: 0.20,
            context_window: 0.15,
            trust: 0.10,
        }
    }
}

/// Per-candidate measured metrics the resolver consults alongside its SAD.
#[derive(Debug, Clone, Copy, Default)]
pub struct CandidateMetrics {
    pub latency_us: u32,
    pub region: u16,
}

/// Score `candidate` against `query` using `weights`. Returns [`DISQUALIFIED`]
/// if any hard constraint fails, otherwise a value in `[0, 1]`.
pub fn score(query: &Sad, candidate: &Sad, metrics: &CandidateMetrics, weights: &Weights) -> f64 {
    if query.is_wildcard() {
        return if passes_hard_constraints(query, candidate, metrics) {
            1.0
        } else {
            DISQUALIFIED
        };
    }

    if !passes_hard_constraints(query, candidate, metrics) {
        return DISQUALIFIED;
    }

    let mut total = 0.0;

    if query.has_field(FieldType::Capability) {
        let query_caps = query.u32_or_zero(FieldType::Capability);
        let cand_caps = candidate.u32_or_zero(FieldType::Capability);
        let s = if query_caps == 0 {
            0.0
        } else {
            (cand_caps & query_caps).count_ones() as f64 / query_caps.count_ones() as f64
        };
        total += weights.capability * s;
    }

    if query.has_field(FieldType::MaxLatencyMs) {
        let max_ms = query.u32_or_zero(FieldType::MaxLatencyMs) as f64;
        let cand_ms = metrics.latency_us as f64 / 1000.0;
        let s = if max_ms > 0.0 { (1.0 - cand_ms / max_ms).max(0.0) } else { 0.0 };
        total += weights.latency * s;
    }

    if query.has_field(FieldType::MaxCostMilli) {
        let max_cost = query.u32_or_zero(FieldType::MaxCostMilli) as f64;
        let cand_cost = candidate.u32_or_zero(FieldType::MaxCostMilli) as f64;
        let s = if max_cost > 0.0 { (1.0 - cand_cost / max_cost).max(0.0) } else { 0.0 };
        total += weights.cost * s;
    }

    if query.has_field(FieldType::ContextWindow) {
        total += weights.context_window * 1.0;
    }

    if query.has_field(FieldType::TrustLevel) {
        total += weights.trust * 1.0;
    }

    let mut composite = total.clamp(0.0, 1.0);

    if query.has_field(FieldType::RegionPrefer) {
        let preferred = query.u16_list(FieldType::RegionPrefer).contains(&metrics.region);
        composite *= if preferred { 1.0 } else { 0.5 };
    }

    composite.clamp(0.0, 1.0)
}

fn passes_hard_constraints(query: &Sad, candidate: &Sad, metrics: &CandidateMetrics) -> bool {
    if query.has_field(FieldType::ContextWindow) {
        let required = query.u32_or_zero(FieldType::ContextWindow);
        let have = candidate.u32_or_zero(FieldType::ContextWindow);
        if have < required {
            return false;
        }
    }

    if query.has_field(FieldType::TrustLevel) {
        let required = query.u8_or_zero(FieldType::TrustLevel);
        let have = candidate.u8_or_zero(FieldType::TrustLevel);
        if have < required {
            return false;
        }
    }

    if query.has_field(FieldType::RegionExclude)
        && query.u16_list(FieldType::RegionExclude).contains(&metrics.region)
    {
        return false;
    }

    if query.has_field(FieldType::ModelArch) {
        let required = query.u32_or_zero(FieldType::ModelArch);
        let have = candidate.u32_or_zero(FieldType::ModelArch);
        if have != required {
            return false;
        }
    }

    true
}

/// Select up to `max_results` candidates by descending score, breaking ties
/// by ascending latency then by node-id byte order (spec §4.6 "Top-K
/// selection").
pub fn top_k<'a, T>(
    candidates: impl IntoIterator<Item = (&'a T, f64, u32, &'a [u8])>,
    max_results: usize,
) -> Vec<&'a T> {
    let mut scored: Vec<(&'a T, f64, u32, &'a [u8])> = candidates
        .into_iter()
        .filter(|(_, s, _, _)| *s >= 0.0)
        .collect();

    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.2.cmp(&b.2))
            .then_with(|| a.3.cmp(b.3))
    });

    scored.into_iter().take(max_results).map(|(t, _, _, _)| t).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sad::capability;

    #[test]
    fn wildcard_query_scores_one() {
        let query = Sad::wildcard();
        let candidate = Sad::wildcard().with_u32(FieldType::ModelArch, 1);
        let metrics = CandidateMetrics::default();
        assert_eq!(score(&query, &candidate, &metrics, &Weights::default()), 1.0);
    }

    #[test]
    fn model_arch_mismatch_disqualifies() {
        let query = Sad::wildcard().with_u32(FieldType::ModelArch, 1);
        let candidate = Sad::wildcard().with_u32(FieldType::ModelArch, 2);
        let metrics = CandidateMetrics::default();
        assert_eq!(score(&query, &candidate, &metrics, &Weights::default()), DISQUALIFIED);
    }

    #[test]
    fn context_window_too_small_disqualifies() {
        let query = Sad::wildcard().with_u32(FieldType::ContextWindow, 100_000);
        let candidate = Sad::wildcard().with_u32(FieldType::ContextWindow, 50_000);
        let metrics = CandidateMetrics::default();
        assert_eq!(score(&query, &candidate, &metrics, &Weights::default()), DISQUALIFIED);
    }

    #[test]
    fn region_exclude_disqualifies() {
        let query = Sad::wildcard().with_u16_list(FieldType::RegionExclude, vec![5]);
        let candidate = Sad::wildcard();
        let metrics = CandidateMetrics { region: 5, ..Default::default() };
        assert_eq!(score(&query, &candidate, &metrics, &Weights::default()), DISQUALIFIED);
    }

    #[test]
    fn capability_overlap_scales_score() {
        let query = Sad::wildcard()
            .with_u32(FieldType::Capability, capability::TEXT_GEN | capability::CODE_GEN);
        let full = Sad::wildcard().with_u32(FieldType::Capability, capability::TEXT_GEN | capability::CODE_GEN);
        let half = Sad::wildcard().with_u32(FieldType::Capability, capability::TEXT_GEN);
        let metrics = CandidateMetrics::default();
        let weights = Weights::default();
        let full_score = score(&query, &full, &metrics, &weights);
        let half_score = score(&query, &half, &metrics, &weights);
        assert!(full_score > half_score);
        assert!((full_score - weights.capability).abs() < 1e-9);
    }

    #[test]
    fn region_prefer_applies_modifier() {
        let query = Sad::wildcard().with_u16_list(FieldType::RegionPrefer, vec![9]);
        let candidate = Sad::wildcard();
        let weights = Weights::default();
        let preferred = score(&query, &candidate, &CandidateMetrics { region: 9, ..Default::default() }, &weights);
        let other = score(&query, &candidate, &CandidateMetrics { region: 1, ..Default::default() }, &weights);
        assert!(preferred >= other);
    }

    #[test]
    fn top_k_orders_by_score_then_latency_then_node_id() {
        let a = "node-a";
        let b = "node-b";
        let c = "node-c";
        let entries = [
            (&a, 0.5, 100u32, b"aaaa".as_slice()),
            (&b, 0.9, 50u32, b"bbbb".as_slice()),
            (&c, 0.9, 50u32, b"aaab".as_slice()),
        ];
        let result = top_k(entries.iter().map(|(n, s, l, id)| (*n, *s, *l, *id)), 2);
        assert_eq!(result, vec![&c, &b]);
    }
}
