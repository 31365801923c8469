//! Greedy set-cover minimization of the scenario pool
//!
//! Picks the smallest subset of scenarios whose visible-sets union to the
//! reachable universe, by repeatedly taking the scenario covering the most
//! still-uncovered questions. The classical greedy bound applies: at most
//! ln|universe| + 1 times the optimum, which is all the precision a test
//! plan needs.
//!
//! Visible-sets are bitsets over the question index, so each selection round
//! is linear in pool size times universe words.

use crate::synth::{Scenario, ScenarioPool};
use fixedbitset::FixedBitSet;

/// Result of minimizing a pool
#[derive(Debug, Clone)]
pub struct CoverSelection {
    /// Indices into the pool, in selection order
    pub selected: Vec<usize>,

    /// Union of the selected scenarios' visible-sets
    pub covered: FixedBitSet,
}

/// Greedy set cover over `pool.scenarios` against `pool.reachable`.
///
/// Ties on newly-covered count prefer the scenario answering the fewest
/// test variables (simpler for a human tester to execute), then the
/// earliest pool position. Stops once nothing uncovered can be gained,
/// which on a partial pool leaves a visible shortfall rather than looping.
pub fn minimize(pool: &ScenarioPool) -> CoverSelection {
    greedy_cover(&pool.scenarios, &pool.reachable)
}

/// Greedy set cover of `universe` using the given scenarios.
pub fn greedy_cover(scenarios: &[Scenario], universe: &FixedBitSet) -> CoverSelection {
    let mut uncovered = universe.clone();
    let mut covered = FixedBitSet::with_capacity(universe.len());
    let mut selected: Vec<usize> = Vec::new();
    let mut used = vec![false; scenarios.len()];

    while uncovered.count_ones(..) > 0 {
        let mut best: Option<(usize, usize, usize)> = None; // (gain, answered, index)

        for (idx, scenario) in scenarios.iter().enumerate() {
            if used[idx] {
                continue;
            }
            let gain = scenario.visible.intersection(&uncovered).count();
            if gain == 0 {
                continue;
            }
            let answered = scenario.answered_count();
            let better = match best {
                None => true,
                Some((best_gain, best_answered, _)) => {
                    gain > best_gain || (gain == best_gain && answered < best_answered)
                }
            };
            if better {
                best = Some((gain, answered, idx));
            }
        }

        let Some((_, _, idx)) = best else {
            break;
        };

        used[idx] = true;
        selected.push(idx);
        covered.union_with(&scenarios[idx].visible);
        uncovered.difference_with(&scenarios[idx].visible);
    }

    CoverSelection { selected, covered }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::ScenarioOrigin;

    fn scenario(assignment: Vec<i64>, visible: &[usize], n: usize) -> Scenario {
        let mut set = FixedBitSet::with_capacity(n);
        for &q in visible {
            set.insert(q);
        }
        Scenario {
            assignment,
            visible: set,
            origin: ScenarioOrigin::Enumerated,
        }
    }

    fn universe(bits: &[usize], n: usize) -> FixedBitSet {
        let mut set = FixedBitSet::with_capacity(n);
        for &q in bits {
            set.insert(q);
        }
        set
    }

    #[test]
    fn test_picks_largest_gain_first() {
        let scenarios = vec![
            scenario(vec![1, 0], &[0], 3),
            scenario(vec![2, 1], &[0, 1, 2], 3),
            scenario(vec![2, 2], &[0, 1], 3),
        ];
        let result = greedy_cover(&scenarios, &universe(&[0, 1, 2], 3));
        assert_eq!(result.selected, vec![1]);
    }

    #[test]
    fn test_tie_break_prefers_fewer_answers() {
        let scenarios = vec![
            scenario(vec![1, 1], &[0, 1], 2),
            scenario(vec![1, 0], &[0, 1], 2),
        ];
        let result = greedy_cover(&scenarios, &universe(&[0, 1], 2));
        // Equal gain; the second scenario answers fewer variables.
        assert_eq!(result.selected, vec![1]);
    }

    #[test]
    fn test_tie_break_falls_back_to_pool_order() {
        let scenarios = vec![
            scenario(vec![1], &[0, 1], 2),
            scenario(vec![2], &[0, 1], 2),
        ];
        let result = greedy_cover(&scenarios, &universe(&[0, 1], 2));
        assert_eq!(result.selected, vec![0]);
    }

    #[test]
    fn test_stops_when_no_gain_remains() {
        let scenarios = vec![scenario(vec![1], &[0], 3)];
        let result = greedy_cover(&scenarios, &universe(&[0, 2], 3));
        assert_eq!(result.selected, vec![0]);
        // Question 2 is uncovered but no scenario reaches it.
        assert!(!result.covered.contains(2));
    }

    #[test]
    fn test_cover_equals_pool_coverage() {
        let scenarios = vec![
            scenario(vec![1, 0], &[0, 1], 4),
            scenario(vec![2, 1], &[0, 2], 4),
            scenario(vec![2, 2], &[0, 3], 4),
        ];
        let result = greedy_cover(&scenarios, &universe(&[0, 1, 2, 3], 4));

        let mut pool_union = FixedBitSet::with_capacity(4);
        for s in &scenarios {
            pool_union.union_with(&s.visible);
        }
        assert_eq!(result.covered, pool_union);
        assert_eq!(result.selected.len(), 3);
    }
}
