// Copyright 2024 by the classo developers
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use this file except in compliance with
// the License. You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

//! The stochastic balancing search over class assignments.
//!
//! The search runs two phases. The two-way phase repeatedly picks the currently worst class,
//! selects a complementary partner class (with a small exploration rate to avoid locking on a
//! single pair), samples candidate student pairs from both sides and applies the best
//! cost-improving exchange that passes the feasibility check. A stagnation counter terminates the
//! phase once improvements dry up. The three-way phase afterwards rotates single students around
//! sampled class triples, which can unblock configurations where every pairwise exchange is
//! cost-neutral.
//!
//! The whole search is driven by one explicitly seeded PRNG: the same seed on the same snapshot
//! reproduces the identical run. All mutable search state (membership lists and the inverse
//! student-to-class index) is owned by the `Search` value; the snapshot itself is read-only.

use std::fmt;
use std::time;

use log::{debug, info, warn};
use ordered_float::NotNan;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::cost::{class_cost, CohortStats};
use crate::offerings::Offerings;
use crate::{audit, feasible, util, Assignment, ClassGroup, Config, Gender, Snapshot, Student};

/// Minimum cost gain for a candidate move to count as an improvement
const MIN_GAIN: f64 = 1e-4;
/// Outer iteration budget of the three-way cycle phase
const CYCLE_MAX_ROUNDS: usize = 200;
/// Class triples sampled per cycle round
const CYCLE_TRIPLES_PER_ROUND: usize = 15;
/// Student rotations sampled per class triple
const CYCLE_SAMPLES_PER_TRIPLE: usize = 10;
/// Number of partner-less iterations tolerated before the search gives up
const NO_PARTNER_STAGNATION: u32 = 10;

/// A struct to collect statistics about a balancing run.
///
/// It is filled during the run and returned as part of the result.
#[derive(Clone, Debug, Default)]
pub struct Statistics {
    /// Number of iterations of the two-way driver loop
    pub num_iterations: u32,
    /// Number of candidate moves that were scored (both phases)
    pub num_candidates: u32,
    /// Number of candidate moves rejected by the feasibility check
    pub num_infeasible: u32,
    /// Number of applied two-way swaps
    pub num_swaps_2way: u32,
    /// Number of rounds of the three-way cycle phase
    pub num_cycle_rounds: u32,
    /// Number of applied three-way rotations
    pub num_swaps_3way: u32,
    /// Total wall time of the run
    pub total_time: time::Duration,
}

impl fmt::Display for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Balancing statistics:
Two-way iterations:      {: >6}
Candidates evaluated:    {: >6}
    ... infeasible:      {: >6}
Applied two-way swaps:   {: >6}
Cycle rounds:            {: >6}
Applied three-way swaps: {: >6}

Total time: {:.3}s\n",
            self.num_iterations,
            self.num_candidates,
            self.num_infeasible,
            self.num_swaps_2way,
            self.num_cycle_rounds,
            self.num_swaps_3way,
            self.total_time.as_millis() as f32 / 1000f32,
        )
    }
}

/// Result of a complete balancing run
pub struct OptimizeResult {
    /// Whether the final assignment passed the antinomy duplication check
    pub ok: bool,
    /// Whether the two-way phase hit its iteration cap without converging
    pub exhausted: bool,
    /// Number of applied two-way swaps
    pub swaps_applied: u32,
    /// Number of applied three-way rotations
    pub swaps_3way: u32,
    /// False iff the antinomy attribute was missing, so nothing could be validated
    pub antinomy_validated: bool,
    /// Duplicated antinomy codes in the final assignment, if any
    pub violations: Vec<audit::Violation>,
    /// The calculated assignment: destination class index per student
    pub final_assignment: Assignment,
    pub statistics: Statistics,
}

/// Driver state of the two-way phase
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Running,
    Stagnating,
    Converged,
}

/// The best exchange found by one two-way search
struct SwapMove {
    a: usize,
    b: usize,
    gain: f64,
}

/// A student rotation around three classes: a moves to b's class, b to c's class, c to a's class
struct Rotation {
    a: usize,
    b: usize,
    c: usize,
    gain: f64,
}

/// Per-class profile values used by the partner selection
struct ClassProfile {
    heads: f64,
    lows: f64,
    ratio_f: f64,
    mean_com: f64,
}

/// Main function of this module: run the complete balancing search on the given snapshot.
///
/// Students, class parameters and offerings are read-only; the initial membership of the
/// snapshot's classes is the starting point of the search. The returned assignment maps every
/// student to their final class. All stochastic decisions are drawn from a single PRNG seeded
/// with `seed`, so runs are reproducible.
pub fn optimize(snapshot: &Snapshot, config: &Config, seed: u64) -> OptimizeResult {
    let tic = time::Instant::now();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    if snapshot.students.is_empty() || snapshot.classes.is_empty() {
        info!(
            "Nothing to balance: {} students in {} classes.",
            snapshot.students.len(),
            snapshot.classes.len()
        );
        return OptimizeResult {
            ok: true,
            exhausted: false,
            swaps_applied: 0,
            swaps_3way: 0,
            antinomy_validated: snapshot.antinomy_present,
            violations: Vec::new(),
            final_assignment: Vec::new(),
            statistics: Statistics::default(),
        };
    }
    if !snapshot.antinomy_present {
        warn!("The antinomy attribute is missing from the data; no swap can be validated, so no student will be moved.");
    }

    let mut search = Search::new(snapshot, config);
    let cost_before = search.total_cost();

    let exhausted = search.run_two_way(&mut rng);
    if exhausted {
        warn!(
            "Swap budget of {} iterations exhausted before convergence.",
            config.max_swaps
        );
    }
    search.run_cycle_phase(&mut rng);

    info!(
        "Balancing finished: total cost {:.1} -> {:.1} after {} swaps and {} rotations.",
        cost_before,
        search.total_cost(),
        search.statistics.num_swaps_2way,
        search.statistics.num_swaps_3way,
    );

    let violations = if snapshot.antinomy_present {
        audit::check_antinomies(&search.members, &snapshot.students, &snapshot.classes)
    } else {
        Vec::new()
    };

    let mut statistics = search.statistics.clone();
    statistics.total_time = tic.elapsed();
    OptimizeResult {
        ok: violations.is_empty(),
        exhausted,
        swaps_applied: statistics.num_swaps_2way,
        swaps_3way: statistics.num_swaps_3way,
        antinomy_validated: snapshot.antinomy_present,
        violations,
        final_assignment: search.class_of,
        statistics,
    }
}

/// The mutable state of a balancing run. Owns the working membership lists and their inverse
/// index; everything else is borrowed read-only from the snapshot.
struct Search<'a> {
    students: &'a [Student],
    classes: &'a [ClassGroup],
    offerings: &'a Offerings,
    config: &'a Config,
    antinomy_present: bool,
    /// Working membership list per class
    members: Vec<Vec<usize>>,
    /// Inverse index: current class of every student
    class_of: Vec<usize>,
    /// Cohort-wide reference statistics, constant during the run
    stats: CohortStats,
    statistics: Statistics,
}

impl<'a> Search<'a> {
    fn new(snapshot: &'a Snapshot, config: &'a Config) -> Search<'a> {
        let members: Vec<Vec<usize>> = snapshot.classes.iter().map(|c| c.members.clone()).collect();
        let mut class_of = vec![usize::MAX; snapshot.students.len()];
        for (c, class_members) in members.iter().enumerate() {
            for &s in class_members {
                class_of[s] = c;
            }
        }
        debug_assert!(
            class_of.iter().all(|&c| c != usize::MAX),
            "every student must start out assigned to a class"
        );
        Search {
            students: &snapshot.students,
            classes: &snapshot.classes,
            offerings: &snapshot.offerings,
            config,
            antinomy_present: snapshot.antinomy_present,
            members,
            class_of,
            stats: CohortStats::collect(&snapshot.students),
            statistics: Statistics::default(),
        }
    }

    fn cost_of(&self, class: usize) -> f64 {
        class_cost(
            &self.members[class],
            self.students,
            self.classes[class].target,
            &self.stats,
            self.config,
        )
    }

    /// Cost of a class with `leaving` hypothetically replaced by `arriving`
    fn cost_with_replacement(&self, class: usize, leaving: usize, arriving: usize) -> f64 {
        let members: Vec<usize> = self.members[class]
            .iter()
            .map(|&s| if s == leaving { arriving } else { s })
            .collect();
        class_cost(
            &members,
            self.students,
            self.classes[class].target,
            &self.stats,
            self.config,
        )
    }

    fn total_cost(&self) -> f64 {
        (0..self.members.len()).map(|c| self.cost_of(c)).sum()
    }

    /// The class with the highest cost, or None if all classes have cost 0 (first class wins on
    /// ties, so the scan is deterministic)
    fn worst_class(&self) -> Option<usize> {
        let mut worst = None;
        let mut worst_cost = 0.0;
        for c in 0..self.members.len() {
            let cost = self.cost_of(c);
            if cost > worst_cost {
                worst_cost = cost;
                worst = Some(c);
            }
        }
        worst
    }

    fn profile(&self, class: usize) -> ClassProfile {
        let members = &self.members[class];
        let n = members.len();
        if n == 0 {
            return ClassProfile {
                heads: 0.0,
                lows: 0.0,
                ratio_f: 0.0,
                mean_com: 0.0,
            };
        }
        ClassProfile {
            heads: members
                .iter()
                .filter(|&&s| self.students[s].is_head())
                .count() as f64,
            lows: members
                .iter()
                .filter(|&&s| self.students[s].is_low_tier())
                .count() as f64,
            ratio_f: members
                .iter()
                .filter(|&&s| self.students[s].gender == Gender::F)
                .count() as f64
                / n as f64,
            mean_com: members
                .iter()
                .map(|&s| self.students[s].com as f64)
                .sum::<f64>()
                / n as f64,
        }
    }

    /// Pick the partner class whose surpluses best mirror the worst class' deficits.
    ///
    /// With the configured exploration probability, a uniformly random other class is returned
    /// instead, so the search does not lock on a single class pair. Returns None iff there is no
    /// other class.
    fn select_partner(&self, worst: usize, rng: &mut ChaCha8Rng) -> Option<usize> {
        let n = self.members.len();
        if n < 2 {
            return None;
        }
        let others: Vec<usize> = (0..n).filter(|&c| c != worst).collect();
        if rng.gen::<f64>() < self.config.exploration_rate {
            return others.choose(rng).copied();
        }

        let w = self.profile(worst);
        let dh_w = w.heads - self.config.head_min as f64;
        let dl_w = w.lows - self.config.niv1_max as f64;
        others.into_iter().max_by_key(|&c| {
            let p = self.profile(c);
            let dh_c = p.heads - self.config.head_min as f64;
            let dl_c = p.lows - self.config.niv1_max as f64;
            let mut complementarity = 3.0 * (dh_w - dh_c).abs() + 3.0 * (dl_w - dl_c).abs();
            // Two bonus terms when the classes sit on opposite sides of the cohort average
            if (w.ratio_f - self.stats.ratio_f) * (p.ratio_f - self.stats.ratio_f) < 0.0 {
                complementarity += 2.0;
            }
            if (w.mean_com - self.stats.mean_com) * (p.mean_com - self.stats.mean_com) < 0.0 {
                complementarity += 2.0 * (w.mean_com - p.mean_com).abs();
            }
            NotNan::new(complementarity).expect("complementarity score must not be NaN")
        })
    }

    /// Search the best feasible, cost-improving exchange between the two classes.
    ///
    /// Up to `sample_size` members are sampled from each side; every sampled pair is checked for
    /// feasibility and scored against the current cost of the two classes.
    fn two_way_search(&mut self, c1: usize, c2: usize, rng: &mut ChaCha8Rng) -> Option<SwapMove> {
        let score_before = self.cost_of(c1) + self.cost_of(c2);
        let sample1 = util::sample_indices(rng, self.members[c1].len(), self.config.sample_size);
        let sample2 = util::sample_indices(rng, self.members[c2].len(), self.config.sample_size);

        let mut best: Option<SwapMove> = None;
        for &i in &sample1 {
            let a = self.members[c1][i];
            if self.students[a].fixed {
                continue;
            }
            for &j in &sample2 {
                let b = self.members[c2][j];
                if self.students[b].fixed {
                    continue;
                }
                self.statistics.num_candidates += 1;
                if !self.swap_feasible(a, b) {
                    self.statistics.num_infeasible += 1;
                    continue;
                }
                let score_after =
                    self.cost_with_replacement(c1, a, b) + self.cost_with_replacement(c2, b, a);
                let gain = score_before - score_after;
                if gain > 0.0 && best.as_ref().map_or(true, |m| gain > m.gain) {
                    best = Some(SwapMove { a, b, gain });
                }
            }
        }
        best
    }

    fn swap_feasible(&self, a: usize, b: usize) -> bool {
        feasible::can_swap(
            a,
            b,
            &self.class_of,
            &self.members,
            self.students,
            self.offerings,
            self.config,
            self.antinomy_present,
        )
    }

    fn apply_swap(&mut self, a: usize, b: usize) {
        let x = self.class_of[a];
        let y = self.class_of[b];
        let i = self.members[x]
            .iter()
            .position(|&s| s == a)
            .expect("membership lists out of sync");
        let j = self.members[y]
            .iter()
            .position(|&s| s == b)
            .expect("membership lists out of sync");
        self.members[x][i] = b;
        self.members[y][j] = a;
        self.class_of[a] = y;
        self.class_of[b] = x;
    }

    /// The two-way driver loop. Returns whether the iteration cap was hit before convergence.
    fn run_two_way(&mut self, rng: &mut ChaCha8Rng) -> bool {
        let mut stagnation: u32 = 0;
        let mut state = State::Running;
        while state != State::Converged && self.statistics.num_iterations < self.config.max_swaps {
            self.statistics.num_iterations += 1;

            let worst = match self.worst_class() {
                Some(w) => w,
                None => {
                    debug!("All classes are balanced, nothing left to improve.");
                    state = State::Converged;
                    break;
                }
            };
            let partner = match self.select_partner(worst, rng) {
                Some(p) => p,
                None => {
                    if stagnation > NO_PARTNER_STAGNATION {
                        state = State::Converged;
                        break;
                    }
                    stagnation += 1;
                    state = State::Stagnating;
                    continue;
                }
            };

            match self.two_way_search(worst, partner, rng) {
                Some(swap) if swap.gain > MIN_GAIN => {
                    self.apply_swap(swap.a, swap.b);
                    self.statistics.num_swaps_2way += 1;
                    stagnation = 0;
                    state = State::Running;
                    let n = self.statistics.num_swaps_2way;
                    if n <= 5 || n % 10 == 0 {
                        debug!(
                            "Swap {}: {} ({}) <-> {} ({}), gain {:.1}",
                            n,
                            self.students[swap.a].display_name(),
                            self.classes[worst].name,
                            self.students[swap.b].display_name(),
                            self.classes[partner].name,
                            swap.gain
                        );
                    }
                }
                _ => {
                    stagnation += 1;
                    state = State::Stagnating;
                }
            }

            if stagnation >= self.config.stagnation_limit {
                debug!("No improvement for {} iterations, stopping.", stagnation);
                state = State::Converged;
            }
        }
        state != State::Converged
    }

    /// The three-way cycle phase: sample class triples and student rotations, apply the best
    /// improving rotation per round, stop on the first round without one.
    fn run_cycle_phase(&mut self, rng: &mut ChaCha8Rng) {
        if self.members.len() < 3 {
            return;
        }
        for _ in 0..CYCLE_MAX_ROUNDS {
            self.statistics.num_cycle_rounds += 1;
            let mut best: Option<Rotation> = None;

            for _ in 0..CYCLE_TRIPLES_PER_ROUND {
                let (c1, c2, c3) = match util::distinct_triple(rng, self.members.len()) {
                    Some(triple) => triple,
                    None => return,
                };
                if self.members[c1].is_empty()
                    || self.members[c2].is_empty()
                    || self.members[c3].is_empty()
                {
                    continue;
                }
                let score_before = self.cost_of(c1) + self.cost_of(c2) + self.cost_of(c3);

                for _ in 0..CYCLE_SAMPLES_PER_TRIPLE {
                    let a = *self.members[c1].choose(rng).unwrap();
                    let b = *self.members[c2].choose(rng).unwrap();
                    let c = *self.members[c3].choose(rng).unwrap();
                    if self.students[a].fixed || self.students[b].fixed || self.students[c].fixed {
                        continue;
                    }
                    self.statistics.num_candidates += 1;
                    // Feasibility is checked on the (a, b) and (b, c) exchange legs; the closing
                    // leg c -> c1 follows by construction and is not checked separately.
                    if !self.swap_feasible(a, b) || !self.swap_feasible(b, c) {
                        self.statistics.num_infeasible += 1;
                        continue;
                    }
                    let score_after = self.cost_with_replacement(c1, a, c)
                        + self.cost_with_replacement(c2, b, a)
                        + self.cost_with_replacement(c3, c, b);
                    let gain = score_before - score_after;
                    if gain > MIN_GAIN && best.as_ref().map_or(true, |r| gain > r.gain) {
                        best = Some(Rotation { a, b, c, gain });
                    }
                }
            }

            match best {
                Some(rotation) => {
                    debug!(
                        "Rotation {}: {} -> {} -> {}, gain {:.1}",
                        self.statistics.num_swaps_3way + 1,
                        self.students[rotation.a].display_name(),
                        self.students[rotation.b].display_name(),
                        self.students[rotation.c].display_name(),
                        rotation.gain
                    );
                    self.apply_rotation(&rotation);
                    self.statistics.num_swaps_3way += 1;
                }
                None => break,
            }
        }
    }

    fn apply_rotation(&mut self, rotation: &Rotation) {
        let (a, b, c) = (rotation.a, rotation.b, rotation.c);
        let c1 = self.class_of[a];
        let c2 = self.class_of[b];
        let c3 = self.class_of[c];
        let i = self.members[c1]
            .iter()
            .position(|&s| s == a)
            .expect("membership lists out of sync");
        let j = self.members[c2]
            .iter()
            .position(|&s| s == b)
            .expect("membership lists out of sync");
        let k = self.members[c3]
            .iter()
            .position(|&s| s == c)
            .expect("membership lists out of sync");
        // a -> c2, b -> c3, c -> c1
        self.members[c1][i] = c;
        self.members[c2][j] = a;
        self.members[c3][k] = b;
        self.class_of[a] = c2;
        self.class_of[b] = c3;
        self.class_of[c] = c1;
    }
}
