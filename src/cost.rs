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

//! The per-class cost function of the balancing search and the cohort-wide statistics it
//! compares against. Lower is better, 0.0 is a perfectly balanced class.
//!
//! The individual terms are deliberately asymmetric: a missing head of class is much worse than a
//! surplus one (quadratic deficit vs. linear excess), and any excess of struggling students
//! beyond the tolerated band grows cubically so it dominates every other consideration.

use crate::{Config, Gender, Student};

/// Cost of an empty class. Sentinel value, larger than any realistically reachable cost sum.
pub const EMPTY_CLASS_COST: f64 = 10_000.0;

/// Weight of the squared headcount deviation from the class target
const HEADCOUNT_WEIGHT: f64 = 800.0;
/// Weight of the squared head-of-class deficit below the configured band
const HEAD_DEFICIT_WEIGHT: f64 = 500.0;
/// Weight of the linear head-of-class excess above the configured band
const HEAD_EXCESS_WEIGHT: f64 = 200.0;
/// Weight of the cubed low-tier excess above the tolerated maximum
const LOW_TIER_WEIGHT: f64 = 100.0;
/// Base weight of the gender-ratio deviation (scaled by `Config::w_parity`)
const GENDER_WEIGHT: f64 = 1000.0;
/// Base weight of the COM/TRA mean deviations (scaled by `Config::w_distrib`)
const ACADEMIC_WEIGHT: f64 = 100.0;
/// Base weight of the PART mean deviation. Halved, as participation scores are the least
/// reliably filled column of the source data.
const ACADEMIC_PART_WEIGHT: f64 = 50.0;

/// Cohort-wide reference statistics, captured once per run
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CohortStats {
    /// Share of female students over the whole cohort
    pub ratio_f: f64,
    pub mean_com: f64,
    pub mean_tra: f64,
    pub mean_part: f64,
}

impl CohortStats {
    pub fn collect(students: &[Student]) -> CohortStats {
        if students.is_empty() {
            return CohortStats::default();
        }
        let n = students.len() as f64;
        let num_f = students
            .iter()
            .filter(|s| s.gender == Gender::F)
            .count() as f64;
        CohortStats {
            ratio_f: num_f / n,
            mean_com: students.iter().map(|s| s.com as f64).sum::<f64>() / n,
            mean_tra: students.iter().map(|s| s.tra as f64).sum::<f64>() / n,
            mean_part: students.iter().map(|s| s.part as f64).sum::<f64>() / n,
        }
    }
}

/// Calculate the scalar cost of a class from its current members.
///
/// Pure function of the membership, the class target, the cohort statistics and the
/// configuration; the search calls it both on real and on hypothetical memberships.
pub fn class_cost(
    members: &[usize],
    students: &[Student],
    target: usize,
    stats: &CohortStats,
    config: &Config,
) -> f64 {
    let n = members.len();
    if n == 0 {
        return EMPTY_CLASS_COST;
    }

    let mut cost = 0.0;

    // Headcount deviation from the class target
    let delta = n as f64 - target as f64;
    cost += delta * delta * HEADCOUNT_WEIGHT;

    // Head-of-class band: quadratic deficit, linear excess
    let heads = members.iter().filter(|&&s| students[s].is_head()).count();
    if heads < config.head_min {
        let deficit = (config.head_min - heads) as f64;
        cost += deficit * deficit * HEAD_DEFICIT_WEIGHT;
    }
    if heads > config.head_max {
        cost += (heads - config.head_max) as f64 * HEAD_EXCESS_WEIGHT;
    }

    // Low-tier excess, cubed
    let lows = members
        .iter()
        .filter(|&&s| students[s].is_low_tier())
        .count();
    if lows > config.niv1_max {
        let excess = (lows - config.niv1_max) as f64;
        cost += excess * excess * excess * LOW_TIER_WEIGHT;
    }

    // Gender parity against the cohort ratio
    let num_f = members
        .iter()
        .filter(|&&s| students[s].gender == Gender::F)
        .count() as f64;
    cost += (num_f / n as f64 - stats.ratio_f).abs() * GENDER_WEIGHT * config.w_parity;

    // Academic means against the cohort means
    let mean = |f: fn(&Student) -> f32| {
        members.iter().map(|&s| f(&students[s]) as f64).sum::<f64>() / n as f64
    };
    cost += (mean(|s| s.com) - stats.mean_com).abs() * ACADEMIC_WEIGHT * config.w_distrib;
    cost += (mean(|s| s.tra) - stats.mean_tra).abs() * ACADEMIC_WEIGHT * config.w_distrib;
    cost += (mean(|s| s.part) - stats.mean_part).abs() * ACADEMIC_PART_WEIGHT * config.w_distrib;

    cost
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Config, Gender, Student};
    use assert_float_eq::assert_float_absolute_eq;

    fn student(gender: Gender, com: f32, tra: f32, part: f32) -> Student {
        Student {
            index: 0,
            id: String::from("s"),
            last_name: String::from("Doe"),
            first_name: String::from("Jo"),
            gender,
            com,
            tra,
            part,
            abs: 2.5,
            lv2: String::new(),
            opt: String::new(),
            affinity: String::new(),
            antinomy: String::new(),
            fixed: false,
        }
    }

    /// A config with the band terms disabled, so single terms can be tested in isolation
    fn permissive_config() -> Config {
        Config {
            head_min: 0,
            head_max: 99,
            niv1_max: 99,
            ..Config::default()
        }
    }

    /// Neutral cohort stats: scores at the neutral 2.5, half the cohort female
    fn neutral_stats() -> CohortStats {
        CohortStats {
            ratio_f: 0.5,
            mean_com: 2.5,
            mean_tra: 2.5,
            mean_part: 2.5,
        }
    }

    #[test]
    fn empty_class_is_maximally_bad() {
        let config = Config::default();
        let cost = class_cost(&[], &[], 24, &neutral_stats(), &config);
        assert_float_absolute_eq!(cost, EMPTY_CLASS_COST, 1e-9);
    }

    #[test]
    fn headcount_term_is_quadratic() {
        let config = permissive_config();
        let students = vec![
            student(Gender::F, 2.5, 2.5, 2.5),
            student(Gender::M, 2.5, 2.5, 2.5),
        ];
        // 2 students, target 4: delta = -2 -> 4 * 800 = 3200; all other terms are zero
        let cost = class_cost(&[0, 1], &students, 4, &neutral_stats(), &config);
        assert_float_absolute_eq!(cost, 3200.0, 1e-9);
    }

    #[test]
    fn head_band_is_asymmetric() {
        let mut config = permissive_config();
        config.head_min = 2;
        config.head_max = 2;
        let heads: Vec<Student> = (0..4).map(|_| student(Gender::F, 4.0, 4.0, 4.0)).collect();
        let plain: Vec<Student> = (0..4).map(|_| student(Gender::F, 2.5, 2.5, 2.5)).collect();

        // Deficit of 2 heads: 4 * 500 = 2000
        let stats = CohortStats {
            ratio_f: 1.0,
            mean_com: 2.5,
            mean_tra: 2.5,
            mean_part: 2.5,
        };
        let deficit_cost = class_cost(&[0, 1, 2, 3], &plain, 4, &stats, &config);
        assert_float_absolute_eq!(deficit_cost, 2000.0, 1e-9);

        // Excess of 2 heads: 2 * 200 = 400 (plus the academic deviation of the 4.0 scores)
        let stats = CohortStats {
            ratio_f: 1.0,
            mean_com: 4.0,
            mean_tra: 4.0,
            mean_part: 4.0,
        };
        let excess_cost = class_cost(&[0, 1, 2, 3], &heads, 4, &stats, &config);
        assert_float_absolute_eq!(excess_cost, 400.0, 1e-9);
    }

    #[test]
    fn low_tier_excess_is_cubic() {
        let mut config = permissive_config();
        config.niv1_max = 1;
        let lows: Vec<Student> = (0..4).map(|_| student(Gender::F, 1.0, 2.5, 2.5)).collect();
        let stats = CohortStats {
            ratio_f: 1.0,
            mean_com: 1.0,
            mean_tra: 2.5,
            mean_part: 2.5,
        };
        // 4 low-tier students, 1 tolerated: 3^3 * 100 = 2700
        let cost = class_cost(&[0, 1, 2, 3], &lows, 4, &stats, &config);
        assert_float_absolute_eq!(cost, 2700.0, 1e-9);
    }

    #[test]
    fn gender_term_follows_cohort_ratio() {
        let config = permissive_config();
        let students = vec![
            student(Gender::F, 2.5, 2.5, 2.5),
            student(Gender::F, 2.5, 2.5, 2.5),
            student(Gender::M, 2.5, 2.5, 2.5),
            student(Gender::M, 2.5, 2.5, 2.5),
        ];
        // All-female class in a half-female cohort: 0.5 * 1000 * 4.0 = 2000
        let cost = class_cost(&[0, 1], &students, 2, &neutral_stats(), &config);
        assert_float_absolute_eq!(cost, 2000.0, 1e-9);
        // Balanced class: no gender cost
        let cost = class_cost(&[0, 2], &students, 2, &neutral_stats(), &config);
        assert_float_absolute_eq!(cost, 0.0, 1e-9);
    }

    #[test]
    fn academic_terms_weight_part_lower() {
        let config = permissive_config();
        let students = vec![
            student(Gender::F, 3.5, 2.5, 2.5),
            student(Gender::M, 2.5, 2.5, 3.5),
        ];
        let stats = neutral_stats();
        // COM deviates by 0.5: 0.5 * 100 * 5.0 = 250, plus the gender term of the single-F class
        let cost = class_cost(&[0], &students, 1, &stats, &config);
        assert_float_absolute_eq!(cost, 250.0 + 2000.0, 1e-9);
        // PART deviates by 0.5 but only costs half: 0.5 * 50 * 5.0 = 125
        let cost = class_cost(&[1], &students, 1, &stats, &config);
        assert_float_absolute_eq!(cost, 125.0 + 2000.0, 1e-9);
    }
}
