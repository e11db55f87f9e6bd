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

//! Data model of the class repartition optimizer: students, destination classes and the
//! configuration of the stochastic balancing search. The algorithm itself lives in the `balance`
//! module, the hard-constraint checks in `feasible`, the per-class cost function in `cost` and the
//! post-run reporting in `audit`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub mod audit;
pub mod balance;
pub mod cost;
pub mod feasible;
pub mod io;
pub mod offerings;
pub mod util;

/// Canonical second-language codes taught somewhere in the school. Any other non-empty LV2 value
/// in the source data is treated as free text and never restricts placement.
pub const KNOWN_LV2: [&str; 4] = ["ESP", "ITA", "ALL", "POR"];

/// Canonical option codes. Any other non-empty OPT value never restricts placement.
pub const KNOWN_OPT: [&str; 3] = ["LATIN", "GREC", "CHAV"];

/// Option codes that mark a destination class as specialized when it reserves seats for them.
/// Such classes refuse students who need neither option and follow a non-default second language.
pub const SPECIALIZED_OPT: [&str; 2] = ["LATIN", "CHAV"];

/// Whether `code` is one of the canonical second-language codes
pub fn is_known_lv2(code: &str) -> bool {
    KNOWN_LV2.contains(&code)
}

/// Whether `code` is one of the canonical option codes
pub fn is_known_opt(code: &str) -> bool {
    KNOWN_OPT.contains(&code)
}

/// A student's gender, as far as the source data knows it
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    F,
    M,
    #[serde(other)]
    Unknown,
}

impl Default for Gender {
    fn default() -> Self {
        Gender::Unknown
    }
}

fn default_score() -> f32 {
    2.5
}

/// Representation of a single student of the cohort to be distributed
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Student {
    /// index of the student in the list of students
    #[serde(skip)]
    pub index: usize,
    /// Student's stable id in the source data
    pub id: String,
    /// Family name. Mainly used for info/debug output
    pub last_name: String,
    /// Given name. Mainly used for info/debug output
    pub first_name: String,
    #[serde(default)]
    pub gender: Gender,
    /// Communication score on the 1..4 scale (missing values default to 2.5)
    #[serde(default = "default_score")]
    pub com: f32,
    /// Work score on the 1..4 scale
    #[serde(default = "default_score")]
    pub tra: f32,
    /// Participation score on the 1..4 scale
    #[serde(default = "default_score")]
    pub part: f32,
    /// Absences criterion on the 1..4 scale
    #[serde(default = "default_score")]
    pub abs: f32,
    /// Second-language code (empty if none)
    #[serde(default)]
    pub lv2: String,
    /// Option code (empty if none)
    #[serde(default)]
    pub opt: String,
    /// Affinity group code: students sharing it must stay in the same class (empty if none)
    #[serde(default)]
    pub affinity: String,
    /// Antinomy group code: students sharing it must not share a class (empty if none)
    #[serde(default)]
    pub antinomy: String,
    /// Fixed students are immovable inputs and never take part in a swap
    #[serde(default)]
    pub fixed: bool,
}

impl Student {
    /// Whether the student counts as a "head of class" profile. Recomputed from the academic
    /// scores, never persisted.
    pub fn is_head(&self) -> bool {
        self.com >= 4.0 || self.tra >= 4.0 || (self.com + self.tra + self.part) / 3.0 >= 3.5
    }

    /// Whether the student counts as a struggling ("low tier") profile
    pub fn is_low_tier(&self) -> bool {
        self.com <= 1.0 || self.tra <= 1.0
    }

    /// Full name for reports and log output
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Clamp all academic scores to the valid [0, 5] range. Called once at ingestion.
    pub fn clamp_scores(&mut self) {
        self.com = self.com.clamp(0.0, 5.0);
        self.tra = self.tra.clamp(0.0, 5.0);
        self.part = self.part.clamp(0.0, 5.0);
        self.abs = self.abs.clamp(0.0, 5.0);
    }
}

/// Representation of a destination class with its elective offering and current membership
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClassGroup {
    /// index of the class in the list of classes
    #[serde(skip)]
    pub index: usize,
    /// Class name. Used for reports and log output
    pub name: String,
    /// Target headcount of the class
    pub target: usize,
    /// Seat quota per second-language code. A positive quota means the class teaches the
    /// language; the number doubles as the expected seat count for auditing.
    #[serde(default)]
    pub lv2_quotas: BTreeMap<String, u32>,
    /// Seat quota per option code, with the same semantics as `lv2_quotas`
    #[serde(default)]
    pub opt_quotas: BTreeMap<String, u32>,
    /// Indices of the students currently assigned to this class
    #[serde(default)]
    pub members: Vec<usize>,
}

/// A calculated assignment: maps each student index to the index of their destination class
pub type Assignment = Vec<usize>;

/// A fully loaded, in-memory problem instance, as produced by the ingestion frontend.
///
/// The optimizer treats students, class parameters and offerings as read-only; only class
/// membership is (re-)arranged during a run.
pub struct Snapshot {
    pub students: Vec<Student>,
    pub classes: Vec<ClassGroup>,
    pub offerings: offerings::Offerings,
    /// Whether the antinomy attribute was present in the source data at all. When it was not,
    /// no swap can be validated against it and the optimizer refuses to move anyone.
    pub antinomy_present: bool,
}

/// Tuning knobs of the balancing search. All weights and bands have sensible defaults; the
/// reserved fields are accepted (e.g. from a config file) but currently unused by the search.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Outer-loop iteration cap of the two-way swap phase
    pub max_swaps: u32,
    /// Number of consecutive non-improving iterations before the search is considered converged
    pub stagnation_limit: u32,
    /// Weight of the academic-mean terms of the cost function
    pub w_distrib: f64,
    /// Weight of the gender-parity term of the cost function
    pub w_parity: f64,
    /// Reserved
    pub w_profiles: f64,
    /// Reserved
    pub w_friends: f64,
    /// Lower end of the per-class "head of class" band
    pub head_min: usize,
    /// Upper end of the per-class "head of class" band
    pub head_max: usize,
    /// Maximum tolerated number of low-tier students per class
    pub niv1_max: usize,
    /// Reserved
    pub niv1_min: usize,
    /// The cohort's default second language. Students following it are exempt from the
    /// specialization preservation rule.
    pub default_lv2: String,
    /// Probability of picking a uniformly random partner class instead of the complementary one
    pub exploration_rate: f64,
    /// Maximum number of candidate students sampled per class side in the swap search
    pub sample_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_swaps: 2000,
            stagnation_limit: 50,
            w_distrib: 5.0,
            w_parity: 4.0,
            w_profiles: 10.0,
            w_friends: 1000.0,
            head_min: 2,
            head_max: 5,
            niv1_max: 4,
            niv1_min: 0,
            default_lv2: String::from("ESP"),
            exploration_rate: 0.2,
            sample_size: 25,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student_with_scores(com: f32, tra: f32, part: f32) -> Student {
        Student {
            index: 0,
            id: String::from("s"),
            last_name: String::from("Doe"),
            first_name: String::from("Jo"),
            gender: Gender::Unknown,
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

    #[test]
    fn head_classification() {
        assert!(student_with_scores(4.0, 2.0, 2.0).is_head());
        assert!(student_with_scores(2.0, 4.0, 2.0).is_head());
        // mean of 3.5 over the three scores is enough, even without a single 4
        assert!(student_with_scores(3.5, 3.5, 3.5).is_head());
        assert!(!student_with_scores(3.0, 3.0, 3.0).is_head());
    }

    #[test]
    fn low_tier_classification() {
        assert!(student_with_scores(1.0, 3.0, 3.0).is_low_tier());
        assert!(student_with_scores(3.0, 0.5, 3.0).is_low_tier());
        assert!(!student_with_scores(2.0, 2.0, 1.0).is_low_tier());
    }

    #[test]
    fn score_clamping() {
        let mut s = student_with_scores(7.0, -1.0, 3.0);
        s.clamp_scores();
        assert_eq!(s.com, 5.0);
        assert_eq!(s.tra, 0.0);
        assert_eq!(s.part, 3.0);
    }

    #[test]
    fn known_codes() {
        assert!(is_known_lv2("ITA"));
        assert!(!is_known_lv2("KLINGON"));
        assert!(is_known_opt("LATIN"));
        assert!(!is_known_opt(""));
    }
}
