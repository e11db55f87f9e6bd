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

//! Elective offerings of the destination classes, densified once at ingestion so the search can
//! answer offering questions without touching the raw quota tables again.
//!
//! The interesting derived value is the *universal* second-language set: codes that every single
//! class teaches. A universal language can never restrict a student's mobility, so the
//! feasibility checks skip it entirely.

use std::collections::{BTreeMap, BTreeSet};

use log::debug;

use crate::{is_known_lv2, is_known_opt, ClassGroup, Student, SPECIALIZED_OPT};

/// Densified view of all classes' elective offerings
#[derive(Clone, Debug)]
pub struct Offerings {
    /// Per class: seat quota by second-language code
    lv2_quotas: Vec<BTreeMap<String, u32>>,
    /// Per class: seat quota by option code
    opt_quotas: Vec<BTreeMap<String, u32>>,
    /// Second-language codes with a positive quota in every class
    universal_lv2: BTreeSet<String>,
    /// Per class: whether it reserves seats for one of the specialized options
    specialized: Vec<bool>,
}

impl Offerings {
    /// Derive the offerings view from the raw per-class quota tables.
    pub fn build(classes: &[ClassGroup]) -> Offerings {
        let lv2_quotas: Vec<BTreeMap<String, u32>> =
            classes.iter().map(|c| c.lv2_quotas.clone()).collect();
        let opt_quotas: Vec<BTreeMap<String, u32>> =
            classes.iter().map(|c| c.opt_quotas.clone()).collect();

        // A code is universal iff *every* class has a positive quota for it. Note that this set
        // shrinks when a run is done with fewer classes, so we log it for verification.
        let mut universal_lv2 = BTreeSet::new();
        if !classes.is_empty() {
            let all_codes: BTreeSet<&String> = lv2_quotas.iter().flat_map(|q| q.keys()).collect();
            for code in all_codes {
                if lv2_quotas
                    .iter()
                    .all(|q| q.get(code).copied().unwrap_or(0) > 0)
                {
                    universal_lv2.insert(code.clone());
                }
            }
        }
        debug!("Universal second-language codes: {:?}", universal_lv2);

        let specialized: Vec<bool> = opt_quotas
            .iter()
            .map(|q| {
                SPECIALIZED_OPT
                    .iter()
                    .any(|code| q.get(*code).copied().unwrap_or(0) > 0)
            })
            .collect();

        Offerings {
            lv2_quotas,
            opt_quotas,
            universal_lv2,
            specialized,
        }
    }

    pub fn num_classes(&self) -> usize {
        self.lv2_quotas.len()
    }

    /// Seat quota of the given second-language code in the given class (0 if not offered)
    pub fn lv2_quota(&self, class: usize, code: &str) -> u32 {
        self.lv2_quotas[class].get(code).copied().unwrap_or(0)
    }

    /// Seat quota of the given option code in the given class (0 if not offered)
    pub fn opt_quota(&self, class: usize, code: &str) -> u32 {
        self.opt_quotas[class].get(code).copied().unwrap_or(0)
    }

    /// Whether the given class teaches the given second language
    pub fn offers_lv2(&self, class: usize, code: &str) -> bool {
        self.lv2_quota(class, code) > 0
    }

    /// Whether the given class teaches the given option
    pub fn offers_opt(&self, class: usize, code: &str) -> bool {
        self.opt_quota(class, code) > 0
    }

    /// Whether the given second language is taught by every class
    pub fn is_universal_lv2(&self, code: &str) -> bool {
        self.universal_lv2.contains(code)
    }

    pub fn universal_lv2(&self) -> &BTreeSet<String> {
        &self.universal_lv2
    }

    /// Whether the given class reserves seats for a specialized option
    pub fn is_specialized(&self, class: usize) -> bool {
        self.specialized[class]
    }

    /// The second-language codes offered (positive quota) by the given class
    pub fn lv2_codes(&self, class: usize) -> impl Iterator<Item = (&str, u32)> {
        self.lv2_quotas[class]
            .iter()
            .filter(|(_, q)| **q > 0)
            .map(|(code, q)| (code.as_str(), *q))
    }

    /// The option codes offered (positive quota) by the given class
    pub fn opt_codes(&self, class: usize) -> impl Iterator<Item = (&str, u32)> {
        self.opt_quotas[class]
            .iter()
            .filter(|(_, q)| **q > 0)
            .map(|(code, q)| (code.as_str(), *q))
    }

    /// Whether the class can receive the student as far as their electives are concerned.
    ///
    /// Unknown codes are free text and never restrict; a universal second language never
    /// restricts either.
    pub fn admits_electives(&self, student: &Student, class: usize) -> bool {
        let lv2_ok = student.lv2.is_empty()
            || !is_known_lv2(&student.lv2)
            || self.is_universal_lv2(&student.lv2)
            || self.offers_lv2(class, &student.lv2);
        let opt_ok = !is_known_opt(&student.opt) || self.offers_opt(class, &student.opt);
        lv2_ok && opt_ok
    }
}

/// Label each student as fixed or movable.
///
/// A student is fixed iff they carry an affinity code, or an antinomy code, or their elective
/// combination is admissible in exactly one class (there is nowhere else to put them). The
/// returned flags are meant to be applied to the students before a run; already-fixed students
/// stay fixed.
pub fn compute_mobility(students: &[Student], offerings: &Offerings) -> Vec<bool> {
    students
        .iter()
        .map(|s| {
            if s.fixed || !s.affinity.is_empty() || !s.antinomy.is_empty() {
                return true;
            }
            let admissible = (0..offerings.num_classes())
                .filter(|&c| offerings.admits_electives(s, c))
                .count();
            admissible == 1
        })
        .collect()
}
