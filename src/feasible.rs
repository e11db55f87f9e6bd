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

//! The feasibility check deciding whether a candidate exchange of two students respects all hard
//! placement constraints. Infeasibility is an ordinary `false`, never an error; the search calls
//! this on every sampled candidate pair, so every rule short-circuits.

use crate::offerings::Offerings;
use crate::{is_known_lv2, is_known_opt, Config, Student, SPECIALIZED_OPT};

/// Decide whether exchanging student `a` (in class `class_of[a]`) with student `b` (in class
/// `class_of[b]`) would violate any hard constraint.
///
/// Rules, in check order:
/// * the antinomy attribute must have been present in the source data (otherwise nothing can be
///   validated and every move is refused),
/// * neither student is fixed,
/// * neither student's antinomy code is already present in their destination class (the partner
///   being swapped out does not count),
/// * each student is the last member of their affinity group in their origin class, so no group
///   is ever split,
/// * each destination teaches the student's second language, unless it is universal or free text,
/// * each destination offers the student's option, if it is a canonical one,
/// * a class reserving seats for a specialized option does not take a student who needs none of
///   those options but follows a non-default second language.
pub fn can_swap(
    a: usize,
    b: usize,
    class_of: &[usize],
    members: &[Vec<usize>],
    students: &[Student],
    offerings: &Offerings,
    config: &Config,
    antinomy_present: bool,
) -> bool {
    // Without the antinomy attribute, exclusion groups cannot be checked at all: fail closed.
    if !antinomy_present {
        return false;
    }

    let sa = &students[a];
    let sb = &students[b];
    if sa.fixed || sb.fixed {
        return false;
    }

    let x = class_of[a];
    let y = class_of[b];

    // Antinomy exclusion in the destination class. The swap partner leaves, so it is skipped.
    if carries_antinomy_of(sa, &members[y], b, students)
        || carries_antinomy_of(sb, &members[x], a, students)
    {
        return false;
    }

    // Affinity integrity in the origin class: a student may only leave their affinity group
    // behind if nobody of the group stays.
    if leaves_affinity_behind(sa, &members[x], a, students)
        || leaves_affinity_behind(sb, &members[y], b, students)
    {
        return false;
    }

    // Elective offerings of the destination classes
    if !lv2_admissible(sa, y, offerings) || !lv2_admissible(sb, x, offerings) {
        return false;
    }
    if !opt_admissible(sa, y, offerings) || !opt_admissible(sb, x, offerings) {
        return false;
    }

    // Specialization preservation: seats in a LATIN/CHAV class are not consumed by students who
    // need neither option and follow a non-default second language.
    if !specialization_admissible(sa, y, offerings, config)
        || !specialization_admissible(sb, x, offerings, config)
    {
        return false;
    }

    true
}

/// Whether another student than `partner` in `dest_members` shares `student`'s antinomy code
fn carries_antinomy_of(
    student: &Student,
    dest_members: &[usize],
    partner: usize,
    students: &[Student],
) -> bool {
    !student.antinomy.is_empty()
        && dest_members
            .iter()
            .any(|&s| s != partner && students[s].antinomy == student.antinomy)
}

/// Whether another student than `student` itself stays behind in its origin class with the same
/// affinity code
fn leaves_affinity_behind(
    student: &Student,
    origin_members: &[usize],
    itself: usize,
    students: &[Student],
) -> bool {
    !student.affinity.is_empty()
        && origin_members
            .iter()
            .any(|&s| s != itself && students[s].affinity == student.affinity)
}

fn lv2_admissible(student: &Student, dest: usize, offerings: &Offerings) -> bool {
    student.lv2.is_empty()
        || !is_known_lv2(&student.lv2)
        || offerings.is_universal_lv2(&student.lv2)
        || offerings.offers_lv2(dest, &student.lv2)
}

fn opt_admissible(student: &Student, dest: usize, offerings: &Offerings) -> bool {
    !is_known_opt(&student.opt) || offerings.offers_opt(dest, &student.opt)
}

fn specialization_admissible(
    student: &Student,
    dest: usize,
    offerings: &Offerings,
    config: &Config,
) -> bool {
    if !offerings.is_specialized(dest) {
        return true;
    }
    let needs_specialization = SPECIALIZED_OPT.contains(&student.opt.as_str());
    let non_default_lv2 = !student.lv2.is_empty() && student.lv2 != config.default_lv2;
    needs_specialization || !non_default_lv2
}
