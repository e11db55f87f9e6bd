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

//! Post-run certification of an assignment: the antinomy duplication check that decides whether
//! a result is acceptable, and the full per-class audit report for human review.

use std::collections::BTreeMap;
use std::fmt;
use std::fmt::Write;

use serde::Serialize;

use crate::offerings::Offerings;
use crate::{is_known_lv2, is_known_opt, Assignment, ClassGroup, Gender, Student};

/// A duplicated antinomy code within one class
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub class_name: String,
    pub code: String,
    pub count: usize,
    /// Display names of the students carrying the code
    pub students: Vec<String>,
}

/// Find all duplicated antinomy codes, per class.
///
/// Any non-empty code carried by more than one member of the same class is a violation; an
/// acceptable assignment has none.
pub fn check_antinomies(
    members: &[Vec<usize>],
    students: &[Student],
    classes: &[ClassGroup],
) -> Vec<Violation> {
    let mut violations = Vec::new();
    for (c, class_members) in members.iter().enumerate() {
        let mut by_code: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for &s in class_members {
            let code = students[s].antinomy.as_str();
            if !code.is_empty() {
                by_code.entry(code).or_default().push(s);
            }
        }
        for (code, carriers) in by_code {
            if carriers.len() > 1 {
                violations.push(Violation {
                    class_name: classes[c].name.clone(),
                    code: String::from(code),
                    count: carriers.len(),
                    students: carriers
                        .iter()
                        .map(|&s| students[s].display_name())
                        .collect(),
                });
            }
        }
    }
    violations
}

/// Headcounts and histograms of a single class
#[derive(Clone, Debug, Serialize)]
pub struct ClassAudit {
    pub name: String,
    pub total: usize,
    pub num_f: usize,
    pub num_m: usize,
    pub lv2_counts: BTreeMap<String, usize>,
    pub opt_counts: BTreeMap<String, usize>,
    pub num_fixed: usize,
    pub num_movable: usize,
}

/// A student placed in a class that does not offer their elective
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OfferingViolation {
    pub class_name: String,
    pub student: String,
    pub code: String,
}

/// Realized seat count vs. the quota of an offered code
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct QuotaDeviation {
    pub class_name: String,
    pub code: String,
    pub expected: u32,
    pub realized: usize,
    /// realized - expected
    pub deviation: i64,
}

/// The complete audit of an assignment
#[derive(Clone, Debug, Serialize)]
pub struct AuditReport {
    pub classes: Vec<ClassAudit>,
    pub lv2_violations: Vec<OfferingViolation>,
    pub opt_violations: Vec<OfferingViolation>,
    pub quota_deviations: Vec<QuotaDeviation>,
}

/// Tally an assignment class by class: totals, gender split, elective histograms, mobility
/// split, offering violations and the deviation of every offered quota.
pub fn audit(
    assignment: &Assignment,
    students: &[Student],
    classes: &[ClassGroup],
    offerings: &Offerings,
) -> AuditReport {
    let mut members: Vec<Vec<usize>> = vec![Vec::new(); classes.len()];
    for (s, &c) in assignment.iter().enumerate() {
        members[c].push(s);
    }

    let mut class_audits = Vec::with_capacity(classes.len());
    let mut lv2_violations = Vec::new();
    let mut opt_violations = Vec::new();
    let mut quota_deviations = Vec::new();

    for (c, class) in classes.iter().enumerate() {
        let mut class_audit = ClassAudit {
            name: class.name.clone(),
            total: members[c].len(),
            num_f: 0,
            num_m: 0,
            lv2_counts: BTreeMap::new(),
            opt_counts: BTreeMap::new(),
            num_fixed: 0,
            num_movable: 0,
        };
        for &s in &members[c] {
            let student = &students[s];
            match student.gender {
                Gender::F => class_audit.num_f += 1,
                Gender::M => class_audit.num_m += 1,
                Gender::Unknown => {}
            }
            if student.fixed {
                class_audit.num_fixed += 1;
            } else {
                class_audit.num_movable += 1;
            }
            if !student.lv2.is_empty() {
                *class_audit.lv2_counts.entry(student.lv2.clone()).or_default() += 1;
                if is_known_lv2(&student.lv2) && !offerings.offers_lv2(c, &student.lv2) {
                    lv2_violations.push(OfferingViolation {
                        class_name: class.name.clone(),
                        student: student.display_name(),
                        code: student.lv2.clone(),
                    });
                }
            }
            if !student.opt.is_empty() {
                *class_audit.opt_counts.entry(student.opt.clone()).or_default() += 1;
                if is_known_opt(&student.opt) && !offerings.offers_opt(c, &student.opt) {
                    opt_violations.push(OfferingViolation {
                        class_name: class.name.clone(),
                        student: student.display_name(),
                        code: student.opt.clone(),
                    });
                }
            }
        }

        for (code, expected) in offerings.lv2_codes(c).chain(offerings.opt_codes(c)) {
            let realized = class_audit
                .lv2_counts
                .get(code)
                .or_else(|| class_audit.opt_counts.get(code))
                .copied()
                .unwrap_or(0);
            quota_deviations.push(QuotaDeviation {
                class_name: class.name.clone(),
                code: String::from(code),
                expected,
                realized,
                deviation: realized as i64 - expected as i64,
            });
        }

        class_audits.push(class_audit);
    }

    AuditReport {
        classes: class_audits,
        lv2_violations,
        opt_violations,
        quota_deviations,
    }
}

impl fmt::Display for AuditReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut result = String::new();
        for class in &self.classes {
            write!(
                result,
                "{}: {} students ({} F / {} M), {} fixed",
                class.name, class.total, class.num_f, class.num_m, class.num_fixed
            )?;
            if !class.lv2_counts.is_empty() {
                let hist: Vec<String> = class
                    .lv2_counts
                    .iter()
                    .map(|(code, n)| format!("{} {}", n, code))
                    .collect();
                write!(result, ", LV2: {}", hist.join(" / "))?;
            }
            if !class.opt_counts.is_empty() {
                let hist: Vec<String> = class
                    .opt_counts
                    .iter()
                    .map(|(code, n)| format!("{} {}", n, code))
                    .collect();
                write!(result, ", OPT: {}", hist.join(" / "))?;
            }
            writeln!(result)?;
        }
        for v in self.lv2_violations.iter().chain(&self.opt_violations) {
            writeln!(
                result,
                "!! {} is in {}, which does not offer {}",
                v.student, v.class_name, v.code
            )?;
        }
        for d in &self.quota_deviations {
            if d.deviation != 0 {
                writeln!(
                    result,
                    "   {} {}: {} seats filled of {} expected",
                    d.class_name, d.code, d.realized, d.expected
                )?;
            }
        }
        write!(f, "{}", result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::offerings::Offerings;
    use std::collections::BTreeMap;

    fn student(id: usize, gender: Gender, lv2: &str, opt: &str, antinomy: &str) -> Student {
        Student {
            index: id,
            id: format!("s{}", id),
            last_name: format!("Student{}", id),
            first_name: String::from("Test"),
            gender,
            com: 2.5,
            tra: 2.5,
            part: 2.5,
            abs: 2.5,
            lv2: String::from(lv2),
            opt: String::from(opt),
            affinity: String::new(),
            antinomy: String::from(antinomy),
            fixed: false,
        }
    }

    fn class(name: &str, lv2: &[(&str, u32)]) -> ClassGroup {
        ClassGroup {
            index: 0,
            name: String::from(name),
            target: 2,
            lv2_quotas: lv2
                .iter()
                .map(|(c, q)| (String::from(*c), *q))
                .collect::<BTreeMap<_, _>>(),
            opt_quotas: BTreeMap::new(),
            members: Vec::new(),
        }
    }

    #[test]
    fn duplicated_antinomy_codes_are_reported() {
        let students = vec![
            student(0, Gender::F, "", "", "D1"),
            student(1, Gender::M, "", "", "D1"),
            student(2, Gender::M, "", "", ""),
        ];
        let classes = vec![class("6A", &[]), class("6B", &[])];
        let members = vec![vec![0, 1], vec![2]];
        let violations = check_antinomies(&members, &students, &classes);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].class_name, "6A");
        assert_eq!(violations[0].code, "D1");
        assert_eq!(violations[0].count, 2);
        assert_eq!(
            violations[0].students,
            vec!["Test Student0", "Test Student1"]
        );
    }

    #[test]
    fn disjoint_codes_are_fine() {
        let students = vec![
            student(0, Gender::F, "", "", "D1"),
            student(1, Gender::M, "", "", "D2"),
        ];
        let classes = vec![class("6A", &[])];
        let members = vec![vec![0, 1]];
        assert!(check_antinomies(&members, &students, &classes).is_empty());
    }

    #[test]
    fn audit_tallies_classes_and_quota_deviations() {
        let students = vec![
            student(0, Gender::F, "ESP", "", ""),
            student(1, Gender::M, "ITA", "", ""),
            student(2, Gender::F, "ESP", "", ""),
        ];
        let classes = vec![
            class("6A", &[("ESP", 1), ("ITA", 1)]),
            class("6B", &[("ESP", 2)]),
        ];
        let offerings = Offerings::build(&classes);
        let assignment = vec![0, 1, 1];
        let report = audit(&assignment, &students, &classes, &offerings);

        assert_eq!(report.classes[0].total, 1);
        assert_eq!(report.classes[0].num_f, 1);
        assert_eq!(report.classes[1].total, 2);
        assert_eq!(report.classes[1].lv2_counts["ITA"], 1);

        // The ITA student ended up in 6B, which does not offer ITA
        assert_eq!(report.lv2_violations.len(), 1);
        assert_eq!(report.lv2_violations[0].class_name, "6B");
        assert_eq!(report.lv2_violations[0].code, "ITA");

        // 6A expected one ESP seat and one ITA seat, both empty; 6B realized 1 of 2 ESP seats
        let deviation = |class_name: &str, code: &str| {
            report
                .quota_deviations
                .iter()
                .find(|d| d.class_name == class_name && d.code == code)
                .unwrap()
                .deviation
        };
        assert_eq!(deviation("6A", "ESP"), 0);
        assert_eq!(deviation("6A", "ITA"), -1);
        assert_eq!(deviation("6B", "ESP"), -1);
    }
}
