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

pub mod simple;

use super::{Assignment, ClassGroup, Gender, Student};
use std::fmt::Write;

/// Format a calculated class assignment into a human readable String (e.g. to print it to
/// stdout).
///
/// The output format will look like
/// ```text
/// ===== 6A =====
/// (4 students, 2 F / 2 M)
/// - Anna Artisan (head)
/// - Bruno Beispiel
/// - Carla Clown (fixed)
/// …
/// ```
pub fn format_assignment(
    assignment: &Assignment,
    classes: &[ClassGroup],
    students: &[Student],
) -> String {
    let mut result = String::new();
    for class in classes.iter() {
        write!(result, "\n===== {} =====\n", class.name).unwrap();
        let assigned: Vec<&Student> = assignment
            .iter()
            .enumerate()
            .filter(|(_, class_index)| **class_index == class.index)
            .map(|(student_index, _)| &students[student_index])
            .collect();
        let num_f = assigned.iter().filter(|s| s.gender == Gender::F).count();
        let num_m = assigned.iter().filter(|s| s.gender == Gender::M).count();
        writeln!(
            result,
            "({} students, {} F / {} M)",
            assigned.len(),
            num_f,
            num_m
        )
        .unwrap();

        for student in assigned {
            let mut markers = Vec::new();
            if student.is_head() {
                markers.push("head");
            }
            if student.is_low_tier() {
                markers.push("low");
            }
            if student.fixed {
                markers.push("fixed");
            }
            writeln!(
                result,
                "- {}{}",
                student.display_name(),
                if markers.is_empty() {
                    String::new()
                } else {
                    format!(" ({})", markers.join(", "))
                }
            )
            .unwrap();
        }
    }

    result
}

pub fn debug_list_of_classes(classes: &[ClassGroup]) -> String {
    classes
        .iter()
        .map(|c| format!("{:02} {} (target {})", c.index, c.name, c.target))
        .collect::<Vec<String>>()
        .join("\n")
}

/// Assert that a given students/classes data structure is consistent (in terms of objects'
/// indexes, membership cross references and class parameters)
pub fn assert_data_consistency(students: &[Student], classes: &[ClassGroup]) {
    let mut ids = std::collections::BTreeSet::new();
    for (i, s) in students.iter().enumerate() {
        assert_eq!(i, s.index, "Index of {}. student is {}", i, s.index);
        assert!(ids.insert(&s.id), "Student id {} is not unique", s.id);
    }
    let mut membership_count = vec![0usize; students.len()];
    for (i, c) in classes.iter().enumerate() {
        assert_eq!(i, c.index, "Index of {}. class is {}", i, c.index);
        assert!(c.target > 0, "Target of class {} must be positive", c.name);
        for &member in c.members.iter() {
            assert!(
                member < students.len(),
                "Member {} of class {} is invalid",
                member,
                c.name
            );
            membership_count[member] += 1;
        }
    }
    for (s, count) in membership_count.iter().enumerate() {
        assert_eq!(
            *count, 1,
            "Student {} is assigned to {} classes instead of exactly one",
            s, count
        );
    }
}
