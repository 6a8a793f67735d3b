use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub const UNKNOWN_TEACHER: &str = "Unknown Teacher";

/// Subjects offered by one class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassSubjects {
    pub class_name: String,
    pub subjects: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherAssignment {
    pub assignment_id: String,
    pub teacher: String,
    pub class_name: String,
    pub subjects: Vec<String>,
}

/// One teacher's classes, as listed on the assignment report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherLoad {
    pub teacher: String,
    pub classes: Vec<ClassSubjects>,
}

/// Trims, drops blanks and removes repeats, keeping first-seen order.
pub fn normalize_subjects<S: AsRef<str>>(raw: &[S]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    raw.iter()
        .map(|s| s.as_ref().trim())
        .filter(|s| !s.is_empty())
        .filter(|s| seen.insert(s.to_string()))
        .map(str::to_string)
        .collect()
}

/// Subjects in `requested` that the class catalog does not offer.
pub fn subjects_outside_catalog(catalog: &ClassSubjects, requested: &[String]) -> Vec<String> {
    requested
        .iter()
        .filter(|s| !catalog.subjects.iter().any(|c| c == *s))
        .cloned()
        .collect()
}

/// Groups assignments by teacher, teachers and their classes sorted by name.
///
/// `search` keeps a teacher when it matches the teacher's name or any of
/// their class names, case-insensitively. All of a kept teacher's classes
/// are listed.
pub fn group_by_teacher(assignments: &[TeacherAssignment], search: Option<&str>) -> Vec<TeacherLoad> {
    let mut grouped: BTreeMap<String, Vec<ClassSubjects>> = BTreeMap::new();
    for a in assignments {
        let teacher = match a.teacher.trim() {
            "" => UNKNOWN_TEACHER,
            t => t,
        };
        grouped.entry(teacher.to_string()).or_default().push(ClassSubjects {
            class_name: a.class_name.clone(),
            subjects: a.subjects.clone(),
        });
    }

    let needle = search
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(str::to_lowercase);

    grouped
        .into_iter()
        .filter(|(teacher, classes)| match &needle {
            None => true,
            Some(q) => {
                teacher.to_lowercase().contains(q)
                    || classes.iter().any(|c| c.class_name.to_lowercase().contains(q))
            }
        })
        .map(|(teacher, mut classes)| {
            classes.sort_by(|a, b| a.class_name.cmp(&b.class_name));
            TeacherLoad { teacher, classes }
        })
        .collect()
}
