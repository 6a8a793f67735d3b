use crate::calc::ParseLabelError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub fn as_str(self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Other => "other",
        }
    }
}

impl FromStr for Gender {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "male" | "m" => Ok(Gender::Male),
            "female" | "f" => Ok(Gender::Female),
            "other" => Ok(Gender::Other),
            _ => Err(ParseLabelError::Gender(s.to_string())),
        }
    }
}

/// A registered pupil for one academic year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pupil {
    pub student_id: String,
    pub name: String,
    pub class_name: String,
    pub academic_year: String,
    pub gender: Option<Gender>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenderBreakdown {
    pub male: usize,
    pub female: usize,
    pub other: usize,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassCount {
    pub class_name: String,
    pub pupils: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterSummary {
    pub per_class: Vec<ClassCount>,
    pub genders: GenderBreakdown,
}

pub fn summarize(pupils: &[Pupil]) -> RosterSummary {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    let mut genders = GenderBreakdown::default();
    for p in pupils {
        *counts.entry(p.class_name.trim()).or_insert(0) += 1;
        match p.gender {
            Some(Gender::Male) => genders.male += 1,
            Some(Gender::Female) => genders.female += 1,
            Some(Gender::Other) | None => genders.other += 1,
        }
        genders.total += 1;
    }
    RosterSummary {
        per_class: counts
            .into_iter()
            .map(|(class_name, pupils)| ClassCount {
                class_name: class_name.to_string(),
                pupils,
            })
            .collect(),
        genders,
    }
}
