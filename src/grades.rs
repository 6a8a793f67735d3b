use crate::calc::{self, competition_rank, ParseLabelError, Rank};
use crate::roster::Pupil;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

/// Weight of one subject in the default percentage denominator.
pub const MAX_SCORE_PER_SUBJECT: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Term {
    First,
    Second,
    Third,
}

impl Term {
    pub fn number(self) -> u8 {
        match self {
            Term::First => 1,
            Term::Second => 2,
            Term::Third => 3,
        }
    }

    pub fn from_number(n: i64) -> Option<Term> {
        match n {
            1 => Some(Term::First),
            2 => Some(Term::Second),
            3 => Some(Term::Third),
            _ => None,
        }
    }

    /// The two test slots whose mean makes up a subject's term result.
    pub fn tests(self) -> [TestSlot; 2] {
        [
            TestSlot::new(self, Sitting::First),
            TestSlot::new(self, Sitting::Second),
        ]
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Term {}", self.number())
    }
}

impl FromStr for Term {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = s.trim();
        let digits = match t.get(..4) {
            Some(head) if head.eq_ignore_ascii_case("term") => t[4..].trim(),
            _ => t,
        };
        digits
            .parse::<i64>()
            .ok()
            .and_then(Term::from_number)
            .ok_or_else(|| ParseLabelError::Term(s.to_string()))
    }
}

impl TryFrom<String> for Term {
    type Error = ParseLabelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Term> for String {
    fn from(value: Term) -> Self {
        value.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Sitting {
    First,
    Second,
}

/// One of the six test slots of an academic year (`"Term 2 T1"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TestSlot {
    pub term: Term,
    pub sitting: Sitting,
}

impl TestSlot {
    pub const COUNT: usize = 6;

    pub fn new(term: Term, sitting: Sitting) -> Self {
        Self { term, sitting }
    }

    fn index(self) -> usize {
        let base = (self.term.number() as usize - 1) * 2;
        match self.sitting {
            Sitting::First => base,
            Sitting::Second => base + 1,
        }
    }

    /// Older report pages number the slots `"Test 1"` .. `"Test 6"`.
    fn from_sequence(n: i64) -> Option<TestSlot> {
        if !(1..=Self::COUNT as i64).contains(&n) {
            return None;
        }
        let term = Term::from_number((n + 1) / 2)?;
        let sitting = if n % 2 == 1 {
            Sitting::First
        } else {
            Sitting::Second
        };
        Some(TestSlot::new(term, sitting))
    }
}

impl fmt::Display for TestSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sitting = match self.sitting {
            Sitting::First => "T1",
            Sitting::Second => "T2",
        };
        write!(f, "{} {}", self.term, sitting)
    }
}

impl FromStr for TestSlot {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || ParseLabelError::TestSlot(s.to_string());
        let parts: Vec<&str> = s.split_whitespace().collect();
        match parts.as_slice() {
            [word, n, sitting] if word.eq_ignore_ascii_case("term") => {
                let term = n
                    .parse::<i64>()
                    .ok()
                    .and_then(Term::from_number)
                    .ok_or_else(bad)?;
                let sitting = if sitting.eq_ignore_ascii_case("t1") {
                    Sitting::First
                } else if sitting.eq_ignore_ascii_case("t2") {
                    Sitting::Second
                } else {
                    return Err(bad());
                };
                Ok(TestSlot::new(term, sitting))
            }
            [word, n] if word.eq_ignore_ascii_case("test") => n
                .parse::<i64>()
                .ok()
                .and_then(TestSlot::from_sequence)
                .ok_or_else(bad),
            _ => Err(bad()),
        }
    }
}

impl TryFrom<String> for TestSlot {
    type Error = ParseLabelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TestSlot> for String {
    fn from(value: TestSlot) -> Self {
        value.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreRecord {
    pub pupil_id: String,
    pub subject: String,
    pub test: TestSlot,
    pub grade: f64,
    pub class_name: String,
    pub academic_year: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SubjectKey {
    pupil_id: String,
    subject: String,
}

impl SubjectKey {
    fn new(pupil_id: &str, subject: &str) -> Self {
        Self {
            pupil_id: pupil_id.to_string(),
            subject: subject.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct SlotScores([Option<f64>; TestSlot::COUNT]);

/// Indexed snapshot of every score recorded for one class and year.
#[derive(Debug, Clone, Default)]
pub struct Cohort {
    scores: HashMap<SubjectKey, SlotScores>,
    subjects_by_pupil: BTreeMap<String, BTreeSet<String>>,
    subjects: BTreeSet<String>,
}

impl Cohort {
    /// The first record seen for a (pupil, subject, test) wins.
    pub fn from_scores(records: &[ScoreRecord]) -> Self {
        let mut cohort = Cohort::default();
        for r in records {
            let slots = cohort
                .scores
                .entry(SubjectKey::new(&r.pupil_id, &r.subject))
                .or_default();
            let cell = &mut slots.0[r.test.index()];
            if cell.is_none() {
                *cell = Some(r.grade);
            }
            cohort
                .subjects_by_pupil
                .entry(r.pupil_id.clone())
                .or_default()
                .insert(r.subject.clone());
            cohort.subjects.insert(r.subject.clone());
        }
        cohort
    }

    pub fn pupils(&self) -> impl Iterator<Item = &str> {
        self.subjects_by_pupil.keys().map(String::as_str)
    }

    pub fn subjects(&self) -> impl Iterator<Item = &str> {
        self.subjects.iter().map(String::as_str)
    }

    pub fn subjects_of<'a>(&'a self, pupil_id: &str) -> impl Iterator<Item = &'a str> {
        self.subjects_by_pupil
            .get(pupil_id)
            .into_iter()
            .flatten()
            .map(String::as_str)
    }

    pub fn score(&self, pupil_id: &str, subject: &str, test: TestSlot) -> Option<f64> {
        self.scores
            .get(&SubjectKey::new(pupil_id, subject))
            .and_then(|s| s.0[test.index()])
    }

    pub fn term_scores(&self, pupil_id: &str, subject: &str, term: Term) -> (Option<f64>, Option<f64>) {
        let [t1, t2] = term.tests();
        (
            self.score(pupil_id, subject, t1),
            self.score(pupil_id, subject, t2),
        )
    }

    /// Unrounded mean of the two term tests, absent tests counting as 0.
    pub fn raw_mean(&self, pupil_id: &str, subject: &str, term: Term) -> f64 {
        let (t1, t2) = self.term_scores(pupil_id, subject, term);
        (calc::score_or_zero(t1) + calc::score_or_zero(t2)) / 2.0
    }

    /// Every cohort pupil is ranked in every cohort subject, including
    /// subjects they have no record for.
    pub fn subject_rankings(&self, term: Term) -> SubjectRankings {
        let mut out = SubjectRankings::new();
        for subject in self.subjects() {
            let entries = self
                .pupils()
                .map(|p| (p.to_string(), self.raw_mean(p, subject, term)))
                .collect();
            let ranked = competition_rank(entries)
                .into_iter()
                .map(|e| RankedPupil {
                    pupil_id: e.key,
                    mean: e.value,
                    rank: e.rank,
                })
                .collect();
            out.insert(subject.to_string(), ranked);
        }
        out
    }

    /// Sum of raw means over the subjects each pupil has records for.
    pub fn overall_totals(&self, term: Term) -> Vec<(String, f64)> {
        self.subjects_by_pupil
            .iter()
            .map(|(pupil, subjects)| {
                let total = subjects
                    .iter()
                    .map(|s| self.raw_mean(pupil, s, term))
                    .sum::<f64>();
                (pupil.clone(), total)
            })
            .collect()
    }

    pub fn overall_ranks(&self, term: Term) -> HashMap<String, u32> {
        competition_rank(self.overall_totals(term))
            .into_iter()
            .map(|e| (e.key, e.rank))
            .collect()
    }

    fn pupil_report(
        &self,
        target: &str,
        term: Term,
        subject_percentage_total: Option<f64>,
        rankings: &SubjectRankings,
        overall: &HashMap<String, u32>,
    ) -> PupilReport {
        let mut total_raw_sum = 0.0_f64;
        let mut subjects = Vec::new();
        for subject in self.subjects_of(target) {
            let (t1, t2) = self.term_scores(target, subject, term);
            let test1_score = calc::score_or_zero(t1);
            let test2_score = calc::score_or_zero(t2);
            let raw_mean = (test1_score + test2_score) / 2.0;
            total_raw_sum += raw_mean;
            subjects.push(SubjectResult {
                subject: subject.to_string(),
                test1_score,
                test2_score,
                raw_mean,
                mean: calc::round_half_up(raw_mean) as i64,
                subject_rank: rank_in(rankings, subject, target),
            });
        }

        let denominator = subject_percentage_total
            .unwrap_or(subjects.len() as f64 * MAX_SCORE_PER_SUBJECT);
        let overall_percentage =
            calc::round_off_1_decimal(calc::percentage_of(total_raw_sum, denominator));
        let overall_rank = overall
            .get(target)
            .copied()
            .map(Rank::Position)
            .unwrap_or(Rank::Absent);

        PupilReport {
            pupil_id: target.to_string(),
            term,
            subjects,
            total_raw_sum,
            total_marks: calc::round_half_up(total_raw_sum) as i64,
            overall_percentage,
            overall_rank,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedPupil {
    pub pupil_id: String,
    pub mean: f64,
    pub rank: u32,
}

pub type SubjectRankings = BTreeMap<String, Vec<RankedPupil>>;

pub fn rank_in(rankings: &SubjectRankings, subject: &str, pupil_id: &str) -> Rank {
    rankings
        .get(subject)
        .and_then(|ranked| ranked.iter().find(|r| r.pupil_id == pupil_id))
        .map(|r| Rank::Position(r.rank))
        .unwrap_or(Rank::Absent)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectResult {
    pub subject: String,
    pub test1_score: f64,
    pub test2_score: f64,
    pub raw_mean: f64,
    pub mean: i64,
    pub subject_rank: Rank,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PupilReport {
    pub pupil_id: String,
    pub term: Term,
    pub subjects: Vec<SubjectResult>,
    pub total_raw_sum: f64,
    pub total_marks: i64,
    pub overall_percentage: f64,
    pub overall_rank: Rank,
}

pub fn compute_subject_rankings(class_scores: &[ScoreRecord], term: Term) -> SubjectRankings {
    Cohort::from_scores(class_scores).subject_rankings(term)
}

/// Term report card for one pupil, ranked against the whole cohort.
///
/// The percentage denominator is `subject_percentage_total` when the class
/// configures one, otherwise 100 per subject the pupil has records for.
pub fn build_pupil_report(
    target_pupil_id: &str,
    class_scores: &[ScoreRecord],
    term: Term,
    subject_percentage_total: Option<f64>,
) -> PupilReport {
    let cohort = Cohort::from_scores(class_scores);
    let rankings = cohort.subject_rankings(term);
    let overall = cohort.overall_ranks(term);
    cohort.pupil_report(
        target_pupil_id,
        term,
        subject_percentage_total,
        &rankings,
        &overall,
    )
}

/// Report cards for every ranked pupil, best overall position first.
pub fn build_class_reports(
    class_scores: &[ScoreRecord],
    term: Term,
    subject_percentage_total: Option<f64>,
) -> Vec<PupilReport> {
    let cohort = Cohort::from_scores(class_scores);
    let rankings = cohort.subject_rankings(term);
    let overall = cohort.overall_ranks(term);
    let mut reports: Vec<PupilReport> = cohort
        .pupils()
        .map(|p| cohort.pupil_report(p, term, subject_percentage_total, &rankings, &overall))
        .collect();
    reports.sort_by(|a, b| {
        a.overall_rank
            .cmp_for_listing(b.overall_rank)
            .then_with(|| a.pupil_id.cmp(&b.pupil_id))
    });
    reports
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSheetRow {
    pub pupil_id: String,
    pub name: String,
    pub grades: BTreeMap<String, f64>,
    pub total: f64,
    pub percentage: f64,
    pub rank: Rank,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSheet {
    pub test: TestSlot,
    pub subjects: Vec<String>,
    pub denominator: f64,
    pub rows: Vec<TestSheetRow>,
}

/// Grade-entry sheet for a single test slot across a class roster.
///
/// Subjects are those with at least one grade in this test. Rows follow the
/// roster sorted by name; pupils with a zero total are shown as `N/A`.
pub fn build_test_sheet(
    roster: &[Pupil],
    class_scores: &[ScoreRecord],
    test: TestSlot,
    subject_percentage_total: Option<f64>,
) -> TestSheet {
    let in_test: Vec<&ScoreRecord> = class_scores.iter().filter(|r| r.test == test).collect();
    let subjects: BTreeSet<&str> = in_test.iter().map(|r| r.subject.as_str()).collect();
    let denominator = subject_percentage_total
        .unwrap_or(subjects.len() as f64 * MAX_SCORE_PER_SUBJECT);

    let mut grades_by_pupil: HashMap<&str, BTreeMap<String, f64>> = HashMap::new();
    for r in &in_test {
        grades_by_pupil
            .entry(r.pupil_id.as_str())
            .or_default()
            .entry(r.subject.clone())
            .or_insert(r.grade);
    }

    let mut pupils: Vec<&Pupil> = roster.iter().collect();
    pupils.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.student_id.cmp(&b.student_id)));

    let mut rows: Vec<TestSheetRow> = pupils
        .iter()
        .map(|p| {
            let grades = grades_by_pupil
                .get(p.student_id.as_str())
                .cloned()
                .unwrap_or_default();
            let total: f64 = grades.values().sum();
            TestSheetRow {
                pupil_id: p.student_id.clone(),
                name: p.name.clone(),
                grades,
                total,
                percentage: calc::percentage_of(total, denominator),
                rank: Rank::Absent,
            }
        })
        .collect();

    let ranks: HashMap<String, u32> = competition_rank(
        rows.iter()
            .map(|r| (r.pupil_id.clone(), r.percentage))
            .collect(),
    )
    .into_iter()
    .map(|e| (e.key, e.rank))
    .collect();
    for row in &mut rows {
        row.rank = if row.total == 0.0 {
            Rank::NotApplicable
        } else {
            ranks
                .get(&row.pupil_id)
                .copied()
                .map(Rank::Position)
                .unwrap_or(Rank::Absent)
        };
        row.percentage = calc::round_off_1_decimal(row.percentage);
    }

    TestSheet {
        test,
        subjects: subjects.into_iter().map(str::to_string).collect(),
        denominator,
        rows,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradingPolicy {
    pub max_score: f64,
    pub pass_mark: f64,
    pub distinction_mark: f64,
}

impl Default for GradingPolicy {
    fn default() -> Self {
        Self {
            max_score: 100.0,
            pass_mark: 50.0,
            distinction_mark: 70.0,
        }
    }
}

impl GradingPolicy {
    pub fn accepts(&self, grade: f64) -> bool {
        grade.is_finite() && grade >= 0.0 && grade <= self.max_score
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GradeBand {
    Distinction,
    Pass,
    Fail,
}

pub fn grade_band(mean: f64, policy: &GradingPolicy) -> GradeBand {
    if mean >= policy.distinction_mark {
        GradeBand::Distinction
    } else if mean >= policy.pass_mark {
        GradeBand::Pass
    } else {
        GradeBand::Fail
    }
}
