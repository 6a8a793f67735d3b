use crate::calc::ParseLabelError;
use crate::roster::Pupil;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeScheduleRecord {
    pub class_name: String,
    pub academic_year: String,
    pub total_amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub receipt_id: String,
    pub student_id: String,
    pub amount: f64,
    pub academic_year: String,
    pub class_name: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeeState {
    Paid,
    Owing,
}

impl FeeState {
    /// Overpaid balances (negative outstanding) count as paid.
    pub fn for_outstanding(outstanding: f64) -> Self {
        if outstanding <= 0.0 {
            FeeState::Paid
        } else {
            FeeState::Owing
        }
    }
}

impl FromStr for FeeState {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "paid" => Ok(FeeState::Paid),
            "owing" => Ok(FeeState::Owing),
            _ => Err(ParseLabelError::FeeState(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeStatus {
    pub student_id: String,
    pub name: String,
    pub class_name: String,
    pub total_fee: f64,
    pub total_paid: f64,
    pub outstanding: f64,
    pub status: FeeState,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ScheduleKey {
    class_name: String,
    academic_year: String,
}

impl ScheduleKey {
    fn new(class_name: &str, academic_year: &str) -> Self {
        Self {
            class_name: class_name.trim().to_string(),
            academic_year: academic_year.trim().to_string(),
        }
    }
}

/// Fee lookup by exact (trimmed) class and year. The first record for a
/// pair wins.
#[derive(Debug, Clone, Default)]
pub struct FeeSchedule {
    amounts: HashMap<ScheduleKey, f64>,
}

impl FeeSchedule {
    pub fn new(records: &[FeeScheduleRecord]) -> Self {
        let mut amounts = HashMap::new();
        for r in records {
            amounts
                .entry(ScheduleKey::new(&r.class_name, &r.academic_year))
                .or_insert(r.total_amount);
        }
        Self { amounts }
    }

    pub fn lookup(&self, class_name: &str, academic_year: &str) -> Option<f64> {
        self.amounts
            .get(&ScheduleKey::new(class_name, academic_year))
            .copied()
    }

    /// A class with no schedule entry owes nothing.
    pub fn fee_for(&self, class_name: &str, academic_year: &str) -> f64 {
        self.lookup(class_name, academic_year).unwrap_or(0.0)
    }
}

/// Per-pupil fee position for a roster.
///
/// Receipts are summed per student; receipts for students outside the
/// roster are dropped. Every pupil appears, including those with no
/// receipts. Output follows roster order.
pub fn reconcile(
    pupils: &[Pupil],
    fee_schedule: &[FeeScheduleRecord],
    receipts: &[Receipt],
) -> Vec<FeeStatus> {
    let schedule = FeeSchedule::new(fee_schedule);

    let mut paid_by_student: HashMap<&str, f64> = HashMap::new();
    for r in receipts {
        *paid_by_student.entry(r.student_id.as_str()).or_insert(0.0) += r.amount;
    }

    let statuses: Vec<FeeStatus> = pupils
        .iter()
        .map(|p| {
            let total_fee = schedule.fee_for(&p.class_name, &p.academic_year);
            let total_paid = paid_by_student
                .get(p.student_id.as_str())
                .copied()
                .unwrap_or(0.0);
            let outstanding = total_fee - total_paid;
            FeeStatus {
                student_id: p.student_id.clone(),
                name: p.name.clone(),
                class_name: p.class_name.trim().to_string(),
                total_fee,
                total_paid,
                outstanding,
                status: FeeState::for_outstanding(outstanding),
            }
        })
        .collect();

    let roster_ids: HashSet<&str> = pupils.iter().map(|p| p.student_id.as_str()).collect();
    let dangling = paid_by_student
        .keys()
        .filter(|id| !roster_ids.contains(*id))
        .count();
    if dangling > 0 {
        tracing::debug!(dangling, "receipts without a matching pupil ignored");
    }

    statuses
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeTotals {
    pub total_expected: f64,
    pub total_collected: f64,
    pub total_outstanding: f64,
    pub paid_count: usize,
    pub owing_count: usize,
}

pub fn summarize(statuses: &[FeeStatus]) -> FeeTotals {
    statuses.iter().fold(FeeTotals::default(), |mut acc, s| {
        acc.total_expected += s.total_fee;
        acc.total_collected += s.total_paid;
        acc.total_outstanding += s.outstanding;
        match s.status {
            FeeState::Paid => acc.paid_count += 1,
            FeeState::Owing => acc.owing_count += 1,
        }
        acc
    })
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeeFilter {
    pub class_name: Option<String>,
    pub status: Option<FeeState>,
    pub search: Option<String>,
}

impl FeeFilter {
    pub fn matches(&self, s: &FeeStatus) -> bool {
        let class_ok = self
            .class_name
            .as_deref()
            .map(|c| c.trim() == s.class_name)
            .unwrap_or(true);
        let status_ok = self.status.map(|st| st == s.status).unwrap_or(true);
        let search_ok = self
            .search
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(|q| {
                let q = q.to_lowercase();
                s.name.to_lowercase().contains(&q) || s.student_id.to_lowercase().contains(&q)
            })
            .unwrap_or(true);
        class_ok && status_ok && search_ok
    }
}

pub fn filter_statuses(statuses: Vec<FeeStatus>, filter: &FeeFilter) -> Vec<FeeStatus> {
    statuses.into_iter().filter(|s| filter.matches(s)).collect()
}

/// Pupils who still owe, largest balance first.
pub fn debtors(statuses: &[FeeStatus]) -> Vec<FeeStatus> {
    let mut out: Vec<FeeStatus> = statuses
        .iter()
        .filter(|s| s.outstanding > 0.0)
        .cloned()
        .collect();
    out.sort_by(|a, b| {
        b.outstanding
            .partial_cmp(&a.outstanding)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.student_id.cmp(&b.student_id))
    });
    out
}
