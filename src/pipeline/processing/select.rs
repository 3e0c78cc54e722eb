use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::TrialRecord;
use crate::error::ConfigError;

static TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\s*(\(|\)|==|!=|>=|<=|>|<|"[^"]*"|'[^']*'|[A-Za-z_][A-Za-z0-9_]*|\d+)"#)
        .expect("valid token regex")
});

/// Boolean record attributes a predicate can test
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFlag {
    HasOutcome,
    HasEnrollment,
    IsComplete,
    IsLargeTrial,
    HasResultsData,
    HasDetail,
}

impl RecordFlag {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "hasOutcome" | "has_outcome" => Some(RecordFlag::HasOutcome),
            "hasEnrollment" | "has_enrollment" => Some(RecordFlag::HasEnrollment),
            "isComplete" | "is_complete" => Some(RecordFlag::IsComplete),
            "isLargeTrial" | "is_large_trial" => Some(RecordFlag::IsLargeTrial),
            "hasResultsData" | "has_results_data" | "hasResults" | "has_results" => {
                Some(RecordFlag::HasResultsData)
            }
            "hasDetail" | "has_detail" => Some(RecordFlag::HasDetail),
            _ => None,
        }
    }

    fn test(&self, record: &TrialRecord) -> bool {
        let q = &record.quality;
        match self {
            RecordFlag::HasOutcome => q.has_outcome,
            RecordFlag::HasEnrollment => q.has_enrollment,
            RecordFlag::IsComplete => q.is_complete,
            RecordFlag::IsLargeTrial => q.is_large_trial,
            RecordFlag::HasResultsData => q.has_results_data,
            RecordFlag::HasDetail => record.detail.is_some(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl Comparison {
    fn from_token(token: &str) -> Option<Self> {
        match token {
            "==" => Some(Comparison::Eq),
            "!=" => Some(Comparison::Ne),
            ">" => Some(Comparison::Gt),
            ">=" => Some(Comparison::Ge),
            "<" => Some(Comparison::Lt),
            "<=" => Some(Comparison::Le),
            _ => None,
        }
    }

    fn apply<T: Ord>(&self, left: T, right: T) -> bool {
        match self {
            Comparison::Eq => left == right,
            Comparison::Ne => left != right,
            Comparison::Gt => left > right,
            Comparison::Ge => left >= right,
            Comparison::Lt => left < right,
            Comparison::Le => left <= right,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextField {
    Phase,
    OverallStatus,
}

/// Record filter parsed from expressions such as
/// `hasOutcome AND enrollmentCount > 100` or `hasResultsData == true`.
///
/// Grammar: `OR` binds looser than `AND`, `NOT` prefixes a term, parentheses
/// group. Text fields compare case-insensitively against quoted strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    Always,
    Flag(RecordFlag),
    Enrollment(Comparison, u64),
    Text {
        field: TextField,
        value: String,
        equal: bool,
    },
    Not(Box<Predicate>),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

impl Predicate {
    pub fn parse(expression: &str) -> Result<Self, ConfigError> {
        let tokens = tokenize(expression)?;
        if tokens.is_empty() {
            return Ok(Predicate::Always);
        }
        let mut parser = PredicateParser {
            expression,
            tokens,
            pos: 0,
        };
        let predicate = parser.parse_or()?;
        if let Some(token) = parser.peek() {
            return Err(parser.error(format!("unexpected token '{}'", token)));
        }
        Ok(predicate)
    }

    pub fn matches(&self, record: &TrialRecord) -> bool {
        match self {
            Predicate::Always => true,
            Predicate::Flag(flag) => flag.test(record),
            Predicate::Enrollment(cmp, value) => cmp.apply(record.enrollment_count, *value),
            Predicate::Text { field, value, equal } => {
                let actual = match field {
                    TextField::Phase => &record.phase,
                    TextField::OverallStatus => &record.overall_status,
                };
                actual.eq_ignore_ascii_case(value) == *equal
            }
            Predicate::Not(inner) => !inner.matches(record),
            Predicate::And(parts) => parts.iter().all(|p| p.matches(record)),
            Predicate::Or(parts) => parts.iter().any(|p| p.matches(record)),
        }
    }
}

impl FromStr for Predicate {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Predicate::parse(s)
    }
}

fn tokenize(expression: &str) -> Result<Vec<String>, ConfigError> {
    let mut tokens = Vec::new();
    let mut rest = expression;
    while !rest.trim().is_empty() {
        let caps = TOKEN
            .captures(rest)
            .filter(|caps| caps.get(0).map(|m| m.start()) == Some(0))
            .ok_or_else(|| ConfigError::Predicate {
                expression: expression.to_string(),
                message: format!("cannot parse near '{}'", rest.trim()),
            })?;
        tokens.push(caps[1].to_string());
        rest = &rest[caps[0].len()..];
    }
    Ok(tokens)
}

struct PredicateParser<'a> {
    expression: &'a str,
    tokens: Vec<String>,
    pos: usize,
}

impl PredicateParser<'_> {
    fn peek(&self) -> Option<&str> {
        self.tokens.get(self.pos).map(|t| t.as_str())
    }

    fn next(&mut self) -> Option<String> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        self.peek().is_some_and(|t| t.eq_ignore_ascii_case(keyword))
    }

    fn error(&self, message: impl Into<String>) -> ConfigError {
        ConfigError::Predicate {
            expression: self.expression.to_string(),
            message: message.into(),
        }
    }

    fn parse_or(&mut self) -> Result<Predicate, ConfigError> {
        let mut parts = vec![self.parse_and()?];
        while self.peek_keyword("OR") {
            self.pos += 1;
            parts.push(self.parse_and()?);
        }
        Ok(if parts.len() == 1 {
            parts.remove(0)
        } else {
            Predicate::Or(parts)
        })
    }

    fn parse_and(&mut self) -> Result<Predicate, ConfigError> {
        let mut parts = vec![self.parse_unary()?];
        while self.peek_keyword("AND") {
            self.pos += 1;
            parts.push(self.parse_unary()?);
        }
        Ok(if parts.len() == 1 {
            parts.remove(0)
        } else {
            Predicate::And(parts)
        })
    }

    fn parse_unary(&mut self) -> Result<Predicate, ConfigError> {
        if self.peek_keyword("NOT") {
            self.pos += 1;
            return Ok(Predicate::Not(Box::new(self.parse_unary()?)));
        }
        if self.peek() == Some("(") {
            self.pos += 1;
            let inner = self.parse_or()?;
            return match self.next().as_deref() {
                Some(")") => Ok(inner),
                _ => Err(self.error("missing ')'")),
            };
        }
        self.parse_term()
    }

    fn parse_term(&mut self) -> Result<Predicate, ConfigError> {
        let name = self.next().ok_or_else(|| self.error("expression ends early"))?;

        if let Some(flag) = RecordFlag::from_name(&name) {
            let Some(cmp) = self.peek().and_then(Comparison::from_token) else {
                return Ok(Predicate::Flag(flag));
            };
            self.pos += 1;
            let value = match self.next().map(|v| v.to_ascii_lowercase()).as_deref() {
                Some("true") => true,
                Some("false") => false,
                _ => return Err(self.error(format!("'{}' compares against true or false", name))),
            };
            let predicate = Predicate::Flag(flag);
            return match (cmp, value) {
                (Comparison::Eq, true) | (Comparison::Ne, false) => Ok(predicate),
                (Comparison::Eq, false) | (Comparison::Ne, true) => Ok(Predicate::Not(Box::new(predicate))),
                _ => Err(self.error(format!("'{}' only supports == and !=", name))),
            };
        }

        match name.as_str() {
            "enrollmentCount" | "enrollment_count" => {
                let cmp = self
                    .next()
                    .as_deref()
                    .and_then(Comparison::from_token)
                    .ok_or_else(|| self.error("enrollmentCount needs a comparison operator"))?;
                let value = self
                    .next()
                    .and_then(|v| v.parse::<u64>().ok())
                    .ok_or_else(|| self.error("enrollmentCount compares against a non-negative integer"))?;
                Ok(Predicate::Enrollment(cmp, value))
            }
            "phase" | "overallStatus" | "overall_status" => {
                let field = if name == "phase" {
                    TextField::Phase
                } else {
                    TextField::OverallStatus
                };
                let equal = match self.next().as_deref() {
                    Some("==") => true,
                    Some("!=") => false,
                    _ => return Err(self.error(format!("'{}' only supports == and !=", name))),
                };
                let value = self
                    .next()
                    .filter(|v| v.len() >= 2 && (v.starts_with('"') || v.starts_with('\'')))
                    .map(|v| v[1..v.len() - 1].to_string())
                    .ok_or_else(|| self.error(format!("'{}' compares against a quoted string", name)))?;
                Ok(Predicate::Text { field, value, equal })
            }
            other => Err(self.error(format!("unknown field '{}'", other))),
        }
    }
}

/// Field used to order selected records (descending)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankKey {
    #[default]
    EnrollmentCount,
    CompletionDate,
    StartDate,
    ResultsPostedDate,
}

impl RankKey {
    /// Descending by key, then ascending by id
    pub fn compare(&self, a: &TrialRecord, b: &TrialRecord) -> Ordering {
        let by_key = match self {
            RankKey::EnrollmentCount => b.enrollment_count.cmp(&a.enrollment_count),
            RankKey::CompletionDate => b.completion_date.cmp(&a.completion_date),
            RankKey::StartDate => b.start_date.cmp(&a.start_date),
            RankKey::ResultsPostedDate => b.results_posted_date.cmp(&a.results_posted_date),
        };
        by_key.then_with(|| a.id.cmp(&b.id))
    }
}

impl FromStr for RankKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "enrollment_count" | "enrollmentCount" => Ok(RankKey::EnrollmentCount),
            "completion_date" | "completionDate" => Ok(RankKey::CompletionDate),
            "start_date" | "startDate" => Ok(RankKey::StartDate),
            "results_posted_date" | "resultsPostedDate" => Ok(RankKey::ResultsPostedDate),
            other => Err(ConfigError::RankKey(other.to_string())),
        }
    }
}

/// Why a record did not make the selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    FailedPredicate,
    DuplicateId,
    Truncated,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DropReason::FailedPredicate => "failed predicate",
            DropReason::DuplicateId => "duplicate id",
            DropReason::Truncated => "truncated",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DroppedRecord {
    pub id: String,
    pub reason: DropReason,
}

/// Ranked records that survived selection plus what was dropped and why
#[derive(Debug, Clone, Default)]
pub struct SelectionResult {
    pub records: Vec<TrialRecord>,
    pub dropped: Vec<DroppedRecord>,
}

impl SelectionResult {
    pub fn dropped_count(&self) -> usize {
        self.dropped.len()
    }

    pub fn dropped_by_reason(&self) -> BTreeMap<DropReason, usize> {
        let mut counts = BTreeMap::new();
        for dropped in &self.dropped {
            *counts.entry(dropped.reason).or_insert(0) += 1;
        }
        counts
    }
}

/// Filter, rank, deduplicate and truncate
#[derive(Debug, Clone)]
pub struct Selector {
    pub predicate: Predicate,
    pub rank_key: RankKey,
    pub limit: usize,
}

impl Selector {
    pub fn new(predicate: Predicate, rank_key: RankKey, limit: usize) -> Self {
        Self {
            predicate,
            rank_key,
            limit,
        }
    }

    pub fn select(&self, records: Vec<TrialRecord>) -> SelectionResult {
        let mut dropped = Vec::new();

        let (mut survivors, failed): (Vec<_>, Vec<_>) =
            records.into_iter().partition(|r| self.predicate.matches(r));
        dropped.extend(failed.into_iter().map(|r| DroppedRecord {
            id: r.id,
            reason: DropReason::FailedPredicate,
        }));

        // Stable sort: records equal on key and id keep input order
        survivors.sort_by(|a, b| self.rank_key.compare(a, b));

        let mut seen = HashSet::new();
        let mut selected = Vec::with_capacity(survivors.len().min(self.limit));
        for record in survivors {
            if !seen.insert(record.id.clone()) {
                dropped.push(DroppedRecord {
                    id: record.id,
                    reason: DropReason::DuplicateId,
                });
            } else if selected.len() >= self.limit {
                dropped.push(DroppedRecord {
                    id: record.id,
                    reason: DropReason::Truncated,
                });
            } else {
                selected.push(record);
            }
        }

        debug!(
            selected = selected.len(),
            dropped = dropped.len(),
            "Selection complete"
        );
        SelectionResult {
            records: selected,
            dropped,
        }
    }
}

/// Apply a predicate, rank key and limit to a batch of records
pub fn select(
    records: Vec<TrialRecord>,
    predicate: &Predicate,
    rank_key: RankKey,
    limit: usize,
) -> SelectionResult {
    Selector::new(predicate.clone(), rank_key, limit).select(records)
}
