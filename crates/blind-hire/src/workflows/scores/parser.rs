use std::io::Read;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Deserializer};

use crate::workflows::matching::AnonymousHandle;

/// A row that parsed cleanly and is ready for the ledger.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ScoreRecord {
    pub(crate) line: u64,
    pub(crate) handle: AnonymousHandle,
    pub(crate) skill: String,
    pub(crate) score: u8,
    pub(crate) assessed_at: Option<DateTime<Utc>>,
}

/// A row that could not be read, with the reason reported back to the operator.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RejectedRow {
    pub(crate) line: u64,
    pub(crate) reason: String,
}

pub(crate) type ParsedRow = Result<ScoreRecord, RejectedRow>;

/// Parse an assessment export. Structural CSV errors abort; bad cells only reject their row.
pub(crate) fn parse_records<R: Read>(reader: R) -> Result<Vec<ParsedRow>, csv::Error> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);
    let headers = csv_reader.headers()?.clone();
    let mut rows = Vec::new();

    for result in csv_reader.records() {
        let record = result?;
        let line = record.position().map(|pos| pos.line()).unwrap_or_default();
        let row: ScoreRow = record.deserialize(Some(&headers))?;
        if row.is_blank() {
            continue;
        }
        rows.push(row.into_record(line));
    }

    Ok(rows)
}

#[derive(Debug, Deserialize)]
struct ScoreRow {
    #[serde(
        rename = "Candidate Handle",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    handle: Option<String>,
    #[serde(rename = "Skill", default, deserialize_with = "empty_string_as_none")]
    skill: Option<String>,
    #[serde(rename = "Score", default, deserialize_with = "empty_string_as_none")]
    score: Option<String>,
    #[serde(
        rename = "Assessed At",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    assessed_at: Option<String>,
}

impl ScoreRow {
    fn is_blank(&self) -> bool {
        self.handle.is_none()
            && self.skill.is_none()
            && self.score.is_none()
            && self.assessed_at.is_none()
    }

    fn into_record(self, line: u64) -> ParsedRow {
        let reject = |reason: String| RejectedRow { line, reason };

        let handle = self
            .handle
            .ok_or_else(|| reject("missing candidate handle".to_string()))?;
        let skill = self
            .skill
            .ok_or_else(|| reject("missing skill".to_string()))?;
        let raw_score = self
            .score
            .ok_or_else(|| reject("missing score".to_string()))?;
        let score = raw_score
            .parse::<u8>()
            .map_err(|_| reject(format!("score '{raw_score}' is not a number from 0 to 100")))?;
        let assessed_at = match self.assessed_at {
            Some(raw) => Some(
                parse_datetime(&raw)
                    .ok_or_else(|| reject(format!("unrecognised assessment date '{raw}'")))?,
            ),
            None => None,
        };

        Ok(ScoreRecord {
            line,
            handle: AnonymousHandle(handle),
            skill,
            score,
            assessed_at,
        })
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

fn parse_datetime(value: &str) -> Option<DateTime<Utc>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|naive| Utc.from_utc_datetime(&naive));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn dates_accept_rfc3339_and_plain_days() {
        assert_eq!(
            parse_datetime("2025-09-24T10:00:00-03:00"),
            Utc.with_ymd_and_hms(2025, 9, 24, 13, 0, 0).single()
        );
        assert_eq!(
            parse_datetime("2025-09-30"),
            Utc.with_ymd_and_hms(2025, 9, 30, 0, 0, 0).single()
        );
        assert!(parse_datetime("  ").is_none());
        assert!(parse_datetime("30/09/2025").is_none());
    }

    #[test]
    fn blank_rows_are_dropped_and_bad_cells_reject_their_row() {
        let csv = "Candidate Handle,Skill,Score,Assessed At\n\
anon-a, Rust ,91,2025-09-30\n\
,,,\n\
anon-b,SQL,ninety,\n\
anon-c,,70,\n\
anon-d,Go,65,yesterday\n";
        let rows = parse_records(Cursor::new(csv)).expect("parses");
        assert_eq!(rows.len(), 4);

        let first = rows[0].as_ref().expect("first row valid");
        assert_eq!(first.handle, AnonymousHandle("anon-a".to_string()));
        assert_eq!(first.skill, "Rust");
        assert_eq!(first.score, 91);
        assert_eq!(first.line, 2);
        assert!(first.assessed_at.is_some());

        let reasons: Vec<_> = rows[1..]
            .iter()
            .map(|row| row.as_ref().expect_err("rejected").reason.clone())
            .collect();
        assert!(reasons[0].contains("ninety"));
        assert_eq!(reasons[1], "missing skill");
        assert!(reasons[2].contains("yesterday"));
    }

    #[test]
    fn short_rows_are_tolerated() {
        let csv = "Candidate Handle,Skill,Score,Assessed At\nanon-a,Rust,80\n";
        let rows = parse_records(Cursor::new(csv)).expect("parses");
        let record = rows[0].as_ref().expect("valid");
        assert_eq!(record.score, 80);
        assert!(record.assessed_at.is_none());
    }
}
