//! Report composition: turn the milestone snapshot into the public post.
//!
//! Pure function of its inputs. Lines are grouped by person (in the order
//! people first appear in configuration) and, within a person, ordered by
//! elapsed days ascending so the most recent milestone comes first. A
//! trailing line carries the generation time.
//!
//! ```text
//! 234 days since Joe Root's last Test century.
//! 2238 days since Joe Root's last ODI century.
//! 630 days since Ben Stokes' last century.
//! ...
//! This was posted at 09:00:04
//! ```

use centurywatch_types::{MilestoneSnapshot, StatisticDef, StatisticId};
use chrono::{NaiveDate, NaiveDateTime};

/// Format of the generation timestamp in the trailing line.
const TIMESTAMP_FORMAT: &str = "%H:%M:%S";

/// Errors raised when the snapshot does not match the statistic list.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReportError {
    /// A configured statistic has no entry in the snapshot.
    #[error("snapshot has no entry for statistic `{0}`")]
    MissingStatistic(StatisticId),
}

/// One rendered statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportLine {
    /// The statistic this line describes.
    pub statistic: StatisticId,
    /// Grouping key.
    pub person: String,
    /// Whole days between the effective date and today, never negative.
    pub elapsed_days: u64,
    /// The rendered sentence.
    pub text: String,
}

/// A composed report, ready to publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    /// Statements in presentation order.
    pub lines: Vec<ReportLine>,
    /// When the report was generated.
    pub generated_at: NaiveDateTime,
}

impl Report {
    /// The trailing generation-time line.
    pub fn footer(&self) -> String {
        format!("This was posted at {}", self.generated_at.format(TIMESTAMP_FORMAT))
    }

    /// Full post text: one line per statistic plus the footer.
    pub fn text(&self) -> String {
        let mut text = String::new();
        for line in &self.lines {
            text.push_str(&line.text);
            text.push('\n');
        }
        text.push_str(&self.footer());
        text
    }
}

/// Compose the report for `statistics` from `snapshot` as of `now`.
///
/// # Errors
///
/// Returns [`ReportError::MissingStatistic`] if a statistic has no snapshot
/// entry. This is a contract violation by the caller, not a recoverable
/// runtime condition.
pub fn compose(
    statistics: &[StatisticDef],
    snapshot: &MilestoneSnapshot,
    now: NaiveDateTime,
) -> Result<Report, ReportError> {
    let today = now.date();

    let mut people: Vec<&str> = Vec::new();
    for stat in statistics {
        if !people.contains(&stat.person.as_str()) {
            people.push(&stat.person);
        }
    }

    let mut lines = Vec::with_capacity(statistics.len());
    for person in people {
        let mut group = statistics
            .iter()
            .filter(|s| s.person == person)
            .map(|stat| {
                let since = snapshot
                    .get(&stat.id)
                    .ok_or_else(|| ReportError::MissingStatistic(stat.id.clone()))?;
                let elapsed_days = elapsed_days(since, today);
                Ok(ReportLine {
                    statistic: stat.id.clone(),
                    person: stat.person.clone(),
                    elapsed_days,
                    text: render_line(elapsed_days, &stat.person, &stat.description),
                })
            })
            .collect::<Result<Vec<_>, ReportError>>()?;
        group.sort_by_key(|line| line.elapsed_days);
        lines.extend(group);
    }

    Ok(Report {
        lines,
        generated_at: now,
    })
}

/// Whole days from `since` to `today`; dates in the future count as zero.
pub fn elapsed_days(since: NaiveDate, today: NaiveDate) -> u64 {
    u64::try_from(today.signed_duration_since(since).num_days()).unwrap_or(0)
}

fn render_line(elapsed_days: u64, person: &str, description: &str) -> String {
    let unit = if elapsed_days == 1 { "day" } else { "days" };
    format!(
        "{elapsed_days} {unit} since {} last {description}.",
        possessive(person)
    )
}

/// English possessive: `Joe Root's`, `Ben Stokes'`.
fn possessive(name: &str) -> String {
    if name.ends_with('s') || name.ends_with('S') {
        format!("{name}'")
    } else {
        format!("{name}'s")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn stat(id: &str, person: &str, description: &str) -> StatisticDef {
        StatisticDef {
            id: StatisticId::new(id).unwrap(),
            person: person.to_owned(),
            description: description.to_owned(),
            source_url: format!("src/{id}"),
            fallback_date: date(2000, 1, 1),
        }
    }

    fn tracked() -> Vec<StatisticDef> {
        vec![
            stat("root_test", "Joe Root", "Test century"),
            stat("root_odi", "Joe Root", "ODI century"),
            stat("stokes_any", "Ben Stokes", "century"),
            stat("stokes_test", "Ben Stokes", "Test century"),
            stat("stokes_test_winning", "Ben Stokes", "Test century in a winning cause"),
        ]
    }

    fn snapshot_of(pairs: &[(&str, NaiveDate)]) -> MilestoneSnapshot {
        pairs
            .iter()
            .map(|(id, d)| (StatisticId::new(*id).unwrap(), *d))
            .collect()
    }

    fn now() -> NaiveDateTime {
        date(2025, 7, 30).and_hms_opt(9, 0, 4).unwrap()
    }

    #[test]
    fn renders_grouped_sorted_lines_with_footer() {
        let snapshot = snapshot_of(&[
            ("root_test", date(2024, 12, 8)),
            ("root_odi", date(2019, 6, 14)),
            ("stokes_any", date(2023, 11, 8)),
            ("stokes_test", date(2023, 7, 2)),
            ("stokes_test_winning", date(2022, 8, 26)),
        ]);
        let report = compose(&tracked(), &snapshot, now()).unwrap();

        assert_eq!(
            report.text(),
            "234 days since Joe Root's last Test century.\n\
             2238 days since Joe Root's last ODI century.\n\
             630 days since Ben Stokes' last century.\n\
             759 days since Ben Stokes' last Test century.\n\
             1069 days since Ben Stokes' last Test century in a winning cause.\n\
             This was posted at 09:00:04"
        );
    }

    #[test]
    fn sorts_within_group_by_recency() {
        let snapshot = snapshot_of(&[
            ("root_test", date(2019, 1, 1)),
            ("root_odi", date(2025, 7, 1)),
            ("stokes_any", date(2025, 1, 1)),
            ("stokes_test", date(2025, 1, 1)),
            ("stokes_test_winning", date(2025, 6, 1)),
        ]);
        let report = compose(&tracked(), &snapshot, now()).unwrap();
        let order: Vec<&str> = report.lines.iter().map(|l| l.statistic.as_str()).collect();
        assert_eq!(
            order,
            ["root_odi", "root_test", "stokes_test_winning", "stokes_any", "stokes_test"]
        );
    }

    #[test]
    fn groups_follow_first_appearance_even_if_interleaved() {
        let stats = vec![
            stat("b1", "Ben Stokes", "century"),
            stat("j1", "Joe Root", "century"),
            stat("b2", "Ben Stokes", "Test century"),
        ];
        let snapshot = snapshot_of(&[
            ("b1", date(2025, 1, 1)),
            ("j1", date(2025, 1, 1)),
            ("b2", date(2025, 2, 1)),
        ]);
        let report = compose(&stats, &snapshot, now()).unwrap();
        let order: Vec<&str> = report.lines.iter().map(|l| l.statistic.as_str()).collect();
        assert_eq!(order, ["b2", "b1", "j1"]);
    }

    #[test]
    fn singular_day_and_future_dates() {
        let stats = vec![
            stat("yesterday", "Joe Root", "Test century"),
            stat("future", "Joe Root", "ODI century"),
        ];
        let snapshot = snapshot_of(&[
            ("yesterday", date(2025, 7, 29)),
            ("future", date(2025, 8, 10)),
        ]);
        let report = compose(&stats, &snapshot, now()).unwrap();
        assert_eq!(report.lines[0].text, "0 days since Joe Root's last ODI century.");
        assert_eq!(report.lines[1].text, "1 day since Joe Root's last Test century.");
    }

    #[test]
    fn missing_snapshot_entry_is_reported() {
        let snapshot = snapshot_of(&[("root_test", date(2024, 12, 8))]);
        let err = compose(&tracked(), &snapshot, now()).unwrap_err();
        assert_eq!(
            err,
            ReportError::MissingStatistic(StatisticId::new("root_odi").unwrap())
        );
    }

    #[test]
    fn possessive_forms() {
        assert_eq!(possessive("Joe Root"), "Joe Root's");
        assert_eq!(possessive("Ben Stokes"), "Ben Stokes'");
    }
}
