use chrono::{DateTime, Datelike, Duration, Local, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::model::{PointRecord, Student};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RankingPeriod {
    Balance,
    Week,
    Month,
}

impl RankingPeriod {
    pub fn parse(s: &str) -> Option<RankingPeriod> {
        match s {
            "balance" => Some(RankingPeriod::Balance),
            "week" => Some(RankingPeriod::Week),
            "month" => Some(RankingPeriod::Month),
            _ => None,
        }
    }
}

/// Derived figures for one student. Never stored; the balance is always
/// recomputed as the exact sum of the ledger so it cannot drift.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentStats {
    pub student: Student,
    pub current_balance: i64,
    pub weekly_points: i64,
    pub monthly_points: i64,
    pub rank: usize,
}

fn start_of_local_day_millis(date: NaiveDate) -> i64 {
    let naive = date.and_time(NaiveTime::MIN);
    match naive.and_local_timezone(Local) {
        LocalResult::Single(dt) => dt.timestamp_millis(),
        LocalResult::Ambiguous(earliest, _) => earliest.timestamp_millis(),
        // Midnight skipped by a DST jump; fall back to the UTC reading.
        LocalResult::None => Utc.from_utc_datetime(&naive).timestamp_millis(),
    }
}

/// Monday 00:00 local time of the week containing `now`, as epoch millis.
pub fn week_start_millis(now: DateTime<Local>) -> i64 {
    let back = now.weekday().num_days_from_monday() as i64;
    start_of_local_day_millis(now.date_naive() - Duration::days(back))
}

/// First calendar day of the month containing `now`, 00:00 local, as epoch millis.
pub fn month_start_millis(now: DateTime<Local>) -> i64 {
    let first = now
        .date_naive()
        .with_day(1)
        .unwrap_or_else(|| now.date_naive());
    start_of_local_day_millis(first)
}

fn placeholder_student(student_id: &str) -> Student {
    Student {
        id: student_id.to_string(),
        name: "Unknown".to_string(),
        class_id: "0".to_string(),
        avatar: None,
    }
}

/// Compute balance and period figures for one student.
///
/// The balance sums every record including negatives. Weekly/monthly totals
/// count positive amounts only: they measure performance, not net balance,
/// so a redemption inside the window never lowers them.
pub fn student_stats(
    students: &[Student],
    points: &[PointRecord],
    student_id: &str,
    now: DateTime<Local>,
) -> StudentStats {
    let student = students
        .iter()
        .find(|s| s.id == student_id)
        .cloned()
        .unwrap_or_else(|| placeholder_student(student_id));

    let week_start = week_start_millis(now);
    let month_start = month_start_millis(now);

    let mut current_balance = 0i64;
    let mut weekly_points = 0i64;
    let mut monthly_points = 0i64;
    for p in points.iter().filter(|p| p.student_id == student_id) {
        current_balance += p.amount;
        if p.amount > 0 {
            if p.timestamp >= week_start {
                weekly_points += p.amount;
            }
            if p.timestamp >= month_start {
                monthly_points += p.amount;
            }
        }
    }

    StudentStats {
        student,
        current_balance,
        weekly_points,
        monthly_points,
        rank: 0,
    }
}

fn metric(stats: &StudentStats, period: RankingPeriod) -> i64 {
    match period {
        RankingPeriod::Balance => stats.current_balance,
        RankingPeriod::Week => stats.weekly_points,
        RankingPeriod::Month => stats.monthly_points,
    }
}

/// Rank every student by the selected period metric, descending.
/// Ties break on ascending student id so the ordering is deterministic
/// regardless of roster insertion order. Output order equals rank order.
pub fn all_student_stats(
    students: &[Student],
    points: &[PointRecord],
    period: RankingPeriod,
    now: DateTime<Local>,
) -> Vec<StudentStats> {
    let mut stats: Vec<StudentStats> = students
        .iter()
        .map(|s| student_stats(students, points, &s.id, now))
        .collect();

    stats.sort_by(|a, b| {
        match metric(b, period).cmp(&metric(a, period)) {
            Ordering::Equal => a.student.id.cmp(&b.student.id),
            other => other,
        }
    });
    for (i, s) in stats.iter_mut().enumerate() {
        s.rank = i + 1;
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PointKind;

    fn student(id: &str, name: &str) -> Student {
        Student {
            id: id.into(),
            name: name.into(),
            class_id: "c1".into(),
            avatar: None,
        }
    }

    fn record(id: &str, student_id: &str, amount: i64, timestamp: i64) -> PointRecord {
        PointRecord {
            id: id.into(),
            student_id: student_id.into(),
            amount,
            reason: "test".into(),
            timestamp,
            kind: if amount < 0 {
                PointKind::Redemption
            } else {
                PointKind::Achievement
            },
        }
    }

    fn fixed_now() -> DateTime<Local> {
        // A Thursday, mid-week, so Monday and the 1st are both in the past.
        Local
            .with_ymd_and_hms(2024, 3, 14, 12, 0, 0)
            .single()
            .expect("fixed clock")
    }

    #[test]
    fn balance_is_exact_sum_including_negatives() {
        let students = vec![student("s1", "Ada")];
        let now = fixed_now();
        let points = vec![
            record("p1", "s1", 30, now.timestamp_millis() - 1_000),
            record("p2", "s1", -45, now.timestamp_millis() - 500),
        ];
        let s = student_stats(&students, &points, "s1", now);
        assert_eq!(s.current_balance, -15);
    }

    #[test]
    fn weekly_total_ignores_redemptions_inside_the_window() {
        let students = vec![student("s1", "Ada")];
        let now = fixed_now();
        let week_start = week_start_millis(now);
        // +30 on Monday, -10 on Wednesday: weekly measures performance only.
        let points = vec![
            record("p1", "s1", 30, week_start + 3_600_000),
            record("p2", "s1", -10, week_start + 2 * 86_400_000),
        ];
        let s = student_stats(&students, &points, "s1", now);
        assert_eq!(s.weekly_points, 30);
        assert_eq!(s.current_balance, 20);
    }

    #[test]
    fn week_window_starts_monday_midnight() {
        let now = fixed_now();
        let week_start = week_start_millis(now);
        let students = vec![student("s1", "Ada")];
        let points = vec![
            record("p1", "s1", 10, week_start),
            record("p2", "s1", 20, week_start - 1),
        ];
        let s = student_stats(&students, &points, "s1", now);
        assert_eq!(s.weekly_points, 10);
        assert_eq!(s.monthly_points, 30, "both fall inside March");
    }

    #[test]
    fn month_window_starts_on_the_first() {
        let now = fixed_now();
        let month_start = month_start_millis(now);
        let students = vec![student("s1", "Ada")];
        let points = vec![
            record("p1", "s1", 7, month_start),
            record("p2", "s1", 11, month_start - 1),
        ];
        let s = student_stats(&students, &points, "s1", now);
        assert_eq!(s.monthly_points, 7);
        assert_eq!(s.current_balance, 18);
    }

    #[test]
    fn unknown_student_gets_zeroed_placeholder() {
        let students = vec![student("s1", "Ada")];
        let s = student_stats(&students, &[], "ghost", fixed_now());
        assert_eq!(s.student.id, "ghost");
        assert_eq!(s.student.name, "Unknown");
        assert_eq!(s.current_balance, 0);
        assert_eq!(s.weekly_points, 0);
        assert_eq!(s.monthly_points, 0);
    }

    #[test]
    fn leaderboard_ranks_descending_with_dense_ranks() {
        let students = vec![student("s1", "Ada"), student("s2", "Ben"), student("s3", "Cy")];
        let now = fixed_now();
        let ts = now.timestamp_millis() - 1_000;
        let points = vec![
            record("p1", "s1", 10, ts),
            record("p2", "s2", 50, ts),
            record("p3", "s3", 30, ts),
        ];
        let ranked = all_student_stats(&students, &points, RankingPeriod::Week, now);
        let ids: Vec<&str> = ranked.iter().map(|s| s.student.id.as_str()).collect();
        assert_eq!(ids, vec!["s2", "s3", "s1"]);
        let ranks: Vec<usize> = ranked.iter().map(|s| s.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
    }

    #[test]
    fn ranking_ties_break_on_student_id() {
        // Roster deliberately out of id order to prove the tie-break is
        // not an artifact of input ordering.
        let students = vec![student("s2", "Ben"), student("s1", "Ada")];
        let now = fixed_now();
        let ts = now.timestamp_millis() - 1_000;
        let points = vec![record("p1", "s1", 25, ts), record("p2", "s2", 25, ts)];
        let ranked = all_student_stats(&students, &points, RankingPeriod::Balance, now);
        assert_eq!(ranked[0].student.id, "s1");
        assert_eq!(ranked[1].student.id, "s2");
    }

    #[test]
    fn balance_period_ranks_by_net_balance() {
        let students = vec![student("s1", "Ada"), student("s2", "Ben")];
        let now = fixed_now();
        let ts = now.timestamp_millis() - 1_000;
        // Ada earned more this week but redeemed heavily: Ben leads on balance.
        let points = vec![
            record("p1", "s1", 60, ts),
            record("p2", "s1", -50, ts),
            record("p3", "s2", 40, ts),
        ];
        let by_balance = all_student_stats(&students, &points, RankingPeriod::Balance, now);
        assert_eq!(by_balance[0].student.id, "s2");
        let by_week = all_student_stats(&students, &points, RankingPeriod::Week, now);
        assert_eq!(by_week[0].student.id, "s1");
    }
}
