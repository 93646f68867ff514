use chrono::Utc;

use crate::model::{AttendanceRecord, ClassGroup, PointKind, PointRecord, Student};

/// In-memory collections served to the caller; the single source of truth.
/// Point records are kept newest-first.
#[derive(Debug, Clone, Default)]
pub struct LedgerStore {
    pub students: Vec<Student>,
    pub classes: Vec<ClassGroup>,
    pub points: Vec<PointRecord>,
    pub attendance: Vec<AttendanceRecord>,
}

const DEMO_CLASSES: &[&str] = &["机器人一班", "编程高阶班", "AI启蒙班", "创客实验班"];

const DEMO_STUDENTS: &[&str] = &[
    "李浩轩", "王梓涵", "张俊杰", "刘欣怡", "陈宇航", "杨诗涵",
    "赵子轩", "黄雨桐", "周博文", "吴梦洁", "李子墨", "王一诺",
];

const DEMO_REASONS: &[&str] = &[
    "完成复杂算法",
    "课堂积极发言",
    "帮助同学",
    "全勤奖励",
    "项目展示优秀",
    "代码零Bug",
];

const DEMO_KINDS: &[PointKind] = &[
    PointKind::Achievement,
    PointKind::Participation,
    PointKind::Behavior,
];

const DAY_MS: i64 = 86_400_000;

impl LedgerStore {
    /// Deterministic demo roster for a fresh workspace: fixed ids and names,
    /// point timestamps at fixed offsets inside the last ninety days so the
    /// dashboard has weekly and monthly figures to show.
    pub fn demo_seed() -> LedgerStore {
        let now_ms = Utc::now().timestamp_millis();

        let classes: Vec<ClassGroup> = DEMO_CLASSES
            .iter()
            .enumerate()
            .map(|(i, name)| ClassGroup {
                id: format!("c{}", i + 1),
                name: (*name).to_string(),
            })
            .collect();

        let students: Vec<Student> = DEMO_STUDENTS
            .iter()
            .enumerate()
            .map(|(i, name)| Student {
                id: format!("s{}", i + 1),
                name: (*name).to_string(),
                class_id: classes[i % classes.len()].id.clone(),
                avatar: None,
            })
            .collect();

        let mut points: Vec<PointRecord> = Vec::new();
        let mut n = 0usize;
        for (si, student) in students.iter().enumerate() {
            for r in 0..6 {
                n += 1;
                let age_days = ((si * 13 + r * 17) % 90) as i64;
                points.push(PointRecord {
                    id: format!("p{n}"),
                    student_id: student.id.clone(),
                    amount: 10 + ((si * 7 + r * 11) % 50) as i64,
                    reason: DEMO_REASONS[(si + r) % DEMO_REASONS.len()].to_string(),
                    timestamp: now_ms - age_days * DAY_MS,
                    kind: DEMO_KINDS[(si + r) % DEMO_KINDS.len()],
                });
            }
        }
        points.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        LedgerStore {
            students,
            classes,
            points,
            attendance: Vec::new(),
        }
    }
}
