use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub name: String,
    pub class_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassGroup {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointKind {
    Achievement,
    Behavior,
    Participation,
    Redemption,
    Adjustment,
}

impl PointKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PointKind::Achievement => "achievement",
            PointKind::Behavior => "behavior",
            PointKind::Participation => "participation",
            PointKind::Redemption => "redemption",
            PointKind::Adjustment => "adjustment",
        }
    }

    pub fn parse(s: &str) -> Option<PointKind> {
        match s {
            "achievement" => Some(PointKind::Achievement),
            "behavior" => Some(PointKind::Behavior),
            "participation" => Some(PointKind::Participation),
            "redemption" => Some(PointKind::Redemption),
            "adjustment" => Some(PointKind::Adjustment),
            _ => None,
        }
    }
}

/// A single ledger entry. Immutable once created: entries are only ever
/// added, or removed wholesale when their student is deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointRecord {
    pub id: String,
    pub student_id: String,
    pub amount: i64,
    pub reason: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    #[serde(rename = "type")]
    pub kind: PointKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Absent => "absent",
            AttendanceStatus::Late => "late",
        }
    }

    pub fn parse(s: &str) -> Option<AttendanceStatus> {
        match s {
            "present" => Some(AttendanceStatus::Present),
            "absent" => Some(AttendanceStatus::Absent),
            "late" => Some(AttendanceStatus::Late),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: String,
    pub student_id: String,
    /// YYYY-MM-DD
    pub date: String,
    pub status: AttendanceStatus,
}

/// Partial update for a student; absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentPatch {
    pub name: Option<String>,
    pub class_id: Option<String>,
    pub avatar: Option<String>,
}

impl StudentPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.class_id.is_none() && self.avatar.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Teacher {
    pub id: String,
    pub name: String,
    pub pin: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_record_uses_type_on_the_wire() {
        let rec = PointRecord {
            id: "p1".into(),
            student_id: "s1".into(),
            amount: 25,
            reason: "quiz".into(),
            timestamp: 1_700_000_000_000,
            kind: PointKind::Achievement,
        };
        let v = serde_json::to_value(&rec).expect("serialize");
        assert_eq!(v.get("type").and_then(|t| t.as_str()), Some("achievement"));
        assert_eq!(v.get("studentId").and_then(|t| t.as_str()), Some("s1"));

        let back: PointRecord = serde_json::from_value(v).expect("deserialize");
        assert_eq!(back, rec);
    }

    #[test]
    fn student_avatar_is_optional() {
        let s: Student =
            serde_json::from_str(r#"{"id":"s1","name":"Ada","classId":"c1"}"#).expect("parse");
        assert_eq!(s.avatar, None);
    }
}
