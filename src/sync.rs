use chrono::Utc;
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::local::{LocalStore, KEY_ATTENDANCE, KEY_CLASSES, KEY_POINTS, KEY_STUDENTS};
use crate::model::{
    AttendanceRecord, AttendanceStatus, ClassGroup, PointKind, PointRecord, Student, StudentPatch,
};
use crate::remote::{ChangeEvent, RemoteStore};
use crate::stats;
use crate::store::LedgerStore;

pub const EXCHANGE_VERSION: &str = "1.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    Remote,
    Local,
}

/// Serializable failure carrier for the sync boundary; handlers map it
/// straight onto an IPC error response.
#[derive(Debug, Clone, Serialize)]
pub struct SyncError {
    pub code: &'static str,
    pub message: String,
}

impl SyncError {
    fn new(code: &'static str, message: impl Into<String>) -> SyncError {
        SyncError {
            code,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for SyncError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for SyncError {}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeSummary {
    pub points_merged: usize,
    pub points_skipped: usize,
    pub students_refetched: bool,
    pub classes_refetched: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedeemOutcome {
    pub record: PointRecord,
    /// Set when the redemption drives the balance negative. Non-blocking;
    /// the redemption is applied regardless.
    pub negative_balance: bool,
}

/// Owns the in-memory collections, the local persisted store and (when
/// attached and reachable) the remote store. Every mutation applies
/// optimistically in memory, attempts the remote effect, compensates on
/// failure, and mirrors the collections to local storage.
pub struct SyncService {
    mode: SyncMode,
    store: LedgerStore,
    local: LocalStore,
    remote: Option<Box<dyn RemoteStore>>,
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

impl SyncService {
    /// Choose the mode at startup: remote-active when a remote is supplied
    /// and the initial fetch succeeds, local-only otherwise. A remote fetch
    /// failure falls back to local data, never an empty view.
    pub fn init(
        local: LocalStore,
        remote: Option<Box<dyn RemoteStore>>,
        seed_demo: bool,
    ) -> anyhow::Result<SyncService> {
        let mut service = SyncService {
            mode: SyncMode::Local,
            store: LedgerStore::default(),
            local,
            remote: None,
        };

        if let Some(remote) = remote {
            service.remote = Some(remote);
            match service.fetch_all_remote() {
                Ok(()) => {
                    service.mode = SyncMode::Remote;
                    // Attendance lives in the local store only; reload it so
                    // the persist below does not wipe the saved marks.
                    service.store.attendance =
                        parse_blob(service.local.get_json(KEY_ATTENDANCE)?)?;
                    service.persist()?;
                    return Ok(service);
                }
                Err(e) => {
                    warn!(error = %e, "remote fetch failed at init, falling back to local mode");
                    service.remote = None;
                }
            }
        }

        service.load_local(seed_demo)?;
        Ok(service)
    }

    pub fn mode(&self) -> SyncMode {
        self.mode
    }

    pub fn is_remote_active(&self) -> bool {
        self.mode == SyncMode::Remote
    }

    pub fn store(&self) -> &LedgerStore {
        &self.store
    }

    fn load_local(&mut self, seed_demo: bool) -> anyhow::Result<()> {
        let students = self.local.get_json(KEY_STUDENTS)?;
        let classes = self.local.get_json(KEY_CLASSES)?;
        let points = self.local.get_json(KEY_POINTS)?;
        let attendance = self.local.get_json(KEY_ATTENDANCE)?;

        let empty = students.is_none() && classes.is_none() && points.is_none();
        if empty {
            self.store = if seed_demo {
                LedgerStore::demo_seed()
            } else {
                LedgerStore::default()
            };
            self.persist()?;
            return Ok(());
        }

        self.store = LedgerStore {
            students: parse_blob(students)?,
            classes: parse_blob(classes)?,
            points: parse_blob(points)?,
            attendance: parse_blob(attendance)?,
        };
        Ok(())
    }

    fn fetch_all_remote(&mut self) -> anyhow::Result<()> {
        let Some(remote) = self.remote.as_ref() else {
            anyhow::bail!("no remote attached");
        };
        let points = remote.fetch_points()?;
        let students = remote.fetch_students()?;
        let classes = remote.fetch_classes()?;
        self.store.points = points;
        self.store.students = students;
        self.store.classes = classes;
        Ok(())
    }

    /// Mirror every collection to local storage in full. Runs after each
    /// mutation in both modes, so an offline restart sees the last snapshot.
    fn persist(&self) -> anyhow::Result<()> {
        self.local
            .set_json(KEY_STUDENTS, &serde_json::to_value(&self.store.students)?)?;
        self.local
            .set_json(KEY_CLASSES, &serde_json::to_value(&self.store.classes)?)?;
        self.local
            .set_json(KEY_POINTS, &serde_json::to_value(&self.store.points)?)?;
        self.local.set_json(
            KEY_ATTENDANCE,
            &serde_json::to_value(&self.store.attendance)?,
        )?;
        Ok(())
    }

    fn persist_or_err(&self) -> Result<(), SyncError> {
        self.persist()
            .map_err(|e| SyncError::new("local_persist_failed", e.to_string()))
    }

    /// Compensation for failed remote updates/deletes: pull true remote
    /// state back into memory. If even that fails, drop to local-only so
    /// the caller keeps a consistent (if stale) view.
    fn resync_from_remote(&mut self) {
        match self.fetch_all_remote() {
            Ok(()) => {
                if let Err(e) = self.persist() {
                    warn!(error = %e, "persist after resync failed");
                }
            }
            Err(e) => {
                warn!(error = %e, "resync failed, falling back to local mode");
                self.remote = None;
                self.mode = SyncMode::Local;
            }
        }
    }

    /// Full re-fetch from the remote store. On failure the service degrades
    /// to local-only mode and reports the error.
    pub fn refresh(&mut self) -> Result<(), SyncError> {
        if self.remote.is_none() {
            return Err(SyncError::new("no_remote", "no remote store attached"));
        }
        match self.fetch_all_remote() {
            Ok(()) => {
                self.mode = SyncMode::Remote;
                self.persist_or_err()
            }
            Err(e) => {
                warn!(error = %e, "refresh failed, falling back to local mode");
                self.remote = None;
                self.mode = SyncMode::Local;
                Err(SyncError::new("remote_fetch_failed", e.to_string()))
            }
        }
    }

    /// Drain the remote change feed and merge it. Point inserts are
    /// idempotent on id, so an insert this process applied optimistically
    /// is deduplicated when its own notification comes back.
    pub fn poll_remote_changes(&mut self) -> Result<MergeSummary, SyncError> {
        let Some(remote) = self.remote.as_mut() else {
            return Err(SyncError::new("no_remote", "no remote store attached"));
        };
        let events = match remote.poll_changes() {
            Ok(v) => v,
            Err(e) => return Err(SyncError::new("remote_poll_failed", e.to_string())),
        };

        let mut summary = MergeSummary::default();
        let mut refetch_students = false;
        let mut refetch_classes = false;
        for event in events {
            match event {
                ChangeEvent::PointInserted(rec) => {
                    if self.store.points.iter().any(|p| p.id == rec.id) {
                        summary.points_skipped += 1;
                    } else {
                        self.store.points.insert(0, rec);
                        summary.points_merged += 1;
                    }
                }
                ChangeEvent::StudentsChanged => refetch_students = true,
                ChangeEvent::ClassesChanged => refetch_classes = true,
            }
        }

        if refetch_students {
            let remote = self.remote.as_ref().map(|r| r.fetch_students());
            match remote {
                Some(Ok(students)) => {
                    self.store.students = students;
                    summary.students_refetched = true;
                }
                Some(Err(e)) => return self.degrade_after_poll_failure(e),
                None => {}
            }
        }
        if refetch_classes {
            let remote = self.remote.as_ref().map(|r| r.fetch_classes());
            match remote {
                Some(Ok(classes)) => {
                    self.store.classes = classes;
                    summary.classes_refetched = true;
                }
                Some(Err(e)) => return self.degrade_after_poll_failure(e),
                None => {}
            }
        }

        self.persist_or_err()?;
        Ok(summary)
    }

    /// A table re-fetch failed after point events were already merged.
    /// Persist the merged view and drop to local-only, the same degradation
    /// `refresh` applies, so memory and the local blobs never diverge.
    fn degrade_after_poll_failure(&mut self, e: anyhow::Error) -> Result<MergeSummary, SyncError> {
        warn!(error = %e, "re-fetch after change event failed, falling back to local mode");
        self.remote = None;
        self.mode = SyncMode::Local;
        self.persist_or_err()?;
        Err(SyncError::new("remote_fetch_failed", e.to_string()))
    }

    // --- mutation operations -------------------------------------------

    pub fn add_point(
        &mut self,
        student_id: &str,
        amount: i64,
        reason: &str,
        kind: PointKind,
    ) -> Result<PointRecord, SyncError> {
        let record = PointRecord {
            id: Uuid::new_v4().to_string(),
            student_id: student_id.to_string(),
            amount,
            reason: reason.to_string(),
            timestamp: now_millis(),
            kind,
        };

        // Optimistic prepend, then the remote round trip.
        self.store.points.insert(0, record.clone());
        if let Some(remote) = self.remote.as_mut() {
            if let Err(e) = remote.insert_point(&record) {
                self.store.points.retain(|p| p.id != record.id);
                let _ = self.persist();
                return Err(SyncError::new("remote_insert_failed", e.to_string()));
            }
        }
        self.persist_or_err()?;
        Ok(record)
    }

    pub fn redeem_points(
        &mut self,
        student_id: &str,
        amount: i64,
        item: &str,
    ) -> Result<RedeemOutcome, SyncError> {
        let cost = -amount.abs();
        let balance = self.current_balance(student_id);
        let negative_balance = balance < amount.abs();
        if negative_balance {
            warn!(student_id, balance, cost, "redemption drives balance negative");
        }
        let record = self.add_point(
            student_id,
            cost,
            &format!("Redeemed: {item}"),
            PointKind::Redemption,
        )?;
        Ok(RedeemOutcome {
            record,
            negative_balance,
        })
    }

    /// Zero out a balance with a single adjustment entry. A balance that is
    /// already zero produces no record at all.
    pub fn reset_points(&mut self, student_id: &str) -> Result<Option<PointRecord>, SyncError> {
        let balance = self.current_balance(student_id);
        if balance == 0 {
            return Ok(None);
        }
        let record = self.add_point(
            student_id,
            -balance,
            "Balance reset to zero",
            PointKind::Adjustment,
        )?;
        Ok(Some(record))
    }

    fn current_balance(&self, student_id: &str) -> i64 {
        self.store
            .points
            .iter()
            .filter(|p| p.student_id == student_id)
            .map(|p| p.amount)
            .sum()
    }

    pub fn add_class(&mut self, name: &str) -> Result<ClassGroup, SyncError> {
        let class = ClassGroup {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
        };
        self.store.classes.push(class.clone());
        if let Some(remote) = self.remote.as_mut() {
            if let Err(e) = remote.insert_class(&class) {
                self.store.classes.retain(|c| c.id != class.id);
                let _ = self.persist();
                return Err(SyncError::new("remote_insert_failed", e.to_string()));
            }
        }
        self.persist_or_err()?;
        Ok(class)
    }

    pub fn add_student(
        &mut self,
        name: &str,
        class_id: &str,
        avatar: Option<String>,
    ) -> Result<Student, SyncError> {
        let student = Student {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            class_id: class_id.to_string(),
            avatar,
        };
        self.store.students.push(student.clone());
        if let Some(remote) = self.remote.as_mut() {
            if let Err(e) = remote.insert_student(&student) {
                self.store.students.retain(|s| s.id != student.id);
                let _ = self.persist();
                return Err(SyncError::new("remote_insert_failed", e.to_string()));
            }
        }
        self.persist_or_err()?;
        Ok(student)
    }

    pub fn update_class(&mut self, id: &str, name: &str) -> Result<(), SyncError> {
        let Some(class) = self.store.classes.iter_mut().find(|c| c.id == id) else {
            return Err(SyncError::new("not_found", format!("class not found: {id}")));
        };
        class.name = name.to_string();
        if let Some(remote) = self.remote.as_mut() {
            if let Err(e) = remote.update_class(id, name) {
                // No field-level rollback; pull true remote state instead.
                self.resync_from_remote();
                return Err(SyncError::new("remote_update_failed", e.to_string()));
            }
        }
        self.persist_or_err()
    }

    pub fn update_student(&mut self, id: &str, patch: &StudentPatch) -> Result<(), SyncError> {
        let Some(student) = self.store.students.iter_mut().find(|s| s.id == id) else {
            return Err(SyncError::new(
                "not_found",
                format!("student not found: {id}"),
            ));
        };
        if let Some(name) = &patch.name {
            student.name = name.clone();
        }
        if let Some(class_id) = &patch.class_id {
            student.class_id = class_id.clone();
        }
        if let Some(avatar) = &patch.avatar {
            student.avatar = Some(avatar.clone());
        }
        if let Some(remote) = self.remote.as_mut() {
            if let Err(e) = remote.update_student(id, patch) {
                self.resync_from_remote();
                return Err(SyncError::new("remote_update_failed", e.to_string()));
            }
        }
        self.persist_or_err()
    }

    /// Deleting a class does not cascade: its students keep their (now
    /// orphaned) class id.
    pub fn delete_class(&mut self, id: &str) -> Result<(), SyncError> {
        if !self.store.classes.iter().any(|c| c.id == id) {
            return Err(SyncError::new("not_found", format!("class not found: {id}")));
        }
        self.store.classes.retain(|c| c.id != id);
        if let Some(remote) = self.remote.as_mut() {
            if let Err(e) = remote.delete_class(id) {
                self.resync_from_remote();
                return Err(SyncError::new("remote_delete_failed", e.to_string()));
            }
        }
        self.persist_or_err()
    }

    /// Remove the student's ledger entries and attendance, then the student.
    /// Remote order is points first (referential integrity), attendance
    /// best-effort, student last. If the student delete fails after the
    /// points delete succeeded, the resync shows the points already gone on
    /// the remote side; there is no compensating transaction for that window.
    pub fn delete_student(&mut self, id: &str) -> Result<(), SyncError> {
        if !self.store.students.iter().any(|s| s.id == id) {
            return Err(SyncError::new(
                "not_found",
                format!("student not found: {id}"),
            ));
        }

        self.store.points.retain(|p| p.student_id != id);
        self.store.attendance.retain(|a| a.student_id != id);
        self.store.students.retain(|s| s.id != id);

        if let Some(remote) = self.remote.as_mut() {
            if let Err(e) = remote.delete_points_for_student(id) {
                self.resync_from_remote();
                return Err(SyncError::new("remote_delete_failed", e.to_string()));
            }
        }
        if let Some(remote) = self.remote.as_mut() {
            if let Err(e) = remote.delete_attendance_for_student(id) {
                warn!(student_id = id, error = %e, "remote attendance delete failed");
            }
        }
        if let Some(remote) = self.remote.as_mut() {
            if let Err(e) = remote.delete_student(id) {
                self.resync_from_remote();
                return Err(SyncError::new("remote_delete_failed", e.to_string()));
            }
        }
        self.persist_or_err()
    }

    /// Upsert today's (or any) attendance mark for a student. A local-view
    /// concern; the remote carries attendance rows only for delete-time
    /// cleanup.
    pub fn mark_attendance(
        &mut self,
        student_id: &str,
        date: &str,
        status: AttendanceStatus,
    ) -> Result<AttendanceRecord, SyncError> {
        if !self.store.students.iter().any(|s| s.id == student_id) {
            return Err(SyncError::new(
                "not_found",
                format!("student not found: {student_id}"),
            ));
        }
        let record = if let Some(existing) = self
            .store
            .attendance
            .iter_mut()
            .find(|a| a.student_id == student_id && a.date == date)
        {
            existing.status = status;
            existing.clone()
        } else {
            let record = AttendanceRecord {
                id: Uuid::new_v4().to_string(),
                student_id: student_id.to_string(),
                date: date.to_string(),
                status,
            };
            self.store.attendance.push(record.clone());
            record
        };
        self.persist_or_err()?;
        Ok(record)
    }

    /// Replace the three collections wholesale from an exchange payload.
    /// Validation is all-or-nothing: nothing is applied unless students,
    /// classes and points all parse. Never pushed to the remote; the result
    /// flags that the import is local-only when remote-active.
    pub fn import_data(&mut self, payload: &serde_json::Value) -> Result<bool, SyncError> {
        let students = parse_import_field::<Student>(payload, "students")?;
        let classes = parse_import_field::<ClassGroup>(payload, "classes")?;
        let points = parse_import_field::<PointRecord>(payload, "points")?;

        self.store.students = students;
        self.store.classes = classes;
        self.store.points = points;
        self.persist_or_err()?;

        if self.is_remote_active() {
            warn!("imported data replaces the local view only; remote state is untouched");
            return Ok(true);
        }
        Ok(false)
    }

    pub fn export_data(&self) -> Result<serde_json::Value, SyncError> {
        let build = || -> anyhow::Result<serde_json::Value> {
            Ok(serde_json::json!({
                "version": EXCHANGE_VERSION,
                "timestamp": now_millis(),
                "students": serde_json::to_value(&self.store.students)?,
                "classes": serde_json::to_value(&self.store.classes)?,
                "points": serde_json::to_value(&self.store.points)?,
            }))
        };
        build().map_err(|e| SyncError::new("export_failed", e.to_string()))
    }

    pub fn student_stats(&self, student_id: &str) -> stats::StudentStats {
        stats::student_stats(
            &self.store.students,
            &self.store.points,
            student_id,
            chrono::Local::now(),
        )
    }

    pub fn leaderboard(&self, period: stats::RankingPeriod) -> Vec<stats::StudentStats> {
        stats::all_student_stats(
            &self.store.students,
            &self.store.points,
            period,
            chrono::Local::now(),
        )
    }
}

fn parse_blob<T: serde::de::DeserializeOwned>(
    blob: Option<serde_json::Value>,
) -> anyhow::Result<Vec<T>> {
    match blob {
        Some(v) => Ok(serde_json::from_value(v)?),
        None => Ok(Vec::new()),
    }
}

fn parse_import_field<T: serde::de::DeserializeOwned>(
    payload: &serde_json::Value,
    field: &str,
) -> Result<Vec<T>, SyncError> {
    let Some(value) = payload.get(field) else {
        return Err(SyncError::new(
            "import_invalid",
            format!("missing field: {field}"),
        ));
    };
    if !value.is_array() {
        return Err(SyncError::new(
            "import_invalid",
            format!("field must be an array: {field}"),
        ));
    }
    serde_json::from_value(value.clone())
        .map_err(|e| SyncError::new("import_invalid", format!("{field}: {e}")))
}
