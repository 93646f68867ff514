use rusqlite::{params_from_iter, types::Value, Connection};
use std::path::Path;
use std::time::Duration;

use crate::model::{ClassGroup, PointKind, PointRecord, Student, StudentPatch};

/// Change notification from the remote store. Point inserts carry the row;
/// roster tables only signal that a re-fetch is due.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    PointInserted(PointRecord),
    StudentsChanged,
    ClassesChanged,
}

/// The remote store collaborator: per-table select-all / insert-one /
/// update-by-id / delete-by-id, plus a polled change feed. Injected into the
/// sync layer as a boxed instance with an explicit lifecycle; dropping the
/// sync layer releases the handle and its feed cursor.
pub trait RemoteStore {
    fn fetch_students(&self) -> anyhow::Result<Vec<Student>>;
    fn fetch_classes(&self) -> anyhow::Result<Vec<ClassGroup>>;
    /// Newest-first.
    fn fetch_points(&self) -> anyhow::Result<Vec<PointRecord>>;

    fn insert_point(&mut self, record: &PointRecord) -> anyhow::Result<()>;
    fn insert_student(&mut self, student: &Student) -> anyhow::Result<()>;
    fn insert_class(&mut self, class: &ClassGroup) -> anyhow::Result<()>;

    fn update_student(&mut self, id: &str, patch: &StudentPatch) -> anyhow::Result<()>;
    fn update_class(&mut self, id: &str, name: &str) -> anyhow::Result<()>;

    fn delete_student(&mut self, id: &str) -> anyhow::Result<()>;
    fn delete_class(&mut self, id: &str) -> anyhow::Result<()>;
    fn delete_points_for_student(&mut self, student_id: &str) -> anyhow::Result<()>;
    fn delete_attendance_for_student(&mut self, student_id: &str) -> anyhow::Result<()>;

    fn poll_changes(&mut self) -> anyhow::Result<Vec<ChangeEvent>>;
}

/// Remote store over a shared SQLite file. Every writer appends to a
/// `change_log` sequence; each consumer starts at the current maximum so it
/// never replays history, then polls forward.
pub struct SqliteRemote {
    conn: Connection,
    cursor: i64,
}

impl SqliteRemote {
    pub fn open(path: &Path) -> anyhow::Result<SqliteRemote> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_millis(2_000))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS classes(
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS students(
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                class_id TEXT NOT NULL,
                avatar TEXT
            )",
            [],
        )?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS points(
                id TEXT PRIMARY KEY,
                student_id TEXT NOT NULL,
                amount INTEGER NOT NULL,
                reason TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                kind TEXT NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_points_student ON points(student_id)",
            [],
        )?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS attendance(
                id TEXT PRIMARY KEY,
                student_id TEXT NOT NULL,
                date TEXT NOT NULL,
                status TEXT NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS change_log(
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                tbl TEXT NOT NULL,
                op TEXT NOT NULL,
                row_id TEXT NOT NULL
            )",
            [],
        )?;

        let cursor: i64 =
            conn.query_row("SELECT COALESCE(MAX(seq), 0) FROM change_log", [], |r| {
                r.get(0)
            })?;

        Ok(SqliteRemote { conn, cursor })
    }

    fn fetch_point_row(&self, id: &str) -> anyhow::Result<Option<PointRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, student_id, amount, reason, timestamp, kind
             FROM points WHERE id = ?",
        )?;
        let mut rows = stmt.query([id])?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };
        let kind_raw: String = row.get(5)?;
        let kind = PointKind::parse(&kind_raw)
            .ok_or_else(|| anyhow::anyhow!("unknown point kind: {kind_raw}"))?;
        Ok(Some(PointRecord {
            id: row.get(0)?,
            student_id: row.get(1)?,
            amount: row.get(2)?,
            reason: row.get(3)?,
            timestamp: row.get(4)?,
            kind,
        }))
    }
}

impl RemoteStore for SqliteRemote {
    fn fetch_students(&self) -> anyhow::Result<Vec<Student>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, class_id, avatar FROM students ORDER BY rowid")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(Student {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    class_id: row.get(2)?,
                    avatar: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn fetch_classes(&self) -> anyhow::Result<Vec<ClassGroup>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name FROM classes ORDER BY rowid")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(ClassGroup {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn fetch_points(&self) -> anyhow::Result<Vec<PointRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, student_id, amount, reason, timestamp, kind
             FROM points ORDER BY timestamp DESC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                let kind_raw: String = row.get(5)?;
                Ok((
                    PointRecord {
                        id: row.get(0)?,
                        student_id: row.get(1)?,
                        amount: row.get(2)?,
                        reason: row.get(3)?,
                        timestamp: row.get(4)?,
                        kind: PointKind::Achievement,
                    },
                    kind_raw,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut out = Vec::with_capacity(rows.len());
        for (mut rec, kind_raw) in rows {
            rec.kind = PointKind::parse(&kind_raw)
                .ok_or_else(|| anyhow::anyhow!("unknown point kind: {kind_raw}"))?;
            out.push(rec);
        }
        Ok(out)
    }

    fn insert_point(&mut self, record: &PointRecord) -> anyhow::Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO points(id, student_id, amount, reason, timestamp, kind)
             VALUES(?, ?, ?, ?, ?, ?)",
            (
                &record.id,
                &record.student_id,
                record.amount,
                &record.reason,
                record.timestamp,
                record.kind.as_str(),
            ),
        )?;
        tx.execute(
            "INSERT INTO change_log(tbl, op, row_id) VALUES('points', 'insert', ?)",
            [&record.id],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn insert_student(&mut self, student: &Student) -> anyhow::Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO students(id, name, class_id, avatar) VALUES(?, ?, ?, ?)",
            (
                &student.id,
                &student.name,
                &student.class_id,
                student.avatar.as_deref(),
            ),
        )?;
        tx.execute(
            "INSERT INTO change_log(tbl, op, row_id) VALUES('students', 'insert', ?)",
            [&student.id],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn insert_class(&mut self, class: &ClassGroup) -> anyhow::Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO classes(id, name) VALUES(?, ?)",
            (&class.id, &class.name),
        )?;
        tx.execute(
            "INSERT INTO change_log(tbl, op, row_id) VALUES('classes', 'insert', ?)",
            [&class.id],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn update_student(&mut self, id: &str, patch: &StudentPatch) -> anyhow::Result<()> {
        let mut set_parts: Vec<&str> = Vec::new();
        let mut bind_values: Vec<Value> = Vec::new();
        if let Some(name) = &patch.name {
            set_parts.push("name = ?");
            bind_values.push(Value::Text(name.clone()));
        }
        if let Some(class_id) = &patch.class_id {
            set_parts.push("class_id = ?");
            bind_values.push(Value::Text(class_id.clone()));
        }
        if let Some(avatar) = &patch.avatar {
            set_parts.push("avatar = ?");
            bind_values.push(Value::Text(avatar.clone()));
        }
        if set_parts.is_empty() {
            return Ok(());
        }
        bind_values.push(Value::Text(id.to_string()));

        let tx = self.conn.unchecked_transaction()?;
        let changed = tx.execute(
            &format!("UPDATE students SET {} WHERE id = ?", set_parts.join(", ")),
            params_from_iter(bind_values),
        )?;
        if changed == 0 {
            anyhow::bail!("student not found in remote store: {id}");
        }
        tx.execute(
            "INSERT INTO change_log(tbl, op, row_id) VALUES('students', 'update', ?)",
            [id],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn update_class(&mut self, id: &str, name: &str) -> anyhow::Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        let changed = tx.execute("UPDATE classes SET name = ? WHERE id = ?", (name, id))?;
        if changed == 0 {
            anyhow::bail!("class not found in remote store: {id}");
        }
        tx.execute(
            "INSERT INTO change_log(tbl, op, row_id) VALUES('classes', 'update', ?)",
            [id],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn delete_student(&mut self, id: &str) -> anyhow::Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM students WHERE id = ?", [id])?;
        tx.execute(
            "INSERT INTO change_log(tbl, op, row_id) VALUES('students', 'delete', ?)",
            [id],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn delete_class(&mut self, id: &str) -> anyhow::Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM classes WHERE id = ?", [id])?;
        tx.execute(
            "INSERT INTO change_log(tbl, op, row_id) VALUES('classes', 'delete', ?)",
            [id],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn delete_points_for_student(&mut self, student_id: &str) -> anyhow::Result<()> {
        // No change_log entry: point deletion only happens inside student
        // deletion, and consumers resync the roster off that event anyway.
        self.conn
            .execute("DELETE FROM points WHERE student_id = ?", [student_id])?;
        Ok(())
    }

    fn delete_attendance_for_student(&mut self, student_id: &str) -> anyhow::Result<()> {
        self.conn
            .execute("DELETE FROM attendance WHERE student_id = ?", [student_id])?;
        Ok(())
    }

    fn poll_changes(&mut self) -> anyhow::Result<Vec<ChangeEvent>> {
        let mut stmt = self.conn.prepare(
            "SELECT seq, tbl, op, row_id FROM change_log WHERE seq > ? ORDER BY seq",
        )?;
        let rows = stmt
            .query_map([self.cursor], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        drop(stmt);

        let mut events: Vec<ChangeEvent> = Vec::new();
        let mut students_changed = false;
        let mut classes_changed = false;
        let mut last_seq = self.cursor;
        for (seq, tbl, op, row_id) in rows {
            last_seq = seq;
            match tbl.as_str() {
                "points" if op == "insert" => {
                    // The row may already be gone if its student was deleted
                    // between the log entry and this poll; skip silently.
                    if let Some(rec) = self.fetch_point_row(&row_id)? {
                        events.push(ChangeEvent::PointInserted(rec));
                    }
                }
                "students" => students_changed = true,
                "classes" => classes_changed = true,
                _ => {}
            }
        }
        if students_changed {
            events.push(ChangeEvent::StudentsChanged);
        }
        if classes_changed {
            events.push(ChangeEvent::ClassesChanged);
        }
        self.cursor = last_seq;
        Ok(events)
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashSet;
    use std::rc::Rc;

    /// In-memory remote with injectable per-operation failures and a shared
    /// operation log. Both handles are `Rc`-shared so tests can assert call
    /// order or flip a failure on after the remote has been boxed away.
    #[derive(Default)]
    pub struct MemoryRemote {
        pub students: Vec<Student>,
        pub classes: Vec<ClassGroup>,
        pub points: Vec<PointRecord>,
        pub queued: Vec<ChangeEvent>,
        pub ops: Rc<RefCell<Vec<String>>>,
        pub fail: Rc<RefCell<HashSet<&'static str>>>,
    }

    impl MemoryRemote {
        fn gate(&mut self, op: &'static str) -> anyhow::Result<()> {
            self.ops.borrow_mut().push(op.to_string());
            if self.fail.borrow().contains(op) {
                anyhow::bail!("injected failure: {op}");
            }
            Ok(())
        }
    }

    impl RemoteStore for MemoryRemote {
        fn fetch_students(&self) -> anyhow::Result<Vec<Student>> {
            if self.fail.borrow().contains("fetch") {
                anyhow::bail!("injected failure: fetch");
            }
            Ok(self.students.clone())
        }

        fn fetch_classes(&self) -> anyhow::Result<Vec<ClassGroup>> {
            if self.fail.borrow().contains("fetch") {
                anyhow::bail!("injected failure: fetch");
            }
            Ok(self.classes.clone())
        }

        fn fetch_points(&self) -> anyhow::Result<Vec<PointRecord>> {
            if self.fail.borrow().contains("fetch") {
                anyhow::bail!("injected failure: fetch");
            }
            let mut pts = self.points.clone();
            pts.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
            Ok(pts)
        }

        fn insert_point(&mut self, record: &PointRecord) -> anyhow::Result<()> {
            self.gate("insert_point")?;
            self.points.push(record.clone());
            Ok(())
        }

        fn insert_student(&mut self, student: &Student) -> anyhow::Result<()> {
            self.gate("insert_student")?;
            self.students.push(student.clone());
            Ok(())
        }

        fn insert_class(&mut self, class: &ClassGroup) -> anyhow::Result<()> {
            self.gate("insert_class")?;
            self.classes.push(class.clone());
            Ok(())
        }

        fn update_student(&mut self, id: &str, patch: &StudentPatch) -> anyhow::Result<()> {
            self.gate("update_student")?;
            let Some(s) = self.students.iter_mut().find(|s| s.id == id) else {
                anyhow::bail!("student not found: {id}");
            };
            if let Some(name) = &patch.name {
                s.name = name.clone();
            }
            if let Some(class_id) = &patch.class_id {
                s.class_id = class_id.clone();
            }
            if let Some(avatar) = &patch.avatar {
                s.avatar = Some(avatar.clone());
            }
            Ok(())
        }

        fn update_class(&mut self, id: &str, name: &str) -> anyhow::Result<()> {
            self.gate("update_class")?;
            let Some(c) = self.classes.iter_mut().find(|c| c.id == id) else {
                anyhow::bail!("class not found: {id}");
            };
            c.name = name.to_string();
            Ok(())
        }

        fn delete_student(&mut self, id: &str) -> anyhow::Result<()> {
            self.gate("delete_student")?;
            self.students.retain(|s| s.id != id);
            Ok(())
        }

        fn delete_class(&mut self, id: &str) -> anyhow::Result<()> {
            self.gate("delete_class")?;
            self.classes.retain(|c| c.id != id);
            Ok(())
        }

        fn delete_points_for_student(&mut self, student_id: &str) -> anyhow::Result<()> {
            self.gate("delete_points_for_student")?;
            self.points.retain(|p| p.student_id != student_id);
            Ok(())
        }

        fn delete_attendance_for_student(&mut self, _student_id: &str) -> anyhow::Result<()> {
            self.gate("delete_attendance_for_student")?;
            Ok(())
        }

        fn poll_changes(&mut self) -> anyhow::Result<Vec<ChangeEvent>> {
            if self.fail.borrow().contains("poll") {
                anyhow::bail!("injected failure: poll");
            }
            Ok(std::mem::take(&mut self.queued))
        }
    }
}
