use crate::model::Teacher;

/// Static teacher directory: identities keyed by a short numeric PIN.
/// No hashing, lockout or rate limiting.
pub struct TeacherDirectory {
    teachers: Vec<Teacher>,
}

impl Default for TeacherDirectory {
    fn default() -> TeacherDirectory {
        TeacherDirectory {
            teachers: vec![
                Teacher {
                    id: "t1".to_string(),
                    name: "Admin".to_string(),
                    pin: "1234".to_string(),
                },
                Teacher {
                    id: "t2".to_string(),
                    name: "李老师".to_string(),
                    pin: "0000".to_string(),
                },
            ],
        }
    }
}

impl TeacherDirectory {
    pub fn login(&self, pin: &str) -> Option<&Teacher> {
        self.teachers.iter().find(|t| t.pin == pin)
    }
}
