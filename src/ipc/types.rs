use std::path::PathBuf;

use serde::Deserialize;

use crate::auth::TeacherDirectory;
use crate::model::Teacher;
use crate::sync::SyncService;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub sync: Option<SyncService>,
    pub teachers: TeacherDirectory,
    pub current_user: Option<Teacher>,
}

impl AppState {
    pub fn new() -> AppState {
        AppState {
            workspace: None,
            sync: None,
            teachers: TeacherDirectory::default(),
            current_user: None,
        }
    }
}
