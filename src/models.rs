use serde::{Deserialize, Serialize};

// Canonical job record: every field is present once a raw feed entry has
// been through normalize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub id: String,
    pub title: String,
    pub company: String,
    pub salary: String,
    pub deadline: String,
    pub posted_days_ago: u32,
    pub location: String,
    pub employment_type: String,
    pub level: String,
    pub description: String,
    pub responsibilities: Vec<String>,
    pub requirements: Vec<String>,
}

// The all-jobs page and the saved page keep independent expanded cards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListContext {
    AllJobs,
    Saved,
}
