// Recording a new time entry.

use crate::admin::split_tags;
use crate::api::{ApiClient, ApiRequest, Transport};
use crate::error::{FreckError, FreckResult};
use chrono::NaiveDate;
use serde::Serialize;

/// What the caller wants recorded. Everything but `time` falls back to
/// the configuration when left out.
#[derive(Debug, Clone, Default)]
pub struct NewEntry {
    /// Duration as typed, e.g. `90` or `1h30m`; the service parses it.
    pub time: String,
    pub description: String,
    /// Comma-separated tags replacing the configured default tags.
    pub tags: Option<String>,
    pub project: Option<String>,
    pub date: Option<NaiveDate>,
    /// Email of the user to record for, if not the configured one.
    pub user: Option<String>,
}

/// Body of `POST entries.json`.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct EntryPayload {
    pub user: String,
    pub minutes: String,
    pub project_id: u64,
    pub description: String,
    pub allow_hashtags: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

/// Prefix `description` with one `#tag` per comma-separated tag.
pub fn compose_description(tags: &str, description: &str) -> String {
    let hashtags: Vec<String> = split_tags(tags).map(|t| format!("#{t}")).collect();
    let mut parts = Vec::new();
    if !hashtags.is_empty() {
        parts.push(hashtags.join(" "));
    }
    if !description.is_empty() {
        parts.push(description.to_string());
    }
    parts.join(" ")
}

/// Build the payload for `entry` against the client's project cache.
pub fn build_payload<T: Transport>(
    api: &mut ApiClient<T>,
    entry: &NewEntry,
) -> FreckResult<(String, EntryPayload)> {
    let project = api.resolve_project_name(entry.project.as_deref())?;
    let project_id = api.projects()?.get(&project).copied();
    let Some(project_id) = project_id else {
        // Only the default project gets the "edit your config" hint.
        if api.config().default_project() == Some(project.as_str()) {
            return Err(FreckError::DefaultProjectNotFound(project));
        }
        return Err(FreckError::ProjectNotFound(project));
    };

    let config = api.config();
    let tags = entry.tags.as_deref().unwrap_or(config.default_tags());
    let payload = EntryPayload {
        user: entry
            .user
            .clone()
            .or_else(|| config.user.clone())
            .unwrap_or_default(),
        minutes: entry.time.clone(),
        project_id,
        description: compose_description(tags, &entry.description),
        allow_hashtags: true,
        date: entry.date.map(|d| d.format("%Y-%m-%d").to_string()),
    };
    Ok((project, payload))
}

/// Submit a new entry. Returns the project name it was recorded against.
pub fn create_entry<T: Transport>(api: &mut ApiClient<T>, entry: &NewEntry) -> FreckResult<String> {
    let (project, payload) = build_payload(api, entry)?;
    let body = serde_json::json!({ "entry": payload });

    api.request(&ApiRequest::new(["entries"]).body(body))
        .map_err(|e| FreckError::EntryCreation {
            time: entry.time.clone(),
            project: project.clone(),
            message: e.to_string(),
        })?;
    Ok(project)
}
