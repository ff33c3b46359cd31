// Listing projects, tags and recorded entries.

use crate::api::{ApiClient, ApiRequest, Transport};
use crate::error::{ApiError, FreckError, FreckResult};
use chrono::NaiveDate;
use serde::Deserialize;

/// One name in a project or tag listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingLine {
    pub name: String,
    pub is_default: bool,
}

/// Render a listing under a heading, marking defaults with `*`.
pub fn render_listing(heading: &str, lines: &[ListingLine]) -> String {
    let mut out = format!("{heading}\n");
    for line in lines {
        let marker = if line.is_default { "* " } else { "  " };
        out.push_str(marker);
        out.push_str(&line.name);
        out.push('\n');
    }
    out
}

/// All projects, sorted by name, with the configured default marked.
pub fn list_projects<T: Transport>(api: &mut ApiClient<T>) -> Result<Vec<ListingLine>, ApiError> {
    let default = api.config().default_project().map(str::to_string);
    let projects = api.projects()?;
    Ok(projects
        .keys()
        .map(|name| ListingLine {
            name: name.clone(),
            is_default: default.as_deref() == Some(name.as_str()),
        })
        .collect())
}

/// All tags, sorted by name; every tag in the default tag list is marked.
pub fn list_tags<T: Transport>(api: &mut ApiClient<T>) -> Result<Vec<ListingLine>, ApiError> {
    let defaults: Vec<String> = split_tags(api.config().default_tags())
        .map(str::to_string)
        .collect();
    let tags = api.tags()?;
    Ok(tags
        .keys()
        .map(|name| ListingLine {
            name: name.clone(),
            is_default: defaults.iter().any(|d| d == name),
        })
        .collect())
}

pub fn projects_heading<T: Transport>(api: &ApiClient<T>) -> String {
    format!("Projects for {}.{}:", api.config().subdomain(), api.host())
}

pub fn tags_heading<T: Transport>(api: &ApiClient<T>) -> String {
    format!("Tags for {}.{}:", api.config().subdomain(), api.host())
}

/// Non-empty, trimmed fragments of a comma-separated tag string.
pub fn split_tags(tags: &str) -> impl Iterator<Item = &str> {
    tags.split(',').map(str::trim).filter(|t| !t.is_empty())
}

#[derive(Deserialize, Debug, Clone)]
struct EntryEnvelope {
    entry: EntryRecord,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct NamedRef {
    pub name: String,
}

/// An entry as returned by the listing endpoint.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct EntryRecord {
    pub minutes: i64,
    #[serde(default)]
    pub description: String,
    pub created_at: String,
    #[serde(default)]
    pub project: Option<NamedRef>,
    #[serde(default)]
    pub tags: Vec<NamedRef>,
}

/// Entries in a date range, oldest first, with their total duration.
#[derive(Debug, Clone)]
pub struct EntryReport {
    pub heading: String,
    pub entries: Vec<EntryRecord>,
    pub total_minutes: i64,
}

impl EntryReport {
    pub fn new(heading: impl Into<String>, mut entries: Vec<EntryRecord>) -> Self {
        entries.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        let total_minutes = entries.iter().map(|e| e.minutes).sum();
        EntryReport {
            heading: heading.into(),
            entries,
            total_minutes,
        }
    }

    /// Tab-separated rows, project and tag columns padded to the widest
    /// value, followed by the total.
    pub fn render(&self) -> String {
        let rows: Vec<(String, String, String, String)> = self
            .entries
            .iter()
            .map(|e| {
                (
                    format_minutes(e.minutes),
                    project_name(e).to_string(),
                    format_tags(&e.tags),
                    clean_description(e),
                )
            })
            .collect();
        let project_width = rows.iter().map(|r| r.1.chars().count()).max().unwrap_or(0);
        let tags_width = rows.iter().map(|r| r.2.chars().count()).max().unwrap_or(0);

        let mut out = format!("{}\n", self.heading);
        for (time, project, tags, description) in rows {
            out.push_str(&format!(
                "{time}\t{project:<project_width$}\t{tags:<tags_width$}\t{description}\n"
            ));
        }
        out.push_str(&format!("{} total\n", format_minutes(self.total_minutes)));
        out
    }
}

fn project_name(entry: &EntryRecord) -> &str {
    entry.project.as_ref().map(|p| p.name.as_str()).unwrap_or("-")
}

/// Query the entries recorded by `user_id` (default: the configured
/// user) between two dates. A missing bound defaults to `today`.
pub fn list_entries<T: Transport>(
    api: &ApiClient<T>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    user_id: Option<&str>,
    today: NaiveDate,
) -> FreckResult<EntryReport> {
    let user_id = user_id
        .or(api.config().user_id.as_deref())
        .filter(|id| !id.is_empty())
        .ok_or(FreckError::NoUserId)?;

    let heading = match (from, to) {
        (None, None) => "Today's entries:".to_string(),
        (Some(f), Some(t)) if f == t => format!("Entries on {f}:"),
        (f, t) => format!("Entries {}-{}:", f.unwrap_or(today), t.unwrap_or(today)),
    };
    let from = from.unwrap_or(today);
    let to = to.unwrap_or(today);

    let request = ApiRequest::new(["entries"])
        .query("search[people]", user_id)
        .query("search[from]", from.to_string())
        .query("search[to]", to.to_string());
    let value = api.request(&request)?.unwrap_or_else(|| serde_json::json!([]));
    let envelopes: Vec<EntryEnvelope> =
        serde_json::from_value(value).map_err(|e| ApiError::Decode(e.to_string()))?;

    Ok(EntryReport::new(
        heading,
        envelopes.into_iter().map(|e| e.entry).collect(),
    ))
}

/// `45m`, `2h`, `1h15m`.
pub fn format_minutes(minutes: i64) -> String {
    let (h, m) = (minutes / 60, minutes % 60);
    match (h, m) {
        (0, m) => format!("{m}m"),
        (h, 0) => format!("{h}h"),
        (h, m) => format!("{h}h{m}m"),
    }
}

pub fn format_tags(tags: &[NamedRef]) -> String {
    tags.iter()
        .map(|t| format!("#{}", t.name))
        .collect::<Vec<_>>()
        .join(" ")
}

/// The entry description with every echoed tag name removed, leading
/// `, # * !` and spaces stripped, and dangling separators dropped from
/// the end.
pub fn clean_description(entry: &EntryRecord) -> String {
    let mut description = entry.description.clone();
    for tag in &entry.tags {
        description = description.replace(&tag.name, "");
    }
    description
        .trim_start_matches(&[' ', ',', '#', '*', '!'][..])
        .trim_end_matches(&[' ', ',', '#'][..])
        .to_string()
}
