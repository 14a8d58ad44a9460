use crate::check::ProjectReport;
use crate::crawler::AggregateReport;
use anyhow::Result;
use serde::Serialize;

/// JSON shape of a `govuln run`.
#[derive(Serialize)]
pub struct RunReport<'a> {
    pub project: &'a ProjectReport,
    pub submodules: Option<&'a AggregateReport>,
}

pub fn render_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}
