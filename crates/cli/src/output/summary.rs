//! End-of-run summary

use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL};
use seg_core::{RunReport, RunState};
use serde::Serialize;

use super::Formatter;

/// One failed object, for operators to reconcile
#[derive(Debug, Serialize)]
pub struct FailureEntry {
    pub key: String,
    pub destination: String,
    pub status: String,
    pub error: Option<String>,
}

/// Summary printed after a run (JSON or table)
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub state: String,
    pub reference_date: String,
    pub loops: usize,
    pub processed: usize,
    pub segregated: usize,
    pub errored: usize,
    pub copy_failures: usize,
    pub partial_moves: usize,
    pub more_may_remain: bool,
    pub dry_run: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abort_reason: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<FailureEntry>,
}

impl RunSummary {
    pub fn from_report(report: &RunReport, dry_run: bool) -> Self {
        let mut failures: Vec<FailureEntry> = report
            .failures()
            .map(|o| FailureEntry {
                key: o.key.clone(),
                destination: o.destination.to_string(),
                status: o.status.to_string(),
                error: o.status.error().map(str::to_string),
            })
            .collect();
        failures.sort_by(|a, b| a.key.cmp(&b.key));

        Self {
            state: report.state.to_string(),
            reference_date: report.reference_date.to_string(),
            loops: report.loops,
            processed: report.processed(),
            segregated: report.segregated(),
            errored: report.errored(),
            copy_failures: report.copy_failures(),
            partial_moves: report.partial_moves(),
            more_may_remain: report.more_may_remain,
            dry_run,
            abort_reason: report.abort_reason.clone(),
            failures,
        }
    }

    pub fn print(&self, formatter: &Formatter) {
        if formatter.is_json() {
            formatter.json(self);
            return;
        }

        let state = if self.state == RunState::Done.to_string() {
            formatter.style_success(&self.state)
        } else {
            formatter.style_error(&self.state)
        };

        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);

        let rows = [
            ("state", state),
            ("reference date", self.reference_date.clone()),
            ("loops", self.loops.to_string()),
            ("processed", self.processed.to_string()),
            ("segregated", self.segregated.to_string()),
            ("routed to error prefix", self.errored.to_string()),
            ("copy failures", self.copy_failures.to_string()),
            ("partial moves", self.partial_moves.to_string()),
        ];
        for (key, value) in rows {
            table.add_row(vec![formatter.style_key(key), value]);
        }
        formatter.println(&table.to_string());

        for failure in &self.failures {
            formatter.warning(&format!(
                "{}: {} -> {} ({})",
                failure.status,
                failure.key,
                failure.destination,
                failure.error.as_deref().unwrap_or("unknown error")
            ));
        }
        if self.more_may_remain {
            formatter.warning("Loop ceiling reached; more objects may remain in the source prefix");
        }
        if self.dry_run {
            formatter.println("Dry run: no objects were copied or deleted");
        }
        if let Some(reason) = &self.abort_reason {
            formatter.error(&format!("Run aborted: {reason}"));
        }
    }
}
