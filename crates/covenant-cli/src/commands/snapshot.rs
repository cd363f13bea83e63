//! Snapshot inspection commands: chain verification, decisions, audit trail.

use std::io::Write;
use std::path::Path;

use covenant_audit::AuditEntry;
use covenant_engine::GovernanceEngine;
use covenant_types::{Decision, DecisionId};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{CliError, CliResult};
use crate::output::{self, OutputFormat};

/// Restore an engine from a JSON snapshot on disk.
pub fn load_engine(path: &Path) -> CliResult<GovernanceEngine> {
    let json = std::fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let engine = GovernanceEngine::from_json(&json)?;
    debug!(
        path = %path.display(),
        entries = engine.audit_log().len(),
        "Snapshot loaded"
    );
    Ok(engine)
}

#[derive(Debug, Serialize)]
struct DecisionCheck {
    decision_id: DecisionId,
    ok: bool,
    reason: String,
}

#[derive(Debug, Serialize)]
struct VerifyReport {
    chain_valid: bool,
    chain_reason: String,
    entries: usize,
    decisions: Vec<DecisionCheck>,
}

impl VerifyReport {
    fn passed(&self) -> bool {
        self.chain_valid && self.decisions.iter().all(|d| d.ok)
    }
}

/// Verify the audit chain and every decision's audit trail and evidence.
/// Fails with [`CliError::VerificationFailed`] when anything does not hold.
pub fn verify(path: &Path, format: OutputFormat, out: &mut dyn Write) -> CliResult<()> {
    let engine = load_engine(path)?;
    let chain = engine.verify_audit_log();

    let decisions: Vec<DecisionCheck> = engine
        .decisions()
        .map(|decision| {
            let result = engine.verify_decision_audit(&decision.id);
            DecisionCheck {
                decision_id: decision.id.clone(),
                ok: result.legitimate,
                reason: result.reason,
            }
        })
        .collect();

    let report = VerifyReport {
        chain_valid: chain.legitimate,
        chain_reason: chain.reason,
        entries: engine.audit_log().len(),
        decisions,
    };

    match format {
        OutputFormat::Json => output::print_json(out, &report)?,
        OutputFormat::Text => {
            if report.chain_valid {
                output::print_success(out, &report.chain_reason)?;
            } else {
                output::print_failure(out, &report.chain_reason)?;
            }
            for check in &report.decisions {
                let line = format!("{}: {}", check.decision_id, check.reason);
                if check.ok {
                    output::print_success(out, &line)?;
                } else {
                    output::print_failure(out, &line)?;
                }
            }
        }
    }

    if report.passed() {
        Ok(())
    } else {
        let failed = report.decisions.iter().filter(|d| !d.ok).count();
        warn!(
            chain_valid = report.chain_valid,
            failed_decisions = failed,
            "Snapshot verification failed"
        );
        Err(CliError::VerificationFailed(format!(
            "{} (chain valid: {}, failed decisions: {failed})",
            path.display(),
            report.chain_valid
        )))
    }
}

#[derive(Debug, Serialize)]
struct DecisionRow {
    id: DecisionId,
    decision_type: String,
    state: String,
    votes: usize,
    approvals: usize,
    objections: usize,
    appeals: usize,
    executed: bool,
}

impl DecisionRow {
    fn new(engine: &GovernanceEngine, decision: &Decision) -> Self {
        Self {
            id: decision.id.clone(),
            decision_type: decision.decision_type.to_string(),
            state: decision.state.to_string(),
            votes: decision.votes.len(),
            approvals: decision.approving_votes().count(),
            objections: decision.objections.len(),
            appeals: decision.appeals.len(),
            executed: engine.evidence_package(&decision.id).is_some(),
        }
    }
}

/// List decisions, or print one decision with its evidence package.
pub fn decisions(
    path: &Path,
    id: Option<&str>,
    format: OutputFormat,
    out: &mut dyn Write,
) -> CliResult<()> {
    let engine = load_engine(path)?;

    if let Some(id) = id {
        let decision = find_decision(&engine, id)?;
        let detail = serde_json::json!({
            "decision": decision,
            "evidence_package": engine.evidence_package(&decision.id),
        });
        return output::print_json(out, &detail);
    }

    let rows: Vec<DecisionRow> = engine
        .decisions()
        .map(|decision| DecisionRow::new(&engine, decision))
        .collect();
    match format {
        OutputFormat::Json => output::print_json(out, &rows)?,
        OutputFormat::Text => {
            if rows.is_empty() {
                writeln!(out, "No decisions")?;
            }
            for row in &rows {
                writeln!(
                    out,
                    "{}  {}  {:<9}  votes {}/{}  objections {}  appeals {}",
                    row.id,
                    row.decision_type,
                    row.state,
                    row.approvals,
                    row.votes,
                    row.objections,
                    row.appeals
                )?;
            }
        }
    }
    Ok(())
}

/// Print audit entries, optionally only those about one decision.
pub fn audit(
    path: &Path,
    decision: Option<&str>,
    format: OutputFormat,
    out: &mut dyn Write,
) -> CliResult<()> {
    let engine = load_engine(path)?;
    let entries: Vec<AuditEntry> = match decision {
        Some(id) => {
            let decision = find_decision(&engine, id)?;
            engine.audit_log().get_entries_by_decision(&decision.id)
        }
        None => engine.audit_log().entries().to_vec(),
    };

    match format {
        OutputFormat::Json => output::print_json(out, &entries)?,
        OutputFormat::Text => {
            for entry in &entries {
                writeln!(
                    out,
                    "{}  {:<22}  {}",
                    entry.timestamp.to_rfc3339(),
                    entry.event_type.as_str(),
                    entry.summary
                )?;
            }
        }
    }
    Ok(())
}

fn find_decision<'a>(engine: &'a GovernanceEngine, id: &str) -> CliResult<&'a Decision> {
    engine
        .decisions()
        .find(|decision| decision.id.to_string() == id)
        .ok_or_else(|| CliError::NotFound(format!("decision {id}")))
}
