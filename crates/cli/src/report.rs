use anyhow::Result;
use paramlink_association::{ReconcileOutcome, SelectionOutcome, SkipReason};
use serde::Serialize;
use std::io::{self, Write};
use std::path::PathBuf;

#[derive(Serialize)]
pub(crate) struct ResolveReport {
    pub template: PathBuf,
    pub parameters: Option<PathBuf>,
}

#[derive(Serialize)]
pub(crate) struct ReverseReport {
    pub parameters: PathBuf,
    pub template: Option<PathBuf>,
}

#[derive(Serialize)]
pub(crate) struct SniffReport {
    pub path: PathBuf,
    pub is_parameters: bool,
    pub bytes_read: u64,
    pub strict_schema: bool,
}

#[derive(Serialize)]
pub(crate) struct ChangeReport {
    pub template: PathBuf,
    pub parameters: Option<PathBuf>,
}

pub(crate) fn print_stdout(text: &str) -> Result<()> {
    let mut stdout = io::stdout().lock();
    if let Err(err) = stdout
        .write_all(text.as_bytes())
        .and_then(|_| stdout.write_all(b"\n"))
        .and_then(|_| stdout.flush())
    {
        if err.kind() == io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        return Err(err.into());
    }
    Ok(())
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<()> {
    print_stdout(&serde_json::to_string_pretty(value)?)
}

pub(crate) fn describe_reconcile(outcome: &ReconcileOutcome) -> String {
    match outcome {
        ReconcileOutcome::Ignored => "Not a file-backed document".to_string(),
        ReconcileOutcome::AlreadyChecked => "Already checked in this session".to_string(),
        ReconcileOutcome::AlreadyAssociated { parameters } => {
            format!("Already associated with {}", parameters.display())
        }
        ReconcileOutcome::Skipped { reason } => describe_skip(*reason).to_string(),
        ReconcileOutcome::Associated { parameters } => {
            format!("Associated with {}", parameters.display())
        }
        ReconcileOutcome::Declined => "Declined; will not ask again for this template".to_string(),
        ReconcileOutcome::Dismissed => "Prompt dismissed".to_string(),
        ReconcileOutcome::Selected { selection } => describe_selection(selection),
    }
}

pub(crate) fn describe_selection(outcome: &SelectionOutcome) -> String {
    match outcome {
        SelectionOutcome::Associated { parameters } => {
            format!("Associated with {}", parameters.display())
        }
        SelectionOutcome::Cleared => "Association cleared".to_string(),
        SelectionOutcome::Unchanged => "Association unchanged".to_string(),
        SelectionOutcome::Cancelled => "Selection cancelled".to_string(),
        SelectionOutcome::WriteFailed => "Could not save the selection".to_string(),
    }
}

fn describe_skip(reason: SkipReason) -> &'static str {
    match reason {
        SkipReason::PromptingDisabled => "Suggestions are disabled in settings",
        SkipReason::DontAsk => "Suggestions were declined for this template",
        SkipReason::NoCloseMatch => "No similarly named parameter file found",
        SkipReason::WriteFailed => "Could not save the association",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_selection_is_described_by_its_outcome() {
        let outcome = ReconcileOutcome::Selected {
            selection: SelectionOutcome::Cleared,
        };
        assert_eq!(describe_reconcile(&outcome), "Association cleared");
        assert_eq!(
            describe_reconcile(&ReconcileOutcome::Skipped {
                reason: SkipReason::NoCloseMatch
            }),
            "No similarly named parameter file found"
        );
    }
}
