//! Reconciliation of a template with its parameter file on document open/save.
//!
//! ```text
//! Unchecked ──> Checking ──┬──> Resolved    (store already has an entry, or the user accepted)
//!                          ├──> Prompting   (a close-named candidate exists)
//!                          └──> Suppressed  (disabled, don't-ask, nothing to suggest, declined)
//! ```
//!
//! `Unchecked` and `Checking` are implicit (absent from the [`Session`], or mid-event);
//! [`TemplateState`] names where an event left the template.
//!
//! [`plan`] makes every decision without I/O; [`Reconciler`] gathers its inputs, awaits the
//! user and applies the effects.

use crate::interaction::{Notifier, PickOptions, Picker};
use crate::ranking::{rank_selection, PickKind};
use crate::state::DontAskList;
use crate::store::AssociationStore;
use crate::{AssociationError, WorkflowError};
use paramlink_discovery::CandidateFinder;
use paramlink_protocol::{
    relative_under, CandidateParametersFile, DocumentEvent, DocumentRef, PathKey,
    CHECK_FOR_MATCHING_SETTING,
};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub const ACCEPT_BUTTON: &str = "Yes";
pub const DECLINE_BUTTON: &str = "No";
pub const CHOOSE_BUTTON: &str = "Choose file...";

const MANUAL_ASSOCIATION_HINT: &str = "You can associate a parameter file at any time with \
`paramlink select <template>` or by editing \"paramlink.parameterFiles\" in your settings.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateState {
    Resolved,
    Prompting,
    Suppressed,
}

/// Per-session memory of which templates were already examined or settled.
///
/// Lives as long as the owning editor session; nothing here is persisted.
#[derive(Debug, Default)]
pub struct Session {
    inner: Mutex<SessionInner>,
}

#[derive(Debug, Default)]
struct SessionInner {
    checked: HashSet<PathKey>,
    suppressed: HashSet<PathKey>,
    hint_shown: bool,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the template as checked; false when it was already checked or suppressed.
    pub fn begin_check(&self, template: &Path) -> bool {
        let key = PathKey::new(template);
        let mut inner = self.lock();
        if inner.suppressed.contains(&key) {
            return false;
        }
        inner.checked.insert(key)
    }

    pub fn suppress(&self, template: &Path) {
        self.lock().suppressed.insert(PathKey::new(template));
    }

    pub fn is_suppressed(&self, template: &Path) -> bool {
        self.lock().suppressed.contains(&PathKey::new(template))
    }

    /// True exactly once per session.
    fn take_hint(&self) -> bool {
        let mut inner = self.lock();
        !std::mem::replace(&mut inner.hint_shown, true)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    PromptingDisabled,
    DontAsk,
    NoCloseMatch,
    WriteFailed,
}

/// Inputs to [`plan`]. `candidates` is `None` until the folder has been scanned.
#[derive(Debug, Clone, Copy)]
pub struct PlanInput<'a> {
    pub resolved: Option<&'a Path>,
    pub prompt_enabled: bool,
    pub dont_ask: bool,
    pub candidates: Option<&'a [CandidateParametersFile]>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    AlreadyAssociated(PathBuf),
    Skip(SkipReason),
    /// Every cheap gate passed; scan the folder and plan again.
    NeedCandidates,
    Suggest(CandidateParametersFile),
}

pub fn plan(input: &PlanInput<'_>) -> Decision {
    if let Some(resolved) = input.resolved {
        return Decision::AlreadyAssociated(resolved.to_path_buf());
    }
    if !input.prompt_enabled {
        return Decision::Skip(SkipReason::PromptingDisabled);
    }
    if input.dont_ask {
        return Decision::Skip(SkipReason::DontAsk);
    }
    let Some(candidates) = input.candidates else {
        return Decision::NeedCandidates;
    };
    match best_close_match(candidates) {
        Some(best) => Decision::Suggest(best.clone()),
        None => Decision::Skip(SkipReason::NoCloseMatch),
    }
}

/// The close name match with the shortest absolute path.
pub fn best_close_match(
    candidates: &[CandidateParametersFile],
) -> Option<&CandidateParametersFile> {
    candidates
        .iter()
        .filter(|candidate| candidate.is_close_name_match)
        .min_by(|a, b| {
            let (a_path, b_path) = (a.path.to_string_lossy(), b.path.to_string_lossy());
            a_path
                .len()
                .cmp(&b_path.len())
                .then_with(|| a_path.to_lowercase().cmp(&b_path.to_lowercase()))
        })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PromptResponse {
    Accept,
    Decline,
    ChooseDifferently,
}

impl PromptResponse {
    fn from_label(label: &str) -> Option<Self> {
        match label {
            ACCEPT_BUTTON => Some(Self::Accept),
            DECLINE_BUTTON => Some(Self::Decline),
            CHOOSE_BUTTON => Some(Self::ChooseDifferently),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SelectionOutcome {
    Associated { parameters: PathBuf },
    Cleared,
    Unchanged,
    Cancelled,
    WriteFailed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// Not a file-backed document.
    Ignored,
    AlreadyChecked,
    AlreadyAssociated { parameters: PathBuf },
    Skipped { reason: SkipReason },
    Associated { parameters: PathBuf },
    Declined,
    /// The prompt was dismissed; nothing was recorded.
    Dismissed,
    Selected { selection: SelectionOutcome },
}

impl ReconcileOutcome {
    /// Where the template ended up, or `None` when the event caused no transition.
    pub fn state(&self) -> Option<TemplateState> {
        let state = match self {
            Self::Ignored | Self::AlreadyChecked => return None,
            Self::AlreadyAssociated { .. } | Self::Associated { .. } => TemplateState::Resolved,
            Self::Skipped { .. } | Self::Declined => TemplateState::Suppressed,
            // Dismissal aborts the prompt without recording anything.
            Self::Dismissed => TemplateState::Prompting,
            Self::Selected { selection } => match selection {
                SelectionOutcome::Associated { .. } | SelectionOutcome::Unchanged => {
                    TemplateState::Resolved
                }
                SelectionOutcome::Cleared | SelectionOutcome::WriteFailed => {
                    TemplateState::Suppressed
                }
                SelectionOutcome::Cancelled => TemplateState::Prompting,
            },
        };
        Some(state)
    }
}

/// Drives the association workflow for one editor session.
pub struct Reconciler {
    store: AssociationStore,
    dont_ask: DontAskList,
    finder: CandidateFinder,
    notifier: Arc<dyn Notifier>,
    picker: Arc<dyn Picker>,
    session: Arc<Session>,
}

impl Reconciler {
    pub fn new(
        store: AssociationStore,
        dont_ask: DontAskList,
        finder: CandidateFinder,
        notifier: Arc<dyn Notifier>,
        picker: Arc<dyn Picker>,
    ) -> Self {
        Self {
            store,
            dont_ask,
            finder,
            notifier,
            picker,
            session: Arc::new(Session::new()),
        }
    }

    pub fn with_session(mut self, session: Arc<Session>) -> Self {
        self.session = session;
        self
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn store(&self) -> &AssociationStore {
        &self.store
    }

    /// Handles an open or save of `document`. Only a contract break by the notifier is an error.
    pub async fn on_document_event(
        &self,
        document: &DocumentRef,
        event: DocumentEvent,
    ) -> Result<ReconcileOutcome, WorkflowError> {
        if !document.is_file_backed() {
            return Ok(ReconcileOutcome::Ignored);
        }
        let template = document.path.as_path();
        if !self.session.begin_check(template) {
            return Ok(ReconcileOutcome::AlreadyChecked);
        }
        log::debug!("Checking parameter file for {} ({event:?})", template.display());

        let resolved = self.store.resolve(template).await;
        let mut input = PlanInput {
            resolved: resolved.as_deref(),
            prompt_enabled: true,
            dont_ask: false,
            candidates: None,
        };
        if let Some(decision) = self.settle(template, plan(&input)).await? {
            return Ok(decision);
        }

        input.prompt_enabled = self.prompt_enabled().await;
        if let Some(decision) = self.settle(template, plan(&input)).await? {
            return Ok(decision);
        }

        input.dont_ask = self.dont_ask.contains(template).await;
        if let Some(decision) = self.settle(template, plan(&input)).await? {
            return Ok(decision);
        }

        let candidates = self.finder.find_candidates(template).await;
        input.candidates = Some(&candidates);
        match self.settle(template, plan(&input)).await? {
            Some(decision) => Ok(decision),
            None => {
                log::error!("Planning did not settle once candidates were known");
                Ok(ReconcileOutcome::Skipped {
                    reason: SkipReason::NoCloseMatch,
                })
            }
        }
    }

    /// Manual selection: ranked picker, then the chosen association is written.
    pub async fn select_parameter_file(&self, template: &Path) -> SelectionOutcome {
        let candidates = self.finder.find_candidates(template).await;
        let current = self.store.resolve(template).await;
        let items = rank_selection(template, &candidates, current.as_deref());
        let options = PickOptions {
            placeholder: format!("Select a parameter file for {}", file_label(template)),
            remember_last: false,
        };

        let Some(choice) = self.picker.pick(&items, &options).await else {
            return SelectionOutcome::Cancelled;
        };
        let target = match choice.kind {
            PickKind::Parameters {
                is_current: true, ..
            } => return SelectionOutcome::Unchanged,
            PickKind::Parameters { path, .. } => Some(path),
            PickKind::None if current.is_none() => return SelectionOutcome::Unchanged,
            PickKind::None => None,
            PickKind::Browse => {
                let start = template.parent().unwrap_or(Path::new("."));
                match self.picker.browse_for_file(start).await {
                    Some(path) => Some(path),
                    None => return SelectionOutcome::Cancelled,
                }
            }
        };

        if let Err(err) = self.store.set(template, target.as_deref()).await {
            log::warn!(
                "Could not save parameter file selection for {}: {err}",
                template.display()
            );
            return SelectionOutcome::WriteFailed;
        }
        self.session.suppress(template);
        match target {
            Some(parameters) => SelectionOutcome::Associated { parameters },
            None => SelectionOutcome::Cleared,
        }
    }

    pub async fn reset_dont_ask(&self) -> Result<(), AssociationError> {
        self.dont_ask.reset().await
    }

    async fn prompt_enabled(&self) -> bool {
        match self.store.scopes().read_merged(CHECK_FOR_MATCHING_SETTING).await {
            Some(value) => value.as_bool().unwrap_or_else(|| {
                log::warn!("Ignoring non-boolean {CHECK_FOR_MATCHING_SETTING}: {value}");
                true
            }),
            None => true,
        }
    }

    /// Applies a decision. `None` means more input is needed.
    async fn settle(
        &self,
        template: &Path,
        decision: Decision,
    ) -> Result<Option<ReconcileOutcome>, WorkflowError> {
        let outcome = match decision {
            Decision::NeedCandidates => return Ok(None),
            Decision::AlreadyAssociated(parameters) => {
                ReconcileOutcome::AlreadyAssociated { parameters }
            }
            Decision::Skip(reason) => {
                log::debug!(
                    "Not suggesting a parameter file for {}: {reason:?}",
                    template.display()
                );
                ReconcileOutcome::Skipped { reason }
            }
            Decision::Suggest(candidate) => self.prompt(template, candidate).await?,
        };
        Ok(Some(outcome))
    }

    async fn prompt(
        &self,
        template: &Path,
        candidate: CandidateParametersFile,
    ) -> Result<ReconcileOutcome, WorkflowError> {
        let candidate_label = template
            .parent()
            .and_then(|dir| relative_under(dir, &candidate.path))
            .unwrap_or_else(|| candidate.path.display().to_string());
        let message = format!(
            "A parameter file \"{candidate_label}\" appears to match template \"{}\". \
Use it as the parameter file for this template?",
            file_label(template)
        );

        let Some(answer) = self
            .notifier
            .ask(&message, &[ACCEPT_BUTTON, DECLINE_BUTTON, CHOOSE_BUTTON])
            .await
        else {
            return Ok(ReconcileOutcome::Dismissed);
        };
        let Some(response) = PromptResponse::from_label(&answer) else {
            log::error!("Notification surface returned an unknown button {answer:?}");
            return Err(WorkflowError::UnexpectedResponse(answer));
        };

        let outcome = match response {
            PromptResponse::Accept => {
                self.session.suppress(template);
                match self.store.set(template, Some(&candidate.path)).await {
                    Ok(()) => ReconcileOutcome::Associated {
                        parameters: candidate.path,
                    },
                    Err(err) => {
                        log::warn!(
                            "Could not save parameter file association for {}: {err}",
                            template.display()
                        );
                        ReconcileOutcome::Skipped {
                            reason: SkipReason::WriteFailed,
                        }
                    }
                }
            }
            PromptResponse::Decline => {
                self.session.suppress(template);
                if let Err(err) = self.dont_ask.add(template).await {
                    log::warn!(
                        "Could not remember to stop asking about {}: {err}",
                        template.display()
                    );
                }
                if self.session.take_hint() {
                    self.notifier.inform(MANUAL_ASSOCIATION_HINT).await;
                }
                ReconcileOutcome::Declined
            }
            PromptResponse::ChooseDifferently => ReconcileOutcome::Selected {
                selection: self.select_parameter_file(template).await,
            },
        };
        Ok(outcome)
    }
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn candidate(path: &str, close: bool) -> CandidateParametersFile {
        CandidateParametersFile {
            path: PathBuf::from(path),
            is_close_name_match: close,
        }
    }

    fn input<'a>(candidates: Option<&'a [CandidateParametersFile]>) -> PlanInput<'a> {
        PlanInput {
            resolved: None,
            prompt_enabled: true,
            dont_ask: false,
            candidates,
        }
    }

    #[test]
    fn existing_association_wins_over_everything() {
        let mut plan_input = input(None);
        plan_input.resolved = Some(Path::new("/p/t.params.json"));
        plan_input.prompt_enabled = false;
        plan_input.dont_ask = true;
        assert_eq!(
            plan(&plan_input),
            Decision::AlreadyAssociated(PathBuf::from("/p/t.params.json"))
        );
    }

    #[test]
    fn gates_apply_in_order() {
        let mut plan_input = input(None);
        plan_input.prompt_enabled = false;
        plan_input.dont_ask = true;
        assert_eq!(
            plan(&plan_input),
            Decision::Skip(SkipReason::PromptingDisabled)
        );

        plan_input.prompt_enabled = true;
        assert_eq!(plan(&plan_input), Decision::Skip(SkipReason::DontAsk));

        plan_input.dont_ask = false;
        assert_eq!(plan(&plan_input), Decision::NeedCandidates);
    }

    #[test]
    fn no_close_match_means_nothing_to_suggest() {
        let candidates = vec![candidate("/p/other.json", false)];
        assert_eq!(
            plan(&input(Some(&candidates))),
            Decision::Skip(SkipReason::NoCloseMatch)
        );
    }

    #[test]
    fn shortest_close_match_is_suggested() {
        let candidates = vec![
            candidate("/p/t.parameters.prod.json", true),
            candidate("/p/a.json", false),
            candidate("/p/t.params.json", true),
            candidate("/p/t.dev.json", true),
        ];
        assert_eq!(
            plan(&input(Some(&candidates))),
            Decision::Suggest(candidate("/p/t.dev.json", true))
        );
    }

    #[test]
    fn session_checks_each_template_once() {
        let session = Session::new();
        assert!(session.begin_check(Path::new("/p/t.json")));
        assert!(!session.begin_check(Path::new("/P/T.json")));
        assert!(session.begin_check(Path::new("/p/u.json")));

        session.suppress(Path::new("/p/v.json"));
        assert!(!session.begin_check(Path::new("/p/v.json")));
        assert!(session.is_suppressed(Path::new(r"\p\v.json")));
    }

    #[test]
    fn hint_is_taken_once() {
        let session = Session::new();
        assert!(session.take_hint());
        assert!(!session.take_hint());
    }

    #[test]
    fn outcome_states_follow_the_state_machine() {
        assert_eq!(
            ReconcileOutcome::Associated {
                parameters: PathBuf::from("/p")
            }
            .state(),
            Some(TemplateState::Resolved)
        );
        assert_eq!(
            ReconcileOutcome::Declined.state(),
            Some(TemplateState::Suppressed)
        );
        assert_eq!(ReconcileOutcome::AlreadyChecked.state(), None);
        assert_eq!(
            ReconcileOutcome::Skipped {
                reason: SkipReason::NoCloseMatch
            }
            .state(),
            Some(TemplateState::Suppressed)
        );
    }
}
