//! # Paramlink Association
//!
//! Remembers which parameter file belongs to which template and asks the user when a
//! likely match shows up.
//!
//! ## Architecture
//!
//! ```text
//! Document opened / saved
//!     │
//!     ├──> Session (checked + suppressed templates, in memory)
//!     │
//!     ├──> AssociationStore ──> ScopeStack (user < workspace, one writer)
//!     │
//!     ├──> DontAskList ──> GlobalState
//!     │
//!     ├──> CandidateFinder (paramlink-discovery)
//!     │
//!     └──> Notifier / Picker (ranked manual selection)
//! ```

mod error;
mod interaction;
mod json_doc;
mod ranking;
mod scope;
mod state;
mod store;
mod workflow;

pub use error::{AssociationError, Result, WorkflowError};
pub use interaction::{Notifier, PickOptions, Picker};
pub use ranking::{
    rank_selection, PickItem, PickKind, BROWSE_LABEL, CURRENT_DESCRIPTION, NONE_LABEL,
    SIMILAR_NAME_DESCRIPTION,
};
pub use scope::{
    ConfigScope, JsonFileScope, MemoryScope, ScopeStack, ValueUpdate, WritableScope,
};
pub use state::{DontAskList, GlobalState, JsonFileState, MemoryState};
pub use store::{AssociationStore, ResolvedAssociation};
pub use workflow::{
    best_close_match, plan, Decision, PlanInput, ReconcileOutcome, Reconciler, SelectionOutcome,
    Session, SkipReason, TemplateState, ACCEPT_BUTTON, CHOOSE_BUTTON, DECLINE_BUTTON,
};
