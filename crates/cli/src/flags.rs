use clap::ValueEnum;
use paramlink_association::WritableScope;

use crate::locations::{USER_SCOPE, WORKSPACE_SCOPE};

#[derive(Copy, Clone, ValueEnum)]
pub(crate) enum WriteScopeFlag {
    User,
    Workspace,
}

impl WriteScopeFlag {
    pub(crate) fn as_domain(self) -> WritableScope {
        match self {
            WriteScopeFlag::User => WritableScope::Named(USER_SCOPE.to_string()),
            WriteScopeFlag::Workspace => WritableScope::Named(WORKSPACE_SCOPE.to_string()),
        }
    }
}
