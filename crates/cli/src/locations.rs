use anyhow::{anyhow, Context as AnyhowContext, Result};
use std::path::{Path, PathBuf};

pub(crate) const USER_SCOPE: &str = "user";
pub(crate) const WORKSPACE_SCOPE: &str = "workspace";

const APP_DIR: &str = "paramlink";
const SETTINGS_FILE: &str = "settings.json";
const STATE_FILE: &str = "state.json";
const WORKSPACE_DIR: &str = ".paramlink";

/// Files backing the user scope, the workspace scope and global state.
#[derive(Debug, Clone)]
pub(crate) struct Locations {
    /// `None` when the platform has no config directory and no override was given.
    pub user_settings: Option<PathBuf>,
    pub workspace_settings: PathBuf,
    pub state_file: PathBuf,
}

impl Locations {
    pub(crate) fn resolve(
        workspace: Option<&Path>,
        user_settings: Option<&Path>,
        state_file: Option<&Path>,
    ) -> Result<Self> {
        let workspace = match workspace {
            Some(dir) => absolutize(dir)?,
            None => std::env::current_dir().context("Failed to read current directory")?,
        };
        let user_settings = match user_settings {
            Some(path) => Some(absolutize(path)?),
            None => dirs::config_dir().map(|dir| dir.join(APP_DIR).join(SETTINGS_FILE)),
        };
        let state_file = match state_file {
            Some(path) => absolutize(path)?,
            None => dirs::data_dir()
                .map(|dir| dir.join(APP_DIR).join(STATE_FILE))
                .ok_or_else(|| anyhow!("No data directory on this platform; pass --state-file"))?,
        };

        Ok(Self {
            user_settings,
            workspace_settings: workspace.join(WORKSPACE_DIR).join(SETTINGS_FILE),
            state_file,
        })
    }
}

/// Anchors a relative path at the current directory without touching the filesystem.
pub(crate) fn absolutize(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).with_context(|| format!("Invalid path {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_win_and_workspace_file_is_nested() {
        let locations = Locations::resolve(
            Some(Path::new("/work/repo")),
            Some(Path::new("/cfg/user.json")),
            Some(Path::new("/data/state.json")),
        )
        .unwrap();

        assert_eq!(
            locations.workspace_settings,
            PathBuf::from("/work/repo/.paramlink/settings.json")
        );
        assert_eq!(locations.user_settings, Some(PathBuf::from("/cfg/user.json")));
        assert_eq!(locations.state_file, PathBuf::from("/data/state.json"));
    }

    #[test]
    fn relative_paths_are_anchored() {
        let path = absolutize(Path::new("infra/web.json")).unwrap();
        assert!(path.is_absolute());
        assert!(path.ends_with("infra/web.json"));
    }
}
