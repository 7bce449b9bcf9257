use crate::ranking::PickItem;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickOptions {
    pub placeholder: String,
    /// When false the picker must not pre-select the previous choice.
    pub remember_last: bool,
}

/// Presents a ranked list and returns one item, or `None` when dismissed.
#[async_trait]
pub trait Picker: Send + Sync {
    async fn pick(&self, items: &[PickItem], options: &PickOptions) -> Option<PickItem>;

    async fn browse_for_file(&self, start_dir: &Path) -> Option<PathBuf>;
}

/// Shows a message with named buttons and returns the chosen label, or `None` when dismissed.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn ask(&self, message: &str, buttons: &[&str]) -> Option<String>;

    async fn inform(&self, message: &str);
}
