//! Console-backed notifier and picker for interactive commands.
//!
//! Prompts go to stderr so stdout stays clean for `--json`. An empty answer or end of input
//! counts as dismissal.

use async_trait::async_trait;
use console::{style, Term};
use paramlink_association::{Notifier, PickItem, PickOptions, Picker};
use std::io;
use std::path::{Path, PathBuf};

#[derive(Clone)]
pub(crate) struct ConsoleNotifier {
    term: Term,
}

impl ConsoleNotifier {
    pub(crate) fn new() -> Self {
        Self {
            term: Term::stderr(),
        }
    }
}

#[async_trait]
impl Notifier for ConsoleNotifier {
    async fn ask(&self, message: &str, buttons: &[&str]) -> Option<String> {
        let term = self.term.clone();
        let message = message.to_string();
        let buttons: Vec<String> = buttons.iter().map(|b| b.to_string()).collect();
        run_blocking(move || {
            term.write_line("")?;
            term.write_line(&format!("{}", style(&message).bold()))?;
            for (i, button) in buttons.iter().enumerate() {
                term.write_line(&format!("  [{}] {button}", style(i + 1).cyan().bold()))?;
            }
            loop {
                let Some(answer) = prompt_line(&term, &format!("Select (1-{}): ", buttons.len()))?
                else {
                    return Ok(None);
                };
                if let Some(button) = match_choice(&answer, &buttons) {
                    return Ok(Some(button.clone()));
                }
                term.write_line(&format!(
                    "{}",
                    style(format!("Please enter a number between 1 and {}", buttons.len())).red()
                ))?;
            }
        })
        .await
    }

    async fn inform(&self, message: &str) {
        let term = self.term.clone();
        let message = message.to_string();
        run_blocking(move || {
            term.write_line(&format!("{}", style(message).dim()))?;
            Ok(Some(()))
        })
        .await;
    }
}

#[derive(Clone)]
pub(crate) struct ConsolePicker {
    term: Term,
}

impl ConsolePicker {
    pub(crate) fn new() -> Self {
        Self {
            term: Term::stderr(),
        }
    }
}

#[async_trait]
impl Picker for ConsolePicker {
    async fn pick(&self, items: &[PickItem], options: &PickOptions) -> Option<PickItem> {
        let term = self.term.clone();
        let items = items.to_vec();
        let placeholder = options.placeholder.clone();
        run_blocking(move || {
            term.write_line("")?;
            term.write_line(&format!("{}", style(&placeholder).bold()))?;
            for (i, item) in items.iter().enumerate() {
                let description = item
                    .description
                    .as_deref()
                    .map(|d| format!(" {}", style(d).dim()))
                    .unwrap_or_default();
                term.write_line(&format!(
                    "  [{}] {}{description}",
                    style(i + 1).cyan().bold(),
                    item.label
                ))?;
            }
            loop {
                let Some(answer) = prompt_line(&term, &format!("Select (1-{}): ", items.len()))?
                else {
                    return Ok(None);
                };
                match answer.parse::<usize>() {
                    Ok(n) if (1..=items.len()).contains(&n) => return Ok(Some(items[n - 1].clone())),
                    _ => term.write_line(&format!(
                        "{}",
                        style(format!("Please enter a number between 1 and {}", items.len())).red()
                    ))?,
                }
            }
        })
        .await
    }

    async fn browse_for_file(&self, start_dir: &Path) -> Option<PathBuf> {
        let term = self.term.clone();
        let start_dir = start_dir.to_path_buf();
        run_blocking(move || {
            let prompt = format!("Parameter file (relative to {}): ", start_dir.display());
            Ok(prompt_line(&term, &prompt)?.map(|answer| start_dir.join(answer)))
        })
        .await
    }
}

/// Reads one trimmed line; `None` on empty input or end of input.
fn prompt_line(term: &Term, prompt: &str) -> io::Result<Option<String>> {
    term.write_str(&format!("{}", style(prompt).cyan()))?;
    term.flush()?;
    // Piped answers must work too, so read stdin directly rather than through the terminal.
    let mut input = String::new();
    if io::stdin().read_line(&mut input)? == 0 {
        return Ok(None);
    }
    let answer = input.trim();
    Ok((!answer.is_empty()).then(|| answer.to_string()))
}

/// Accepts a 1-based index or a case-insensitive button label.
fn match_choice<'a>(answer: &str, buttons: &'a [String]) -> Option<&'a String> {
    if let Ok(n) = answer.parse::<usize>() {
        return n.checked_sub(1).and_then(|idx| buttons.get(idx));
    }
    buttons
        .iter()
        .find(|button| button.eq_ignore_ascii_case(answer))
}

/// Terminal reads block; keep them off the runtime threads. I/O failures count as dismissal.
async fn run_blocking<T, F>(f: F) -> Option<T>
where
    T: Send + 'static,
    F: FnOnce() -> io::Result<Option<T>> + Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(Ok(value)) => value,
        Ok(Err(err)) => {
            log::warn!("Console interaction failed: {err}");
            None
        }
        Err(err) => {
            log::warn!("Console interaction task failed: {err}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn choices_accept_index_or_label() {
        let buttons = vec![
            "Yes".to_string(),
            "No".to_string(),
            "Choose file...".to_string(),
        ];
        assert_eq!(match_choice("1", &buttons).map(String::as_str), Some("Yes"));
        assert_eq!(match_choice("no", &buttons).map(String::as_str), Some("No"));
        assert_eq!(
            match_choice("choose file...", &buttons).map(String::as_str),
            Some("Choose file...")
        );
        assert_eq!(match_choice("0", &buttons), None);
        assert_eq!(match_choice("4", &buttons), None);
        assert_eq!(match_choice("maybe", &buttons), None);
    }
}
