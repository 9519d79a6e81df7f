//! Presentation interface.
//!
//! Dialogs are blocking: each call returns once the user has answered, with
//! `None` meaning the user cancelled.

use std::collections::VecDeque;
use std::path::PathBuf;

/// Request for a net name, with the choices to offer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamePrompt {
    pub title: String,
    pub tooltip: String,
    pub suggestions: Vec<String>,
}

pub trait Prompt {
    /// Ask for a net name. The user may pick a suggestion or type a new one.
    fn prompt_net_name(&mut self, request: &NamePrompt) -> Option<String>;

    /// Ask where to write the change log.
    fn prompt_dump_path(&mut self) -> Option<PathBuf>;

    fn show_error(&mut self, message: &str);
}

/// Prompt that replays prepared answers and records what it was asked.
///
/// Running out of answers counts as the user cancelling.
#[derive(Debug, Default, Clone)]
pub struct ScriptedPrompt {
    names: VecDeque<Option<String>>,
    paths: VecDeque<Option<PathBuf>>,
    requests: Vec<NamePrompt>,
    errors: Vec<String>,
}

impl ScriptedPrompt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a typed net name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.names.push_back(Some(name.into()));
        self
    }

    /// Queue a cancelled name dialog.
    pub fn with_cancel(mut self) -> Self {
        self.names.push_back(None);
        self
    }

    pub fn with_dump_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.paths.push_back(Some(path.into()));
        self
    }

    /// Name requests received so far, oldest first.
    pub fn requests(&self) -> &[NamePrompt] {
        &self.requests
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }
}

impl Prompt for ScriptedPrompt {
    fn prompt_net_name(&mut self, request: &NamePrompt) -> Option<String> {
        self.requests.push(request.clone());
        self.names.pop_front().flatten()
    }

    fn prompt_dump_path(&mut self) -> Option<PathBuf> {
        self.paths.pop_front().flatten()
    }

    fn show_error(&mut self, message: &str) {
        self.errors.push(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> NamePrompt {
        NamePrompt {
            title: "t".to_string(),
            tooltip: String::new(),
            suggestions: vec!["GND".to_string()],
        }
    }

    #[test]
    fn test_scripted_answers_in_order() {
        let mut prompt = ScriptedPrompt::new().with_name("A").with_cancel().with_name("B");
        assert_eq!(prompt.prompt_net_name(&request()), Some("A".to_string()));
        assert_eq!(prompt.prompt_net_name(&request()), None);
        assert_eq!(prompt.prompt_net_name(&request()), Some("B".to_string()));
        assert_eq!(prompt.prompt_net_name(&request()), None);
        assert_eq!(prompt.requests().len(), 4);
    }

    #[test]
    fn test_records_errors() {
        let mut prompt = ScriptedPrompt::new();
        prompt.show_error("boom");
        assert_eq!(prompt.errors(), ["boom".to_string()]);
        assert_eq!(prompt.prompt_dump_path(), None);
    }
}
