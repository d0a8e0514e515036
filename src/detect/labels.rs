use std::path::Path;

use crate::error::{Error, Result};

/// Class names indexed by class id, one per line of the label file.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Labels {
    names: Vec<String>,
}

impl Labels {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::ModelLoad(format!("read labels {}: {}", path.display(), e))
        })?;
        Ok(Self::parse(&text))
    }

    /// Blank lines inside the list keep their index; trailing blanks are dropped.
    pub fn parse(text: &str) -> Self {
        let mut names: Vec<String> = text
            .lines()
            .map(|line| line.trim_end_matches('\r').trim().to_string())
            .collect();
        while names.last().is_some_and(|name| name.is_empty()) {
            names.pop();
        }
        Self { names }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Display name for `class_id`; unknown ids render as `class {id}`.
    pub fn name(&self, class_id: usize) -> String {
        match self.names.get(class_id) {
            Some(name) if !name.is_empty() => name.clone(),
            _ => format!("class {}", class_id),
        }
    }
}
