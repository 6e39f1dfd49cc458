use std::collections::HashMap;

/// Watch expressions per source file, in insertion order.
#[derive(Debug, Default, Clone)]
pub struct WatchRegistry {
    by_file: HashMap<String, Vec<String>>,
}

impl WatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` when the expression is already watched for `file`.
    pub fn watch(&mut self, file: &str, expression: &str) -> bool {
        let watched = self.by_file.entry(file.to_string()).or_default();
        if watched.iter().any(|existing| existing == expression) {
            return false;
        }
        watched.push(expression.to_string());
        true
    }

    /// Returns `false` when the expression was not watched.
    pub fn unwatch(&mut self, file: &str, expression: &str) -> bool {
        let Some(watched) = self.by_file.get_mut(file) else {
            return false;
        };
        let Some(idx) = watched.iter().position(|existing| existing == expression) else {
            return false;
        };
        watched.remove(idx);
        if watched.is_empty() {
            self.by_file.remove(file);
        }
        true
    }

    pub fn watched(&self, file: &str) -> &[String] {
        self.by_file.get(file).map(Vec::as_slice).unwrap_or(&[])
    }
}
