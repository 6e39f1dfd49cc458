use std::collections::HashMap;
use std::path::{Path, PathBuf};

use wdb_config::SourceConfig;

/// Source lookup for breakpoint validation and the `file` command.
pub trait SourceResolver {
    /// Full text of `file`, `None` when it cannot be read.
    fn file(&self, file: &str) -> Option<String>;

    /// 1-based line of `file` without its line terminator. `None` when the
    /// file or the line does not exist.
    fn line(&self, file: &str, lno: u32) -> Option<String> {
        let index = usize::try_from(lno).ok()?.checked_sub(1)?;
        let text = self.file(file)?;
        text.lines().nth(index).map(str::to_owned)
    }
}

/// Reads sources from disk: the name as given first, then relative to each
/// configured root.
#[derive(Debug, Default, Clone)]
pub struct FsSourceResolver {
    roots: Vec<PathBuf>,
}

impl FsSourceResolver {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }

    pub fn from_config(config: &SourceConfig) -> Self {
        Self::new(config.roots.clone())
    }

    fn candidates<'a>(&'a self, file: &'a str) -> impl Iterator<Item = PathBuf> + 'a {
        std::iter::once(PathBuf::from(file)).chain(self.roots.iter().map(move |root| root.join(file)))
    }

    fn read(path: &Path) -> Option<String> {
        match std::fs::read(path) {
            Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
            Err(_) => None,
        }
    }
}

impl SourceResolver for FsSourceResolver {
    fn file(&self, file: &str) -> Option<String> {
        self.candidates(file).find_map(|path| Self::read(&path))
    }

    fn line(&self, file: &str, lno: u32) -> Option<String> {
        let index = usize::try_from(lno).ok()?.checked_sub(1)?;
        self.candidates(file).find_map(|path| {
            let text = Self::read(&path)?;
            text.lines().nth(index).map(str::to_owned)
        })
    }
}

/// Fixed set of sources, for embedding and tests.
#[derive(Debug, Default, Clone)]
pub struct InMemorySources {
    files: HashMap<String, String>,
}

impl InMemorySources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, file: impl Into<String>, text: impl Into<String>) {
        self.files.insert(file.into(), text.into());
    }
}

impl SourceResolver for InMemorySources {
    fn file(&self, file: &str) -> Option<String> {
        self.files.get(file).cloned()
    }
}
