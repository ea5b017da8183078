//! Code lists for coded (ID) elements
//!
//! An ID element accepts only values found in its code list. Lists may be
//! held in memory, read from a file, or backed by an arbitrary lookup.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Lookup contract shared by every code list flavour
pub trait CodeList: Send + Sync + fmt::Debug {
    /// Name/identifier of the list
    fn name(&self) -> &str;

    /// Whether `code` is an allowed value
    fn is_valid(&self, code: &str) -> bool;

    /// Description of `code`, if known
    fn describe(&self, code: &str) -> Option<String>;

    /// Reverse lookup from a description to its code
    fn code_for(&self, description: &str) -> Option<String>;
}

/// A code list held in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryCodeList {
    name: String,
    codes: BTreeMap<String, Option<String>>,
    case_sensitive: bool,
}

impl InMemoryCodeList {
    /// Create an empty code list
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            codes: BTreeMap::new(),
            case_sensitive: true,
        }
    }

    /// Create with a set of bare codes
    pub fn with_codes<I, S>(name: impl Into<String>, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut list = Self::new(name);
        for code in codes {
            list.add(code);
        }
        list
    }

    /// Set case sensitivity
    #[must_use]
    pub fn case_sensitive(mut self, sensitive: bool) -> Self {
        self.case_sensitive = sensitive;
        self
    }

    /// Add a code without description
    pub fn add(&mut self, code: impl Into<String>) {
        self.codes.insert(code.into(), None);
    }

    /// Add a code with its description
    pub fn add_described(&mut self, code: impl Into<String>, description: impl Into<String>) {
        self.codes.insert(code.into(), Some(description.into()));
    }

    /// Number of codes
    #[must_use]
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    /// Whether the list is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// All codes, sorted
    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.codes.keys().map(String::as_str)
    }

    fn find(&self, code: &str) -> Option<(&String, &Option<String>)> {
        if self.case_sensitive {
            self.codes.get_key_value(code)
        } else {
            self.codes
                .iter()
                .find(|(candidate, _)| candidate.eq_ignore_ascii_case(code))
        }
    }
}

impl CodeList for InMemoryCodeList {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_valid(&self, code: &str) -> bool {
        self.find(code).is_some()
    }

    fn describe(&self, code: &str) -> Option<String> {
        self.find(code).and_then(|(_, description)| description.clone())
    }

    fn code_for(&self, description: &str) -> Option<String> {
        self.codes
            .iter()
            .find(|(_, candidate)| {
                candidate
                    .as_deref()
                    .is_some_and(|d| d.eq_ignore_ascii_case(description))
            })
            .map(|(code, _)| code.clone())
    }
}

/// A code list read from a text file
///
/// One code per line; an optional description follows a tab or `=`.
/// Blank lines and lines starting with `#` are ignored.
#[derive(Debug, Clone)]
pub struct FileCodeList {
    source: String,
    inner: InMemoryCodeList,
}

impl FileCodeList {
    /// Read and index a code list file
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::CodeList`] when the file cannot be read.
    pub fn open(path: &Path) -> crate::Result<Self> {
        let source = path.display().to_string();
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::code_list(&source, e.to_string()))?;
        let name = path
            .file_stem()
            .map_or_else(|| source.clone(), |s| s.to_string_lossy().into_owned());
        let list = Self::parse(name, &source, &content);
        debug!(source = %list.source, codes = list.inner.len(), "Loaded code list file");
        Ok(list)
    }

    /// Index code list text already in memory
    #[must_use]
    pub fn parse(name: impl Into<String>, source: &str, content: &str) -> Self {
        let mut inner = InMemoryCodeList::new(name);
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match line.split_once(['\t', '=']) {
                Some((code, description)) => {
                    inner.add_described(code.trim(), description.trim());
                }
                None => inner.add(line),
            }
        }
        Self {
            source: source.to_string(),
            inner,
        }
    }

    /// Where the list was read from
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Number of codes
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether the file held no codes
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl CodeList for FileCodeList {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn is_valid(&self, code: &str) -> bool {
        self.inner.is_valid(code)
    }

    fn describe(&self, code: &str) -> Option<String> {
        self.inner.describe(code)
    }

    fn code_for(&self, description: &str) -> Option<String> {
        self.inner.code_for(description)
    }
}

type Lookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// A code list backed by a caller-supplied lookup
///
/// The lookup returns `Some(description)` for valid codes (the description
/// may be empty) and `None` otherwise.
#[derive(Clone)]
pub struct FnCodeList {
    name: String,
    lookup: Lookup,
    reverse: Option<Lookup>,
}

impl FnCodeList {
    /// Wrap a lookup function
    pub fn new<F>(name: impl Into<String>, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            lookup: Arc::new(lookup),
            reverse: None,
        }
    }

    /// Add a reverse lookup (description to code)
    #[must_use]
    pub fn with_reverse<F>(mut self, reverse: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.reverse = Some(Arc::new(reverse));
        self
    }
}

impl fmt::Debug for FnCodeList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnCodeList")
            .field("name", &self.name)
            .field("reverse", &self.reverse.is_some())
            .finish_non_exhaustive()
    }
}

impl CodeList for FnCodeList {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_valid(&self, code: &str) -> bool {
        (self.lookup)(code).is_some()
    }

    fn describe(&self, code: &str) -> Option<String> {
        (self.lookup)(code).filter(|d| !d.is_empty())
    }

    fn code_for(&self, description: &str) -> Option<String> {
        self.reverse.as_ref().and_then(|reverse| reverse(description))
    }
}
