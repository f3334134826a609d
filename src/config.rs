use serde::{Deserialize, Serialize};

/// Default bound on recursion depth for traversal, search and reshaping.
pub const DEFAULT_MAX_DEPTH: usize = 100;

/// Default bound on the `null` slots a single write may add to reach an array index.
pub const DEFAULT_MAX_PADDING: usize = 100_000;

/// Separator used between the segments of flattened keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Separator {
    #[default]
    Dot,
    Slash,
    Custom(char),
}

impl Separator {
    pub fn as_char(&self) -> char {
        match self {
            Separator::Dot => '.',
            Separator::Slash => '/',
            Separator::Custom(c) => *c,
        }
    }
}

/// Knobs shared by every engine operation.
///
/// ## Example
///
/// ```rust
/// use jqpath::{Options, Separator};
///
/// let options = Options::default()
///     .with_max_depth(16)
///     .with_strict(true)
///     .with_separator(Separator::Slash);
///
/// assert_eq!(options.max_depth, 16);
/// assert!(options.create_missing);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Hard cap on recursion depth.
    pub max_depth: usize,
    /// Most `null` elements `set` or `unflatten` may insert in front of a new
    /// array index.
    pub max_padding: usize,
    /// Report missing keys, out-of-range indices and kind mismatches on
    /// required components as errors instead of dropping the branch.
    pub strict: bool,
    /// Stop after the first match.
    pub only_first: bool,
    /// Create intermediate containers when setting a concrete path that does not exist.
    pub create_missing: bool,
    /// Deleting a missing concrete path is a no-op instead of an error.
    pub tolerant_delete: bool,
    pub separator: Separator,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_padding: DEFAULT_MAX_PADDING,
            strict: false,
            only_first: false,
            create_missing: true,
            tolerant_delete: false,
            separator: Separator::Dot,
        }
    }
}

impl Options {
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_max_padding(mut self, max_padding: usize) -> Self {
        self.max_padding = max_padding;
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_only_first(mut self, only_first: bool) -> Self {
        self.only_first = only_first;
        self
    }

    pub fn with_create_missing(mut self, create_missing: bool) -> Self {
        self.create_missing = create_missing;
        self
    }

    pub fn with_tolerant_delete(mut self, tolerant_delete: bool) -> Self {
        self.tolerant_delete = tolerant_delete;
        self
    }

    pub fn with_separator(mut self, separator: Separator) -> Self {
        self.separator = separator;
        self
    }
}
