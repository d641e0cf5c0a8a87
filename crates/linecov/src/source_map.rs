//! Source Map: static class/method/line layout of every instrumented file
//!
//! Built once before execution begins and shared read-only (behind an `Arc`)
//! by recorders, the aggregator and the summarizer.
//!
//! Nested declarations (closures, anonymous and inner classes) are a flat
//! list of possibly overlapping [`MethodDescriptor`]s. Rollups only need
//! range containment, so no tree is built. For each line the innermost
//! method (narrowest range, later declaration on an exact tie) is the
//! *primary* owner; every method whose range contains the line *encloses* it
//! and accrues it.

use crate::ids::{ClassId, FileId, MethodId, SourceLocation};
use crate::result::{LinecovError, LinecovResult};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::{BTreeSet, HashMap};

/// Largest line count a file may declare
pub const MAX_LINE_COUNT: u32 = 1 << 22;

/// One method (or lambda, or initializer) and its line range
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodDescriptor {
    /// File containing the method
    pub file: FileId,
    /// Method id, unique within the file
    pub id: MethodId,
    /// Display name
    pub name: String,
    /// First line (inclusive)
    pub start_line: u32,
    /// Last line (inclusive)
    pub end_line: u32,
    /// Column of the declaration on `start_line`
    #[serde(default)]
    pub start_column: u32,
}

impl MethodDescriptor {
    /// Create a new method descriptor
    #[must_use]
    pub fn new(
        file: FileId,
        id: MethodId,
        name: impl Into<String>,
        start_line: u32,
        end_line: u32,
    ) -> Self {
        Self {
            file,
            id,
            name: name.into(),
            start_line,
            end_line,
            start_column: 0,
        }
    }

    /// Set the declaration column
    #[must_use]
    pub const fn with_start_column(mut self, column: u32) -> Self {
        self.start_column = column;
        self
    }

    /// Whether `line` lies within this method's range
    #[inline]
    #[must_use]
    pub const fn contains_line(&self, line: u32) -> bool {
        line >= self.start_line && line <= self.end_line
    }

    /// Number of lines in the declared range
    #[must_use]
    pub const fn span(&self) -> u32 {
        self.end_line.saturating_sub(self.start_line) + 1
    }
}

/// One class (possibly nested) with its ordered methods
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassDescriptor {
    /// File containing the class
    pub file: FileId,
    /// Class id, unique within the file
    pub id: ClassId,
    /// Display name, e.g. `Outer.Inner`
    pub name: String,
    /// First line (inclusive)
    pub start_line: u32,
    /// Last line (inclusive)
    pub end_line: u32,
    /// Methods in declaration order
    #[serde(default)]
    pub methods: Vec<MethodDescriptor>,
}

impl ClassDescriptor {
    /// Create a new class descriptor with no methods
    #[must_use]
    pub fn new(
        file: FileId,
        id: ClassId,
        name: impl Into<String>,
        start_line: u32,
        end_line: u32,
    ) -> Self {
        Self {
            file,
            id,
            name: name.into(),
            start_line,
            end_line,
            methods: Vec::new(),
        }
    }

    /// Append a method
    #[must_use]
    pub fn with_method(mut self, method: MethodDescriptor) -> Self {
        self.methods.push(method);
        self
    }
}

/// Everything the engine knows about one source file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    /// File id, unique within the source map
    pub id: FileId,
    /// Path or qualified name used in reports
    pub path: String,
    /// Number of lines; defaults to the highest class end line
    #[serde(default)]
    pub line_count: Option<u32>,
    /// Executable lines; when absent every line inside a method is executable
    #[serde(default)]
    pub executable_lines: Option<BTreeSet<u32>>,
    /// Classes in declaration order
    #[serde(default)]
    pub classes: Vec<ClassDescriptor>,
}

impl FileDescriptor {
    /// Create a new file descriptor with no classes
    #[must_use]
    pub fn new(id: FileId, path: impl Into<String>) -> Self {
        Self {
            id,
            path: path.into(),
            line_count: None,
            executable_lines: None,
            classes: Vec::new(),
        }
    }

    /// Append a class
    #[must_use]
    pub fn with_class(mut self, class: ClassDescriptor) -> Self {
        self.classes.push(class);
        self
    }

    /// Set the total line count
    #[must_use]
    pub const fn with_line_count(mut self, lines: u32) -> Self {
        self.line_count = Some(lines);
        self
    }

    /// Restrict executable lines to the given set
    #[must_use]
    pub fn with_executable_lines(mut self, lines: impl IntoIterator<Item = u32>) -> Self {
        self.executable_lines = Some(lines.into_iter().collect());
        self
    }
}

/// Result of resolving a line against the source map
///
/// `Unmapped` is a normal outcome (blank lines, braces, field declarations)
/// and such lines are excluded from every denominator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineResolution<'a> {
    /// Line is executable and owned by at least one method
    Mapped {
        /// Class declaring the primary method
        class: ClassId,
        /// Innermost method containing the line
        method: MethodId,
        /// Every method containing the line, in declaration order
        enclosing: &'a [MethodId],
    },
    /// Line is outside every method or not executable
    Unmapped,
}

impl LineResolution<'_> {
    /// Whether the line is mapped to a method
    #[must_use]
    pub const fn is_mapped(&self) -> bool {
        matches!(self, Self::Mapped { .. })
    }

    /// Primary method, if mapped
    #[must_use]
    pub const fn method(&self) -> Option<MethodId> {
        match self {
            Self::Mapped { method, .. } => Some(*method),
            Self::Unmapped => None,
        }
    }
}

#[derive(Debug, Clone)]
struct LineOwner {
    class: ClassId,
    primary: MethodId,
    primary_span: u32,
    enclosing: SmallVec<[MethodId; 2]>,
}

#[derive(Debug)]
struct FileEntry {
    descriptor: FileDescriptor,
    line_count: u32,
    /// Indexed by `line - 1`
    lines: Vec<Option<LineOwner>>,
    classes: HashMap<ClassId, usize>,
    /// method id -> (class index, method index)
    methods: HashMap<MethodId, (usize, usize)>,
}

impl FileEntry {
    fn owner(&self, line: u32) -> Option<&LineOwner> {
        if line == 0 {
            return None;
        }
        self.lines.get(line as usize - 1).and_then(Option::as_ref)
    }
}

/// Validated, indexed layout of all files in a coverage session
#[derive(Debug)]
pub struct SourceMap {
    files: Vec<FileEntry>,
    index: HashMap<FileId, usize>,
}

impl SourceMap {
    /// Validate the descriptors and build the line index
    ///
    /// # Errors
    ///
    /// Returns [`LinecovError::MalformedSourceMap`] when a range is inverted,
    /// a method escapes its class, an id repeats, or a line is out of range.
    pub fn build(files: impl IntoIterator<Item = FileDescriptor>) -> LinecovResult<Self> {
        let mut entries = Vec::new();
        let mut index = HashMap::new();

        for descriptor in files {
            let id = descriptor.id;
            if index.insert(id, entries.len()).is_some() {
                return Err(LinecovError::malformed(id, "duplicate file id"));
            }
            entries.push(index_file(descriptor)?);
        }

        let map = Self {
            files: entries,
            index,
        };
        tracing::debug!(
            files = map.file_count(),
            methods = map.method_count(),
            "source map built"
        );
        Ok(map)
    }

    /// Resolve a line to its owning class and method
    #[must_use]
    pub fn resolve(&self, file: FileId, line: u32) -> LineResolution<'_> {
        match self.entry(file).and_then(|e| e.owner(line)) {
            Some(owner) => LineResolution::Mapped {
                class: owner.class,
                method: owner.primary,
                enclosing: owner.enclosing.as_slice(),
            },
            None => LineResolution::Unmapped,
        }
    }

    /// Whether the location names a known file and a line within it
    #[must_use]
    pub fn contains(&self, location: SourceLocation) -> bool {
        self.entry(location.file)
            .is_some_and(|e| location.line >= 1 && location.line <= e.line_count)
    }

    /// Methods whose range contains `line`, in declaration order
    #[must_use]
    pub fn methods_containing(&self, file: FileId, line: u32) -> &[MethodId] {
        self.entry(file)
            .and_then(|e| e.owner(line))
            .map(|owner| owner.enclosing.as_slice())
            .unwrap_or(&[])
    }

    /// Executable lines accrued by a method, ascending
    #[must_use]
    pub fn method_lines(&self, file: FileId, method: MethodId) -> Vec<u32> {
        let Some(descriptor) = self.method(file, method) else {
            return Vec::new();
        };
        (descriptor.start_line..=descriptor.end_line)
            .filter(|&line| self.methods_containing(file, line).contains(&method))
            .collect()
    }

    /// All files in build order
    pub fn files(&self) -> impl Iterator<Item = &FileDescriptor> {
        self.files.iter().map(|e| &e.descriptor)
    }

    /// Look up a file
    #[must_use]
    pub fn file(&self, id: FileId) -> Option<&FileDescriptor> {
        self.entry(id).map(|e| &e.descriptor)
    }

    /// Effective line count of a file
    #[must_use]
    pub fn line_count(&self, id: FileId) -> Option<u32> {
        self.entry(id).map(|e| e.line_count)
    }

    /// Look up a class
    #[must_use]
    pub fn class(&self, file: FileId, class: ClassId) -> Option<&ClassDescriptor> {
        let entry = self.entry(file)?;
        let idx = *entry.classes.get(&class)?;
        entry.descriptor.classes.get(idx)
    }

    /// Look up a method
    #[must_use]
    pub fn method(&self, file: FileId, method: MethodId) -> Option<&MethodDescriptor> {
        let entry = self.entry(file)?;
        let (class_idx, method_idx) = *entry.methods.get(&method)?;
        entry.descriptor.classes.get(class_idx)?.methods.get(method_idx)
    }

    /// Class that declares a method
    #[must_use]
    pub fn class_of_method(&self, file: FileId, method: MethodId) -> Option<&ClassDescriptor> {
        let entry = self.entry(file)?;
        let (class_idx, _) = *entry.methods.get(&method)?;
        entry.descriptor.classes.get(class_idx)
    }

    /// Number of files
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Number of methods across all files
    #[must_use]
    pub fn method_count(&self) -> usize {
        self.files.iter().map(|e| e.methods.len()).sum()
    }

    fn entry(&self, id: FileId) -> Option<&FileEntry> {
        self.index.get(&id).and_then(|&idx| self.files.get(idx))
    }
}

fn index_file(descriptor: FileDescriptor) -> LinecovResult<FileEntry> {
    let file = descriptor.id;
    let declared_end = descriptor
        .classes
        .iter()
        .map(|c| c.end_line)
        .max()
        .unwrap_or(0);
    let line_count = descriptor.line_count.unwrap_or(declared_end);
    if line_count > MAX_LINE_COUNT {
        return Err(LinecovError::malformed(
            file,
            format!("line count {line_count} exceeds {MAX_LINE_COUNT}"),
        ));
    }

    let mut classes = HashMap::new();
    let mut methods = HashMap::new();

    for (class_idx, class) in descriptor.classes.iter().enumerate() {
        if class.file != file {
            return Err(LinecovError::malformed(
                file,
                format!("class {} declares file {}", class.id, class.file),
            ));
        }
        check_range(file, "class", class.id.as_u32(), class.start_line, class.end_line)?;
        if class.end_line > line_count {
            return Err(LinecovError::malformed(
                file,
                format!(
                    "class {} ends at line {} past line count {}",
                    class.id, class.end_line, line_count
                ),
            ));
        }
        if classes.insert(class.id, class_idx).is_some() {
            return Err(LinecovError::malformed(
                file,
                format!("duplicate class id {}", class.id),
            ));
        }

        for (method_idx, method) in class.methods.iter().enumerate() {
            if method.file != file {
                return Err(LinecovError::malformed(
                    file,
                    format!("method {} declares file {}", method.id, method.file),
                ));
            }
            check_range(file, "method", method.id.as_u32(), method.start_line, method.end_line)?;
            if method.start_line < class.start_line || method.end_line > class.end_line {
                return Err(LinecovError::malformed(
                    file,
                    format!(
                        "method {} [{}, {}] outside class {} [{}, {}]",
                        method.id,
                        method.start_line,
                        method.end_line,
                        class.id,
                        class.start_line,
                        class.end_line
                    ),
                ));
            }
            if methods.insert(method.id, (class_idx, method_idx)).is_some() {
                return Err(LinecovError::malformed(
                    file,
                    format!("duplicate method id {}", method.id),
                ));
            }
        }
    }

    if let Some(executable) = &descriptor.executable_lines {
        if let Some(&bad) = executable.iter().find(|&&l| l == 0 || l > line_count) {
            return Err(LinecovError::malformed(
                file,
                format!("executable line {bad} outside 1..={line_count}"),
            ));
        }
    }

    let lines = index_lines(&descriptor);

    Ok(FileEntry {
        descriptor,
        line_count,
        lines,
        classes,
        methods,
    })
}

fn check_range(file: FileId, kind: &str, id: u32, start: u32, end: u32) -> LinecovResult<()> {
    if start == 0 {
        return Err(LinecovError::malformed(
            file,
            format!("{kind} {id} starts at line 0"),
        ));
    }
    if start > end {
        return Err(LinecovError::malformed(
            file,
            format!("{kind} {id} range inverted: {start} > {end}"),
        ));
    }
    Ok(())
}

/// Owner per line up to the last method line; later lines are unmapped
fn index_lines(descriptor: &FileDescriptor) -> Vec<Option<LineOwner>> {
    let last_method_line = descriptor
        .classes
        .iter()
        .flat_map(|c| &c.methods)
        .map(|m| m.end_line)
        .max()
        .unwrap_or(0);
    let mut lines: Vec<Option<LineOwner>> = vec![None; last_method_line as usize];
    let executable = descriptor.executable_lines.as_ref();

    for class in &descriptor.classes {
        for method in &class.methods {
            let span = method.span();
            for line in method.start_line..=method.end_line {
                if executable.is_some_and(|set| !set.contains(&line)) {
                    continue;
                }
                let slot = &mut lines[line as usize - 1];
                match slot {
                    Some(owner) => {
                        owner.enclosing.push(method.id);
                        // `<=` lets the later declaration win an exact tie
                        if span <= owner.primary_span {
                            owner.class = class.id;
                            owner.primary = method.id;
                            owner.primary_span = span;
                        }
                    }
                    None => {
                        let mut enclosing = SmallVec::new();
                        enclosing.push(method.id);
                        *slot = Some(LineOwner {
                            class: class.id,
                            primary: method.id,
                            primary_span: span,
                            enclosing,
                        });
                    }
                }
            }
        }
    }

    lines
}
