//! Type-Safe Identifiers (Poka-Yoke)
//!
//! Files, classes, methods and tests each get their own newtype so a class id
//! can never be passed where a method id is expected. All of them are plain
//! `u32`s on the wire, matching the numeric ids in Clover page data.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(u32);

        impl $name {
            /// Create a new identifier
            #[inline]
            #[must_use]
            pub const fn new(id: u32) -> Self {
                Self(id)
            }

            /// Get the inner value
            #[inline]
            #[must_use]
            pub const fn as_u32(self) -> u32 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// Identifies one compilation unit (source file)
    FileId
);
id_type!(
    /// Identifies a class within a file; unique per file
    ClassId
);
id_type!(
    /// Identifies a method within a file; unique per file
    MethodId
);
id_type!(
    /// Stable identifier of one test case
    TestId
);

/// One executable line: `(file, line)`, 1-based lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceLocation {
    /// File containing the line
    pub file: FileId,
    /// 1-based line number
    pub line: u32,
}

impl SourceLocation {
    /// Create a new source location
    #[inline]
    #[must_use]
    pub const fn new(file: FileId, line: u32) -> Self {
        Self { file, line }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// Identity of one test case: stable id plus display name
///
/// Created when a test starts and never mutated afterwards. Coverage sets
/// store only the [`TestId`]; the name lives in the test registry of
/// [`LineCoverage`](crate::LineCoverage).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TestIdentity {
    /// Stable identifier
    pub id: TestId,
    /// Display name, e.g. `testParse() void`
    pub name: String,
}

impl TestIdentity {
    /// Create a new test identity
    #[must_use]
    pub fn new(id: TestId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// A single raw hit emitted by instrumentation
///
/// The sequence token orders events within one recorder; it is not kept
/// after the hit is folded into a partial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HitEvent {
    /// Line that executed
    pub location: SourceLocation,
    /// Test that executed it
    pub test: TestId,
    /// Ordering token assigned by the emitter
    pub sequence: u64,
}

impl HitEvent {
    /// Create a new hit event
    #[must_use]
    pub const fn new(location: SourceLocation, test: TestId, sequence: u64) -> Self {
        Self {
            location,
            test,
            sequence,
        }
    }
}
