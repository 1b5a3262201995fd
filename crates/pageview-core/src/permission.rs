//! Permission kinds and resolved permission sets.

use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Permission kinds named by a page's permissions block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionKind {
    Create,
    Read,
    Update,
    Delete,
    Export,
    Import,
}

impl PermissionKind {
    pub const ALL: [PermissionKind; 6] = [
        PermissionKind::Create,
        PermissionKind::Read,
        PermissionKind::Update,
        PermissionKind::Delete,
        PermissionKind::Export,
        PermissionKind::Import,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionKind::Create => "create",
            PermissionKind::Read => "read",
            PermissionKind::Update => "update",
            PermissionKind::Delete => "delete",
            PermissionKind::Export => "export",
            PermissionKind::Import => "import",
        }
    }
}

impl fmt::Display for PermissionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

bitflags! {
    /// Permissions granted to the current session for one page.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Permissions: u8 {
        const CREATE = 1 << 0;
        const READ = 1 << 1;
        const UPDATE = 1 << 2;
        const DELETE = 1 << 3;
        const EXPORT = 1 << 4;
        const IMPORT = 1 << 5;
    }
}

impl Permissions {
    /// Flag for a single permission kind.
    pub fn of(kind: PermissionKind) -> Self {
        match kind {
            PermissionKind::Create => Permissions::CREATE,
            PermissionKind::Read => Permissions::READ,
            PermissionKind::Update => Permissions::UPDATE,
            PermissionKind::Delete => Permissions::DELETE,
            PermissionKind::Export => Permissions::EXPORT,
            PermissionKind::Import => Permissions::IMPORT,
        }
    }

    /// True if `kind` is granted.
    pub fn allows(&self, kind: PermissionKind) -> bool {
        self.contains(Self::of(kind))
    }
}
