// SPDX-License-Identifier: GPL-3.0-only

use std::sync::atomic::{AtomicU64, Ordering};

use storage_types::Identifier;

/// Hands out identifiers of the form `<root>/<n>`.
///
/// One counter serves pools and filesystems alike and only ever moves
/// forward, so an identifier is never handed out twice.
#[derive(Debug)]
pub struct IdAllocator {
    root: String,
    next: AtomicU64,
}

impl IdAllocator {
    pub fn new(root: &str) -> Self {
        Self {
            root: root.trim_end_matches('/').to_string(),
            next: AtomicU64::new(1),
        }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn next_id(&self) -> Identifier {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        Identifier::new(format!("{}/{}", self.root, n))
    }
}
