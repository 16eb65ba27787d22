use serde::Serialize;
use std::sync::{PoisonError, RwLock};

/// Where the initialization sequence currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InitPhase {
    #[default]
    Unopened,
    Opening,
    SchemaReady,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageStatus {
    /// Handle opened and queryable, or initialization gave up with `error` set.
    pub initialized: bool,
    pub error: Option<String>,
    pub using_external_store: bool,
    /// All expected tables verified.
    pub installed: bool,
    pub phase: InitPhase,
}

impl Default for StorageStatus {
    fn default() -> Self {
        Self {
            initialized: false,
            error: None,
            using_external_store: true,
            installed: false,
            phase: InitPhase::Unopened,
        }
    }
}

/// Partial status; `None` fields leave the current value untouched.
#[derive(Debug, Clone, Default)]
pub struct StatusUpdate {
    pub initialized: Option<bool>,
    pub error: Option<Option<String>>,
    pub using_external_store: Option<bool>,
    pub installed: Option<bool>,
    pub phase: Option<InitPhase>,
}

impl StatusUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn initialized(mut self, v: bool) -> Self {
        self.initialized = Some(v);
        self
    }

    pub fn error(mut self, v: Option<String>) -> Self {
        self.error = Some(v);
        self
    }

    pub fn using_external_store(mut self, v: bool) -> Self {
        self.using_external_store = Some(v);
        self
    }

    pub fn installed(mut self, v: bool) -> Self {
        self.installed = Some(v);
        self
    }

    pub fn phase(mut self, v: InitPhase) -> Self {
        self.phase = Some(v);
        self
    }
}

/// Shared storage status. Last writer wins; only one initialization runs at
/// a time, so no ordering beyond the lock is needed.
#[derive(Debug, Default)]
pub struct StatusRegistry {
    inner: RwLock<StorageStatus>,
}

impl StatusRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&self, partial: StatusUpdate) {
        let mut status = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(v) = partial.initialized {
            status.initialized = v;
        }
        if let Some(v) = partial.error {
            status.error = v;
        }
        if let Some(v) = partial.using_external_store {
            status.using_external_store = v;
        }
        if let Some(v) = partial.installed {
            status.installed = v;
        }
        if let Some(v) = partial.phase {
            status.phase = v;
        }
    }

    pub fn reset(&self) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = StorageStatus::default();
    }

    pub fn snapshot(&self) -> StorageStatus {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_initialized(&self) -> bool {
        self.read(|s| s.initialized)
    }

    pub fn error(&self) -> Option<String> {
        self.read(|s| s.error.clone())
    }

    pub fn is_installed(&self) -> bool {
        self.read(|s| s.installed)
    }

    pub fn is_using_external_store(&self) -> bool {
        self.read(|s| s.using_external_store)
    }

    pub fn phase(&self) -> InitPhase {
        self.read(|s| s.phase)
    }

    fn read<T>(&self, f: impl FnOnce(&StorageStatus) -> T) -> T {
        f(&self.inner.read().unwrap_or_else(PoisonError::into_inner))
    }
}
