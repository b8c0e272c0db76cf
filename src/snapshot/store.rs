//! Rule / configuration store adapters.
//!
//! # Responsibilities
//! - Define the narrow read interface the engine needs from durable storage
//! - Provide an in-memory store (embedding, tests) and a file-backed store
//! - Feed change notifications into the reload trigger
//!
//! # Design Decisions
//! - Reads are synchronous; the reloader runs them off the async workers
//! - A store load either yields complete data or a `LoadError`, never a partial set
//! - The file store watches the parent directory so editor renames are seen

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};

use crate::error::LoadError;
use crate::model::{RoutingRule, RuleStatus, ScopedConfiguration};
use crate::snapshot::reload::{ReloadHandle, ReloadReason};

/// Keeps a change feed alive; dropping it stops notifications.
pub struct StoreWatch {
    _inner: Box<dyn Send>,
}

impl StoreWatch {
    pub fn new(inner: impl Send + 'static) -> Self {
        Self {
            _inner: Box::new(inner),
        }
    }
}

impl std::fmt::Debug for StoreWatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StoreWatch")
    }
}

/// Source of rules and scoped configuration entries.
pub trait StoreAdapter: Send + Sync {
    fn load_rules(&self) -> Result<Vec<RoutingRule>, LoadError>;

    fn load_configurations(&self) -> Result<Vec<ScopedConfiguration>, LoadError>;

    /// Load both collections. Stores that can read them consistently in one
    /// pass should override this.
    fn load_all(&self) -> Result<StoreDocument, LoadError> {
        Ok(StoreDocument {
            rules: self.load_rules()?,
            configurations: self.load_configurations()?,
        })
    }

    /// Subscribe the reload trigger to this store's change feed.
    ///
    /// Stores without a push feed return `Ok(None)` and rely on periodic reload.
    fn watch(&self, _trigger: ReloadHandle) -> Result<Option<StoreWatch>, LoadError> {
        Ok(None)
    }
}

/// Serialized store contents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreDocument {
    pub rules: Vec<RoutingRule>,
    pub configurations: Vec<ScopedConfiguration>,
}

/// Store held in memory. Rules are replaced whole, never patched.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    data: RwLock<StoreDocument>,
    trigger: Mutex<Option<ReloadHandle>>,
}

impl InMemoryStore {
    pub fn new(rules: Vec<RoutingRule>, configurations: Vec<ScopedConfiguration>) -> Self {
        Self {
            data: RwLock::new(StoreDocument {
                rules,
                configurations,
            }),
            trigger: Mutex::new(None),
        }
    }

    /// Insert a rule, or replace the rule with the same id.
    pub fn upsert_rule(&self, rule: RoutingRule) {
        {
            let mut data = self.data.write().unwrap_or_else(|e| e.into_inner());
            match data.rules.iter_mut().find(|r| r.id == rule.id) {
                Some(existing) => *existing = rule,
                None => data.rules.push(rule),
            }
        }
        self.notify();
    }

    /// Mark a rule retired. It stays in the store but leaves future snapshots.
    pub fn retire_rule(&self, id: &str) -> bool {
        let found = {
            let mut data = self.data.write().unwrap_or_else(|e| e.into_inner());
            match data.rules.iter_mut().find(|r| r.id == id) {
                Some(rule) => {
                    rule.status = RuleStatus::Retired;
                    true
                }
                None => false,
            }
        };
        if found {
            self.notify();
        }
        found
    }

    pub fn replace_rules(&self, rules: Vec<RoutingRule>) {
        self.data.write().unwrap_or_else(|e| e.into_inner()).rules = rules;
        self.notify();
    }

    pub fn replace_configurations(&self, configurations: Vec<ScopedConfiguration>) {
        self.data
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .configurations = configurations;
        self.notify();
    }

    fn notify(&self) {
        let trigger = self.trigger.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(trigger) = trigger.as_ref() {
            trigger.request(ReloadReason::StoreChanged);
        }
    }
}

impl StoreAdapter for InMemoryStore {
    fn load_rules(&self) -> Result<Vec<RoutingRule>, LoadError> {
        Ok(self.data.read().unwrap_or_else(|e| e.into_inner()).rules.clone())
    }

    fn load_configurations(&self) -> Result<Vec<ScopedConfiguration>, LoadError> {
        Ok(self
            .data
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .configurations
            .clone())
    }

    fn load_all(&self) -> Result<StoreDocument, LoadError> {
        Ok(self.data.read().unwrap_or_else(|e| e.into_inner()).clone())
    }

    fn watch(&self, trigger: ReloadHandle) -> Result<Option<StoreWatch>, LoadError> {
        *self.trigger.lock().unwrap_or_else(|e| e.into_inner()) = Some(trigger);
        Ok(None)
    }
}

/// Store backed by a TOML or JSON document on disk.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<StoreDocument, LoadError> {
        let content = fs::read_to_string(&self.path).map_err(|e| {
            LoadError::Unavailable(format!("{}: {}", self.path.display(), e))
        })?;
        parse_document(&self.path, &content)
    }
}

/// Parse store contents; `.json` files as JSON, anything else as TOML.
pub fn parse_document(path: &Path, content: &str) -> Result<StoreDocument, LoadError> {
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        serde_json::from_str(content).map_err(|e| LoadError::Malformed(e.to_string()))
    } else {
        toml::from_str(content).map_err(|e| LoadError::Malformed(e.to_string()))
    }
}

impl StoreAdapter for FileStore {
    fn load_rules(&self) -> Result<Vec<RoutingRule>, LoadError> {
        Ok(self.read()?.rules)
    }

    fn load_configurations(&self) -> Result<Vec<ScopedConfiguration>, LoadError> {
        Ok(self.read()?.configurations)
    }

    fn load_all(&self) -> Result<StoreDocument, LoadError> {
        self.read()
    }

    fn watch(&self, trigger: ReloadHandle) -> Result<Option<StoreWatch>, LoadError> {
        let file_name = self.path.file_name().map(|n| n.to_os_string());
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let relevant = event.kind.is_modify() || event.kind.is_create();
                    let ours = event
                        .paths
                        .iter()
                        .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
                    if relevant && ours {
                        tracing::info!("Store file change detected, requesting reload");
                        trigger.request(ReloadReason::StoreChanged);
                    }
                }
                Err(e) => tracing::error!("Store watch error: {:?}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )
        .map_err(|e| LoadError::Unavailable(format!("cannot watch store: {}", e)))?;

        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|e| LoadError::Unavailable(format!("cannot watch {}: {}", dir.display(), e)))?;

        tracing::info!(path = ?self.path, "Store watcher started");
        Ok(Some(StoreWatch::new(watcher)))
    }
}
