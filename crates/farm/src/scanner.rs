//! Orphan scanner - finds symlinks the manifest does not know about
//!
//! Directory visits fan out across a bounded rayon pool. Unreadable
//! directories are logged and skipped; the scan never fails as a whole.

use crate::context::CancelToken;
use crate::diagnostics::{Issue, IssueSeverity, IssueType};
use crate::error::Result;
use crate::fs::FileSystem;
use crate::ignore::Pattern;
use crate::path::{TargetPath, normalize, slash_key};
use manifest::{DEFAULT_MANIFEST_NAME, Manifest};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

/// Depth used when none is given
pub const DEFAULT_MAX_DEPTH: usize = 10;

/// Directories never worth descending into
pub const DEFAULT_SKIP_PATTERNS: &[&str] =
    &[".git", "node_modules", ".cache", ".npm", ".cargo", ".rustup"];

/// How much of the target tree to search
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    #[default]
    Off,
    /// Only directories that hold managed links
    Scoped,
    /// The whole target tree
    Deep,
}

impl fmt::Display for ScanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Off => "off",
            Self::Scoped => "scoped",
            Self::Deep => "deep",
        })
    }
}

impl FromStr for ScanMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "off" => Ok(Self::Off),
            "scoped" => Ok(Self::Scoped),
            "deep" => Ok(Self::Deep),
            other => Err(format!(
                "unknown scan mode '{other}' (expected off, scoped or deep)"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanConfig {
    pub mode: ScanMode,
    /// Deepest directory level visited below the target root (0 = unlimited)
    pub max_depth: usize,
    /// Explicit scan roots; relative entries resolve against the target
    pub scope_to_dirs: Vec<PathBuf>,
    /// Directory names (globs) that are never descended
    pub skip_patterns: Vec<String>,
    /// Worker threads (0 = host core count, 1 = sequential)
    pub max_workers: usize,
    /// Stop once this many orphans are found (0 = unlimited)
    pub max_issues: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self::off()
    }
}

impl ScanConfig {
    pub fn off() -> Self {
        Self {
            mode: ScanMode::Off,
            max_depth: DEFAULT_MAX_DEPTH,
            scope_to_dirs: Vec::new(),
            skip_patterns: DEFAULT_SKIP_PATTERNS.iter().map(ToString::to_string).collect(),
            max_workers: 0,
            max_issues: 0,
        }
    }

    pub fn scoped() -> Self {
        Self {
            mode: ScanMode::Scoped,
            ..Self::off()
        }
    }

    /// Deep scan to `max_depth` levels (0 falls back to the default depth)
    pub fn deep(max_depth: usize) -> Self {
        Self {
            mode: ScanMode::Deep,
            max_depth: if max_depth == 0 {
                DEFAULT_MAX_DEPTH
            } else {
                max_depth
            },
            ..Self::off()
        }
    }

    fn workers(&self) -> usize {
        if self.max_workers == 0 {
            crate::executor::default_jobs()
        } else {
            self.max_workers
        }
    }
}

/// Orphans found by one scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanOutcome {
    pub issues: Vec<Issue>,
    pub truncated: bool,
    pub cancelled: bool,
}

/// A directory to visit and whether to descend below it
struct Root {
    path: PathBuf,
    recursive: bool,
}

/// Walks scan roots looking for unmanaged symlinks
pub struct OrphanScanner<'a> {
    fs: &'a dyn FileSystem,
    target_root: &'a TargetPath,
    config: &'a ScanConfig,
    skip: Vec<Pattern>,
    cancel: CancelToken,
    manifest_file: String,
}

/// Accumulators shared by scan workers
struct Shared {
    managed: HashSet<String>,
    issues: Mutex<Vec<Issue>>,
    found: AtomicUsize,
    stop: AtomicBool,
}

impl<'a> OrphanScanner<'a> {
    pub fn new(fs: &'a dyn FileSystem, target_root: &'a TargetPath, config: &'a ScanConfig) -> Result<Self> {
        let skip = config
            .skip_patterns
            .iter()
            .map(|p| Pattern::new(p))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            fs,
            target_root,
            config,
            skip,
            cancel: CancelToken::new(),
            manifest_file: DEFAULT_MANIFEST_NAME.to_string(),
        })
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Name of the manifest file, never reported
    pub fn with_manifest_file(mut self, name: impl Into<String>) -> Self {
        self.manifest_file = name.into();
        self
    }

    /// Scan for symlinks not recorded in `manifest`
    pub fn scan(&self, manifest: &Manifest) -> ScanOutcome {
        if self.config.mode == ScanMode::Off {
            return ScanOutcome::default();
        }

        let roots = self.roots(manifest);
        log::debug!("orphan_scan_start mode={} roots={}", self.config.mode, roots.len());

        let shared = Shared {
            managed: managed_link_set(manifest),
            issues: Mutex::new(Vec::new()),
            found: AtomicUsize::new(0),
            stop: AtomicBool::new(false),
        };

        let workers = self.config.workers();
        let pool = if workers > 1 {
            match rayon::ThreadPoolBuilder::new().num_threads(workers).build() {
                Ok(pool) => Some(pool),
                Err(e) => {
                    log::warn!("thread_pool_unavailable workers={workers} error={e}");
                    None
                }
            }
        } else {
            None
        };

        match &pool {
            Some(pool) => pool.install(|| {
                roots.par_iter().for_each(|root| self.visit(root, &shared, true));
            }),
            None => {
                for root in &roots {
                    self.visit(root, &shared, false);
                }
            }
        }

        let mut issues = shared
            .issues
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        // Workers finish in any order
        issues.sort_by(|a, b| a.path.cmp(&b.path));

        let max = self.config.max_issues;
        let truncated = max > 0 && shared.found.load(Ordering::SeqCst) >= max;
        if max > 0 {
            issues.truncate(max);
        }

        ScanOutcome {
            issues,
            truncated,
            cancelled: self.cancel.is_cancelled(),
        }
    }

    /// Scan roots after dropping those already covered by another root
    ///
    /// In scoped mode the target root itself is visited without
    /// descending; directories holding managed links are walked fully.
    fn roots(&self, manifest: &Manifest) -> Vec<Root> {
        let target = self.target_root.as_path();

        let explicit: Vec<PathBuf> = self
            .config
            .scope_to_dirs
            .iter()
            .map(|dir| normalize(&target.join(dir)))
            .collect();
        if !explicit.is_empty() {
            return filter_descendants(explicit)
                .into_iter()
                .map(|path| Root {
                    path,
                    recursive: true,
                })
                .collect();
        }

        match self.config.mode {
            ScanMode::Off => Vec::new(),
            ScanMode::Deep => vec![Root {
                path: target.to_path_buf(),
                recursive: true,
            }],
            ScanMode::Scoped => {
                let dirs: Vec<PathBuf> = managed_directories(manifest)
                    .into_iter()
                    .map(|rel| normalize(&target.join(rel)))
                    .collect();
                let mut roots = vec![Root {
                    path: target.to_path_buf(),
                    recursive: false,
                }];
                roots.extend(filter_descendants(dirs).into_iter().map(|path| Root {
                    path,
                    recursive: true,
                }));
                roots
            }
        }
    }

    /// Directory level of `dir` below the target root
    fn depth(&self, dir: &Path) -> usize {
        dir.strip_prefix(self.target_root.as_path())
            .map_or(0, |rel| rel.components().count())
    }

    fn skipped(&self, dir: &Path) -> bool {
        let Some(name) = dir.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        self.skip.iter().any(|p| p.matches(name))
    }

    fn visit(&self, root: &Root, shared: &Shared, parallel: bool) {
        if self.cancel.is_cancelled() || shared.stop.load(Ordering::SeqCst) {
            return;
        }
        let dir = root.path.as_path();
        let depth = self.depth(dir);
        if self.config.max_depth > 0 && depth > self.config.max_depth {
            return;
        }
        if depth > 0 && self.skipped(dir) {
            return;
        }

        let entries = match self.fs.read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("scan_dir_unreadable path={} error={e}", dir.display());
                return;
            }
        };

        let mut subdirs = Vec::new();
        for entry in entries {
            if self.cancel.is_cancelled() {
                return;
            }
            if entry
                .file_name()
                .is_some_and(|n| n == self.manifest_file.as_str())
            {
                continue;
            }
            let Ok(meta) = self.fs.symlink_metadata(&entry) else {
                continue;
            };
            if meta.file_type().is_symlink() {
                self.check_link(&entry, shared);
            } else if meta.is_dir() && root.recursive {
                subdirs.push(Root {
                    path: entry,
                    recursive: true,
                });
            }
        }

        if parallel {
            subdirs
                .par_iter()
                .for_each(|sub| self.visit(sub, shared, true));
        } else {
            for sub in &subdirs {
                self.visit(sub, shared, false);
            }
        }
    }

    fn check_link(&self, link: &Path, shared: &Shared) {
        let rel = link.strip_prefix(self.target_root.as_path()).ok();
        let key = rel.map_or_else(|| slash_key(link), slash_key);
        if shared.managed.contains(&key) || shared.managed.contains(&slash_key(link)) {
            return;
        }

        let found = shared.found.fetch_add(1, Ordering::SeqCst) + 1;
        if self.config.max_issues > 0 {
            if found > self.config.max_issues {
                return;
            }
            if found == self.config.max_issues {
                shared.stop.store(true, Ordering::SeqCst);
            }
        }

        let issue = Issue::new(
            IssueType::OrphanedLink,
            IssueSeverity::Warning,
            rel.map_or_else(|| link.to_path_buf(), Path::to_path_buf),
            "Symlink not managed by dot",
        )
        .with_suggestion("Remove manually or use 'dot adopt' to bring under management");
        shared
            .issues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(issue);
    }
}

/// Every recorded link, slash-separated relative to the target
pub fn managed_link_set(manifest: &Manifest) -> HashSet<String> {
    manifest
        .packages
        .values()
        .flat_map(|info| info.links.iter())
        .map(|link| slash_key(Path::new(link)))
        .collect()
}

/// Every ancestor directory of every recorded link, relative to the target
pub fn managed_directories(manifest: &Manifest) -> BTreeSet<PathBuf> {
    let mut dirs = BTreeSet::new();
    for link in manifest.packages.values().flat_map(|info| info.links.iter()) {
        let mut dir = Path::new(link).parent();
        while let Some(d) = dir {
            if d.as_os_str().is_empty() {
                break;
            }
            dirs.insert(d.to_path_buf());
            dir = d.parent();
        }
    }
    dirs
}

/// Drop directories nested inside another entry
pub fn filter_descendants(mut dirs: Vec<PathBuf>) -> Vec<PathBuf> {
    dirs.sort();
    dirs.dedup();
    let mut kept: Vec<PathBuf> = Vec::new();
    for dir in dirs {
        if !kept.iter().any(|k| dir.starts_with(k)) {
            kept.push(dir);
        }
    }
    kept
}
