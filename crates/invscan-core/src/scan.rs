//! Discovery of invoice images under a base directory.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{InvscanError, Result};
use crate::models::config::ScanMode;

/// File name patterns treated as invoice pages by default.
pub const DEFAULT_IMAGE_PATTERNS: [&str; 9] = [
    "*.png", "*.jpg", "*.jpeg", "*.jp2", "*.gif", "*.bmp", "*.tiff", "*.tif", "*.webp",
];

/// One invoice: an id plus its page images in page order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceGroup {
    /// Identifier used for the output file name.
    pub id: String,

    /// Output sub-directory relative to the output root.
    pub relative_dir: PathBuf,

    /// Page images, sorted by path.
    pub images: Vec<PathBuf>,
}

impl InvoiceGroup {
    /// Group built from explicit image paths.
    pub fn new(id: impl Into<String>, images: Vec<PathBuf>) -> Self {
        Self {
            id: id.into(),
            relative_dir: PathBuf::new(),
            images,
        }
    }
}

/// Case-insensitive file name filter.
#[derive(Debug, Clone)]
pub struct ImageFilter {
    patterns: Vec<Pattern>,
}

impl ImageFilter {
    /// Compile the given glob patterns.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| {
                Pattern::new(p.as_ref()).map_err(|e| {
                    InvscanError::Config(format!("invalid image pattern {:?}: {}", p.as_ref(), e))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    /// Whether the file name of `path` matches any pattern.
    pub fn matches(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        let options = MatchOptions {
            case_sensitive: false,
            ..MatchOptions::default()
        };
        self.patterns.iter().any(|p| p.matches_with(name, options))
    }
}

impl Default for ImageFilter {
    fn default() -> Self {
        Self::new(&DEFAULT_IMAGE_PATTERNS).expect("default image patterns are valid")
    }
}

/// Discover invoices according to `mode`.
pub fn discover(base_dir: &Path, mode: ScanMode, filter: &ImageFilter) -> Result<Vec<InvoiceGroup>> {
    match mode {
        ScanMode::Folders => find_invoice_groups(base_dir, filter),
        ScanMode::Files => find_invoice_images(base_dir, filter),
    }
}

/// Every directory below `base_dir` that directly contains images is one
/// invoice, identified by its directory name.
///
/// Directories sharing a name are told apart by their relative path joined
/// with `_`. An id that is still taken gets a numeric suffix.
pub fn find_invoice_groups(base_dir: &Path, filter: &ImageFilter) -> Result<Vec<InvoiceGroup>> {
    ensure_dir(base_dir)?;

    let mut folders: Vec<(PathBuf, Vec<PathBuf>)> = Vec::new();
    for entry in WalkDir::new(base_dir).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| InvscanError::Scan(e.to_string()))?;
        if !entry.file_type().is_dir() {
            continue;
        }

        let images = folder_images(entry.path(), filter)?;
        if images.is_empty() {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(base_dir)
            .unwrap_or(entry.path())
            .to_path_buf();
        folders.push((relative, images));
    }
    folders.sort_by(|a, b| a.0.cmp(&b.0));

    let mut name_counts: HashMap<String, usize> = HashMap::new();
    for (relative, _) in &folders {
        *name_counts.entry(base_name(relative)).or_default() += 1;
    }

    let mut used: HashSet<String> = HashSet::new();
    let groups = folders
        .into_iter()
        .map(|(relative, images)| {
            let name = base_name(&relative);
            let candidate = if name_counts.get(&name).copied().unwrap_or(0) > 1 {
                let joined = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join("_");
                warn!("Folder name {} is not unique, using {}", name, joined);
                joined
            } else {
                name
            };
            let id = unique_id(candidate, &mut used);
            debug!("Invoice {} has {} page(s)", id, images.len());
            InvoiceGroup {
                id,
                relative_dir: PathBuf::new(),
                images,
            }
        })
        .collect();

    Ok(groups)
}

/// Every image anywhere under `base_dir` is a single-page invoice, identified
/// by its file stem. The image's directory is mirrored in the output.
pub fn find_invoice_images(base_dir: &Path, filter: &ImageFilter) -> Result<Vec<InvoiceGroup>> {
    ensure_dir(base_dir)?;

    let mut groups = Vec::new();
    for entry in WalkDir::new(base_dir).sort_by_file_name() {
        let entry = entry.map_err(|e| InvscanError::Scan(e.to_string()))?;
        if !entry.file_type().is_file() || !filter.matches(entry.path()) {
            continue;
        }

        let path = entry.path().to_path_buf();
        let id = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "invoice".to_string());
        let relative_dir = path
            .parent()
            .and_then(|p| p.strip_prefix(base_dir).ok())
            .map(Path::to_path_buf)
            .unwrap_or_default();

        groups.push(InvoiceGroup {
            id,
            relative_dir,
            images: vec![path],
        });
    }
    groups.sort_by(|a, b| a.images.cmp(&b.images));

    Ok(groups)
}

/// Images directly inside `dir`, sorted by path.
pub fn folder_images(dir: &Path, filter: &ImageFilter) -> Result<Vec<PathBuf>> {
    let mut images = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && filter.matches(&path) {
            images.push(path);
        }
    }
    images.sort();
    Ok(images)
}

fn ensure_dir(base_dir: &Path) -> Result<()> {
    if base_dir.is_dir() {
        Ok(())
    } else {
        Err(InvscanError::Scan(format!(
            "base directory not found: {}",
            base_dir.display()
        )))
    }
}

/// `candidate`, or `candidate_2`, `candidate_3`, ... when already taken.
fn unique_id(candidate: String, used: &mut HashSet<String>) -> String {
    let mut id = candidate.clone();
    let mut n = 2;
    while used.contains(&id) {
        id = format!("{}_{}", candidate, n);
        n += 1;
    }
    if id != candidate {
        warn!("Invoice id {} is already taken, using {}", candidate, id);
    }
    used.insert(id.clone());
    id
}

fn base_name(relative: &Path) -> String {
    relative
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
