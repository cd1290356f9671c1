/// Scan locations and the classification vocabulary shared by the
/// scanner, classifier and cleaner.
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// What kind of reclaimable storage a result represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Cache,
    Temp,
    Log,
    Duplicate,
    Large,
    Trash,
}

impl Category {
    /// Human-readable label for display.
    pub fn label(self) -> &'static str {
        match self {
            Self::Cache => "Cache",
            Self::Temp => "Temporary files",
            Self::Log => "Logs",
            Self::Duplicate => "Duplicates",
            Self::Large => "Large files",
            Self::Trash => "Trash",
        }
    }

    /// Machine-readable name, matching the serialised form.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cache => "cache",
            Self::Temp => "temp",
            Self::Log => "log",
            Self::Duplicate => "duplicate",
            Self::Large => "large",
            Self::Trash => "trash",
        }
    }

    /// Parse the machine-readable name (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "cache" => Some(Self::Cache),
            "temp" => Some(Self::Temp),
            "log" => Some(Self::Log),
            "duplicate" => Some(Self::Duplicate),
            "large" => Some(Self::Large),
            "trash" => Some(Self::Trash),
            _ => None,
        }
    }
}

/// Whether an item may be removed without per-item confirmation.
///
/// Ordered from least to most restrictive so verdicts combine with `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SafetyVerdict {
    /// System or application caches with no user data. One-click removal.
    AutoSafe,
    /// Conservative default: the user must approve the item.
    NeedsConfirmation,
    /// Never proposed automatically; only actionable by explicit selection.
    NeverAuto,
}

impl SafetyVerdict {
    pub fn label(self) -> &'static str {
        match self {
            Self::AutoSafe => "auto-safe",
            Self::NeedsConfirmation => "needs-confirmation",
            Self::NeverAuto => "never-auto",
        }
    }
}

/// Operating systems a location applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Linux,
    MacOs,
    Windows,
    /// Applies everywhere (user-supplied or test locations).
    Any,
}

impl Platform {
    /// The platform this binary was compiled for.
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Self::Windows
        } else if cfg!(target_os = "macos") {
            Self::MacOs
        } else {
            Self::Linux
        }
    }

    pub fn applies_to(self, other: Platform) -> bool {
        self == Platform::Any || other == Platform::Any || self == other
    }
}

/// Where a location came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LocationOrigin {
    /// Part of the known location catalog.
    Catalog,
    /// Picked explicitly by the user; results are always never-auto.
    UserSelected,
}

/// A configured filesystem root considered for scanning. Immutable at runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Display name, e.g. "Chrome cache".
    pub name: CompactString,
    pub root: PathBuf,
    /// Bucket category for every file under the root. `None` marks a
    /// user-content root (downloads, documents) where only duplicates and
    /// large files are surfaced.
    pub category: Option<Category>,
    pub safety: SafetyVerdict,
    pub platform: Platform,
    pub origin: LocationOrigin,
}

impl Location {
    /// A catalog location whose files all fall into `category`.
    pub fn bucket(
        name: &str,
        root: impl Into<PathBuf>,
        category: Category,
        safety: SafetyVerdict,
    ) -> Self {
        Self {
            name: CompactString::new(name),
            root: root.into(),
            category: Some(category),
            safety,
            platform: Platform::Any,
            origin: LocationOrigin::Catalog,
        }
    }

    /// A catalog location holding user content. Always needs confirmation
    /// unless marked otherwise with [`Location::with_safety`].
    pub fn user_content(name: &str, root: impl Into<PathBuf>) -> Self {
        Self {
            name: CompactString::new(name),
            root: root.into(),
            category: None,
            safety: SafetyVerdict::NeedsConfirmation,
            platform: Platform::Any,
            origin: LocationOrigin::Catalog,
        }
    }

    /// A path chosen explicitly by the user, outside the catalog.
    pub fn user_selected(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let root = std::path::absolute(&root).unwrap_or(root);
        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| root.to_string_lossy().to_string());
        Self {
            name: CompactString::new(&name),
            root,
            category: None,
            safety: SafetyVerdict::NeverAuto,
            platform: Platform::Any,
            origin: LocationOrigin::UserSelected,
        }
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_safety(mut self, safety: SafetyVerdict) -> Self {
        self.safety = safety;
        self
    }

    /// Whether `path` lies at or below this location's root.
    pub fn contains(&self, path: &Path) -> bool {
        path.starts_with(&self.root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdicts_combine_with_max() {
        assert_eq!(
            SafetyVerdict::AutoSafe.max(SafetyVerdict::NeverAuto),
            SafetyVerdict::NeverAuto
        );
        assert_eq!(
            SafetyVerdict::NeedsConfirmation.max(SafetyVerdict::AutoSafe),
            SafetyVerdict::NeedsConfirmation
        );
    }

    #[test]
    fn category_names_round_trip() {
        for cat in [
            Category::Cache,
            Category::Temp,
            Category::Log,
            Category::Duplicate,
            Category::Large,
            Category::Trash,
        ] {
            assert_eq!(Category::parse(cat.as_str()), Some(cat));
        }
        assert_eq!(Category::parse("CACHE"), Some(Category::Cache));
        assert_eq!(Category::parse("downloads"), None);
    }

    #[test]
    fn user_selected_is_never_auto() {
        let loc = Location::user_selected("/home/me/stuff");
        assert_eq!(loc.safety, SafetyVerdict::NeverAuto);
        assert_eq!(loc.origin, LocationOrigin::UserSelected);
        assert_eq!(loc.name.as_str(), "stuff");
    }

    #[test]
    fn user_selected_root_is_absolute() {
        let loc = Location::user_selected("some/relative/dir");
        assert!(loc.root.is_absolute());
        assert!(loc.root.ends_with("some/relative/dir"));
        assert_eq!(loc.name.as_str(), "dir");
    }

    #[test]
    fn contains_respects_component_boundaries() {
        let loc = Location::bucket("c", "/var/cache", Category::Cache, SafetyVerdict::AutoSafe);
        assert!(loc.contains(Path::new("/var/cache/a/b")));
        assert!(!loc.contains(Path::new("/var/cachedata/a")));
    }

    #[test]
    fn platform_any_applies_everywhere() {
        assert!(Platform::Any.applies_to(Platform::Windows));
        assert!(Platform::Linux.applies_to(Platform::Any));
        assert!(!Platform::Linux.applies_to(Platform::MacOs));
    }
}
