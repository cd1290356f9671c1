/// Location catalog: the configured list of candidate roots.
///
/// Each platform supplies a [`LocationProvider`]; the provider for the
/// running OS is chosen once at startup by [`default_provider`]. The catalog
/// merges providers and answers whether an arbitrary path is "known", which
/// the classifier uses to decide the never-auto verdict.
pub mod providers;

use crate::model::{Location, Platform};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

pub use providers::{LinuxProvider, MacOsProvider, WindowsProvider};

/// Supplies the candidate locations for one platform.
pub trait LocationProvider: Send + Sync {
    fn platform(&self) -> Platform;
    fn enumerate(&self) -> Vec<Location>;
}

/// A fixed list of locations (tests, user-defined catalogs).
#[derive(Debug, Clone, Default)]
pub struct StaticProvider {
    locations: Vec<Location>,
}

impl StaticProvider {
    pub fn new(locations: Vec<Location>) -> Self {
        Self { locations }
    }
}

impl LocationProvider for StaticProvider {
    fn platform(&self) -> Platform {
        Platform::Any
    }

    fn enumerate(&self) -> Vec<Location> {
        self.locations.clone()
    }
}

/// The provider for the OS this binary was built for.
///
/// Returns `None` when the home directory cannot be determined.
pub fn default_provider() -> Option<Box<dyn LocationProvider>> {
    let home = dirs::home_dir()?;
    let provider: Box<dyn LocationProvider> = match Platform::current() {
        Platform::Windows => Box::new(WindowsProvider::from_env(home)),
        Platform::MacOs => Box::new(MacOsProvider::new(home)),
        _ => Box::new(LinuxProvider::new(home)),
    };
    Some(provider)
}

/// The merged, de-duplicated set of locations for this run.
#[derive(Debug, Clone, Default)]
pub struct LocationCatalog {
    locations: Vec<Location>,
}

impl LocationCatalog {
    /// Merge providers in order. Locations for other platforms are dropped and
    /// a root listed twice keeps its first definition.
    pub fn from_providers(providers: &[&dyn LocationProvider]) -> Self {
        let current = Platform::current();
        let mut seen: HashSet<PathBuf> = HashSet::new();
        let mut locations = Vec::new();
        for provider in providers {
            for loc in provider.enumerate() {
                if !loc.platform.applies_to(current) {
                    continue;
                }
                if seen.insert(loc.root.clone()) {
                    locations.push(loc);
                }
            }
        }
        Self { locations }
    }

    pub fn from_locations(locations: Vec<Location>) -> Self {
        Self::from_providers(&[&StaticProvider::new(locations)])
    }

    /// The catalog for the running platform, or an empty one without a home dir.
    pub fn detect() -> Self {
        match default_provider() {
            Some(provider) => Self::from_providers(&[provider.as_ref()]),
            None => {
                tracing::warn!("No home directory; location catalog is empty");
                Self::default()
            }
        }
    }

    pub fn locations(&self) -> &[Location] {
        &self.locations
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    /// The catalog location that owns `path`, preferring the deepest root.
    pub fn owner_of(&self, path: &Path) -> Option<&Location> {
        self.locations
            .iter()
            .filter(|loc| loc.contains(path))
            .max_by_key(|loc| loc.root.components().count())
    }

    /// Whether `path` lies under any catalog root.
    pub fn contains(&self, path: &Path) -> bool {
        self.owner_of(path).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Category, SafetyVerdict};

    fn cache(root: &str) -> Location {
        Location::bucket("cache", root, Category::Cache, SafetyVerdict::AutoSafe)
    }

    #[test]
    fn duplicate_roots_keep_first() {
        let a = StaticProvider::new(vec![cache("/x/cache")]);
        let b = StaticProvider::new(vec![
            Location::user_content("dup", "/x/cache"),
            cache("/y/cache"),
        ]);
        let catalog = LocationCatalog::from_providers(&[&a, &b]);
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.locations()[0].category, Some(Category::Cache));
    }

    #[test]
    fn foreign_platform_locations_are_dropped() {
        let other = match Platform::current() {
            Platform::Windows => Platform::Linux,
            _ => Platform::Windows,
        };
        let provider = StaticProvider::new(vec![cache("/a").with_platform(other), cache("/b")]);
        let catalog = LocationCatalog::from_providers(&[&provider]);
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.locations()[0].root, PathBuf::from("/b"));
    }

    #[test]
    fn owner_prefers_deepest_root() {
        let catalog = LocationCatalog::from_locations(vec![
            Location::user_content("home", "/home/u"),
            cache("/home/u/.cache"),
        ]);
        let owner = catalog.owner_of(Path::new("/home/u/.cache/x/y")).unwrap();
        assert_eq!(owner.root, PathBuf::from("/home/u/.cache"));
        assert!(catalog.contains(Path::new("/home/u/doc.txt")));
        assert!(!catalog.contains(Path::new("/etc/passwd")));
    }
}
