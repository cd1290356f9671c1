/// Built-in per-platform location lists.
///
/// Each provider is built from explicit base directories rather than reading
/// the environment inside `enumerate`, so every platform's list can be
/// inspected from any host.
use super::LocationProvider;
use crate::model::{Category, Location, Platform, SafetyVerdict};
use std::path::PathBuf;

use Category::{Cache, Log, Temp, Trash};
use SafetyVerdict::{AutoSafe, NeedsConfirmation};

/// XDG-style layout used by Linux desktops.
#[derive(Debug, Clone)]
pub struct LinuxProvider {
    home: PathBuf,
}

impl LinuxProvider {
    pub fn new(home: PathBuf) -> Self {
        Self { home }
    }
}

impl LocationProvider for LinuxProvider {
    fn platform(&self) -> Platform {
        Platform::Linux
    }

    fn enumerate(&self) -> Vec<Location> {
        let h = &self.home;
        let cache = h.join(".cache");
        vec![
            Location::bucket("Chrome cache", cache.join("google-chrome"), Cache, AutoSafe),
            Location::bucket("Chromium cache", cache.join("chromium"), Cache, AutoSafe),
            Location::bucket("Firefox cache", cache.join("mozilla"), Cache, AutoSafe),
            Location::bucket("Thumbnail cache", cache.join("thumbnails"), Cache, AutoSafe),
            Location::bucket("pip cache", cache.join("pip"), Cache, AutoSafe),
            Location::bucket("User cache", cache, Cache, NeedsConfirmation),
            Location::bucket("Temporary files", "/tmp", Temp, NeedsConfirmation),
            Location::bucket(
                "Session logs",
                h.join(".local/share/xorg"),
                Log,
                AutoSafe,
            ),
            Location::bucket("Trash", h.join(".local/share/Trash"), Trash, NeedsConfirmation),
            Location::user_content("Downloads", h.join("Downloads")),
        ]
        .into_iter()
        .map(|l| l.with_platform(Platform::Linux))
        .collect()
    }
}

/// `~/Library` layout on macOS.
#[derive(Debug, Clone)]
pub struct MacOsProvider {
    home: PathBuf,
}

impl MacOsProvider {
    pub fn new(home: PathBuf) -> Self {
        Self { home }
    }
}

impl LocationProvider for MacOsProvider {
    fn platform(&self) -> Platform {
        Platform::MacOs
    }

    fn enumerate(&self) -> Vec<Location> {
        let lib = self.home.join("Library");
        let caches = lib.join("Caches");
        vec![
            Location::bucket("Chrome cache", caches.join("Google/Chrome"), Cache, AutoSafe),
            Location::bucket("Safari cache", caches.join("com.apple.Safari"), Cache, AutoSafe),
            Location::bucket("Firefox cache", caches.join("Firefox"), Cache, AutoSafe),
            Location::bucket("Application caches", caches, Cache, NeedsConfirmation),
            Location::bucket("Application logs", lib.join("Logs"), Log, AutoSafe),
            Location::bucket(
                "Xcode derived data",
                lib.join("Developer/Xcode/DerivedData"),
                Cache,
                AutoSafe,
            ),
            Location::bucket("Temporary files", "/private/var/tmp", Temp, NeedsConfirmation),
            Location::bucket("Trash", self.home.join(".Trash"), Trash, NeedsConfirmation),
            Location::user_content("Downloads", self.home.join("Downloads")),
        ]
        .into_iter()
        .map(|l| l.with_platform(Platform::MacOs))
        .collect()
    }
}

/// `%LOCALAPPDATA%` / `%TEMP%` layout on Windows.
#[derive(Debug, Clone)]
pub struct WindowsProvider {
    home: PathBuf,
    local_app_data: PathBuf,
    temp: PathBuf,
}

impl WindowsProvider {
    pub fn new(home: PathBuf, local_app_data: PathBuf, temp: PathBuf) -> Self {
        Self {
            home,
            local_app_data,
            temp,
        }
    }

    /// Resolve `%LOCALAPPDATA%` and `%TEMP%`, falling back to the usual
    /// locations below the profile directory.
    pub fn from_env(home: PathBuf) -> Self {
        let local_app_data = std::env::var_os("LOCALAPPDATA")
            .map(PathBuf::from)
            .unwrap_or_else(|| home.join("AppData").join("Local"));
        let temp = std::env::var_os("TEMP")
            .map(PathBuf::from)
            .unwrap_or_else(|| local_app_data.join("Temp"));
        Self::new(home, local_app_data, temp)
    }
}

impl LocationProvider for WindowsProvider {
    fn platform(&self) -> Platform {
        Platform::Windows
    }

    fn enumerate(&self) -> Vec<Location> {
        let lad = &self.local_app_data;
        vec![
            Location::bucket(
                "Chrome cache",
                lad.join(r"Google\Chrome\User Data\Default\Cache"),
                Cache,
                AutoSafe,
            ),
            Location::bucket(
                "Edge cache",
                lad.join(r"Microsoft\Edge\User Data\Default\Cache"),
                Cache,
                AutoSafe,
            ),
            Location::bucket(
                "Thumbnail cache",
                lad.join(r"Microsoft\Windows\Explorer"),
                Cache,
                AutoSafe,
            ),
            Location::bucket(
                "Crash dumps",
                lad.join("CrashDumps"),
                Log,
                AutoSafe,
            ),
            Location::bucket("Temporary files", self.temp.clone(), Temp, NeedsConfirmation),
            Location::user_content("Downloads", self.home.join("Downloads")),
        ]
        .into_iter()
        .map(|l| l.with_platform(Platform::Windows))
        .collect()
    }
}
