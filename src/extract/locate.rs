//! Finding a browser's history database on disk.

use std::path::{Path, PathBuf};

use crate::error::{PipelineError, Result};
use crate::extract::{Browser, BrowserChoice};

/// Base directories the platform conventions are resolved against.
#[derive(Debug, Clone)]
pub struct Roots {
    pub home: PathBuf,
    /// `%LOCALAPPDATA%` on Windows, `~/Library/Application Support` on macOS.
    pub local_data: PathBuf,
    /// Roaming app data on Windows; same as `local_data` elsewhere.
    pub config: PathBuf,
}

impl Roots {
    pub fn from_env() -> Result<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| PipelineError::not_found("home directory", PathBuf::from("~")))?;
        let local_data = dirs::data_local_dir().unwrap_or_else(|| home.clone());
        let config = dirs::config_dir().unwrap_or_else(|| home.join(".config"));
        Ok(Self {
            home,
            local_data,
            config,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedStore {
    pub browser: Browser,
    pub path: PathBuf,
}

fn chromium_candidate(browser: Browser, roots: &Roots) -> PathBuf {
    let vendor: &[&str] = match browser {
        Browser::Brave => &["BraveSoftware", "Brave-Browser"],
        _ => &["Google", "Chrome"],
    };
    if cfg!(windows) {
        let mut p = roots.local_data.clone();
        p.extend(vendor);
        p.join("User Data").join("Default").join("History")
    } else if cfg!(target_os = "macos") {
        let mut p = roots.home.join("Library").join("Application Support");
        p.extend(vendor);
        p.join("Default").join("History")
    } else {
        let dir = match browser {
            Browser::Brave => roots.home.join(".config").join("BraveSoftware").join("Brave-Browser"),
            _ => roots.home.join(".config").join("google-chrome"),
        };
        dir.join("Default").join("History")
    }
}

pub fn firefox_root(roots: &Roots) -> PathBuf {
    if cfg!(windows) {
        roots.config.join("Mozilla").join("Firefox")
    } else if cfg!(target_os = "macos") {
        roots.home.join("Library").join("Application Support").join("Firefox")
    } else {
        roots.home.join(".mozilla").join("firefox")
    }
}

#[derive(Debug, Default)]
struct ProfileEntry {
    path: Option<String>,
    relative: bool,
    default: bool,
    install_default: bool,
}

/// Candidate profile directories from `profiles.ini`, most likely active first:
/// install defaults, then `Default=1`, then file order.
pub fn parse_profiles_ini(text: &str, root: &Path) -> Vec<PathBuf> {
    let mut entries: Vec<ProfileEntry> = Vec::new();
    let mut in_install = false;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
            continue;
        }
        if line.starts_with('[') && line.ends_with(']') {
            let section = &line[1..line.len() - 1];
            in_install = section.starts_with("Install");
            entries.push(ProfileEntry {
                relative: true,
                ..ProfileEntry::default()
            });
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let Some(entry) = entries.last_mut() else {
            continue;
        };
        match (key.trim(), value.trim()) {
            ("Path", v) => entry.path = Some(v.to_string()),
            ("IsRelative", v) => entry.relative = v != "0",
            ("Default", v) if in_install => {
                entry.path = Some(v.to_string());
                entry.install_default = true;
            }
            ("Default", v) => entry.default = v == "1",
            _ => {}
        }
    }

    let rank = |e: &ProfileEntry| match (e.install_default, e.default) {
        (true, _) => 0,
        (false, true) => 1,
        _ => 2,
    };
    let mut ordered: Vec<&ProfileEntry> = entries.iter().filter(|e| e.path.is_some()).collect();
    ordered.sort_by_key(|e| rank(*e));

    let mut out: Vec<PathBuf> = Vec::new();
    for entry in ordered {
        let Some(raw) = entry.path.as_deref() else {
            continue;
        };
        let dir = if entry.relative {
            root.join(raw)
        } else {
            PathBuf::from(raw)
        };
        if !out.contains(&dir) {
            out.push(dir);
        }
    }
    out
}

fn locate_firefox(roots: &Roots) -> Result<LocatedStore> {
    let root = firefox_root(roots);
    let ini = root.join("profiles.ini");
    let text = std::fs::read_to_string(&ini)
        .map_err(|err| PipelineError::from_io(err, "firefox profiles.ini", &ini))?;
    parse_profiles_ini(&text, &root)
        .into_iter()
        .map(|dir| dir.join("places.sqlite"))
        .find(|p| p.is_file())
        .map(|path| LocatedStore {
            browser: Browser::Firefox,
            path,
        })
        .ok_or_else(|| PipelineError::not_found("firefox profile with places.sqlite", root))
}

/// Resolve the history store for `choice`. `Chrome` also accepts a Brave
/// install when Chrome itself is absent.
pub fn locate(choice: BrowserChoice, roots: &Roots) -> Result<LocatedStore> {
    let chromium: &[Browser] = match choice {
        BrowserChoice::Chrome => &[Browser::Chrome, Browser::Brave],
        BrowserChoice::Brave => &[Browser::Brave],
        BrowserChoice::Firefox => return locate_firefox(roots),
    };
    for &browser in chromium {
        let path = chromium_candidate(browser, roots);
        if path.is_file() {
            return Ok(LocatedStore { browser, path });
        }
    }
    Err(PipelineError::not_found(
        "chromium history file",
        chromium_candidate(chromium[0], roots),
    ))
}
