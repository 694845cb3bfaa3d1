//! Discovery of migration versions and their scripts.
//!
//! A migration root is a directory with one subdirectory per version. The
//! subdirectory name is the version identifier: an opaque, lexically-sortable
//! token (`0001`, `v2`, ...). Inside each version directory up to three
//! script files are recognized:
//!
//! - `init.sql` — idempotent schema/seed SQL, `-- GO`-delimited
//! - `migration.js` — marker for a programmatic step; its content is never
//!   loaded by this crate, the step itself is a handler registered on the
//!   engine by version key
//! - `finalize.sql` — SQL run after the programmatic step, same convention
//!   as `init.sql`
//!
//! A version directory containing none of the three fails the whole scan with
//! [Error::InvalidLayout](crate::Error::InvalidLayout) before anything runs.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use crate::cancellation::CancellationToken;
use crate::error::Error;

/// Recognized init script filename inside a version directory.
pub const INIT_SCRIPT_FILENAME: &str = "init.sql";
/// Recognized programmatic-migration marker filename inside a version directory.
pub const MIGRATION_SCRIPT_FILENAME: &str = "migration.js";
/// Recognized finalize script filename inside a version directory.
pub const FINALIZE_SCRIPT_FILENAME: &str = "finalize.sql";

/// One of the three recognized steps within a version's application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptPhase {
    Init,
    Migration,
    Finalize,
}

impl fmt::Display for ScriptPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptPhase::Init => write!(f, "init"),
            ScriptPhase::Migration => write!(f, "migration"),
            ScriptPhase::Finalize => write!(f, "finalize"),
        }
    }
}

/// Where a script's text lives.
///
/// Filesystem scanning produces `Path` locators; tests substitute `Inline`
/// ones; with the `remote` feature scripts can be fetched over http(s),
/// where a non-success response is a load failure.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptLocator {
    Path(std::path::PathBuf),
    #[cfg(feature = "remote")]
    Url(String),
    Inline(String),
}

impl fmt::Display for ScriptLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptLocator::Path(path) => write!(f, "{}", path.display()),
            #[cfg(feature = "remote")]
            ScriptLocator::Url(url) => write!(f, "{}", url),
            ScriptLocator::Inline(_) => write!(f, "<inline script>"),
        }
    }
}

impl ScriptLocator {
    /// Load the script's full text.
    pub fn load(&self, token: &CancellationToken) -> Result<String, Error> {
        token.check()?;
        match self {
            ScriptLocator::Path(path) => {
                fs::read_to_string(path).map_err(|e| Error::ScriptLoad {
                    locator: path.display().to_string(),
                    reason: e.to_string(),
                })
            }
            #[cfg(feature = "remote")]
            ScriptLocator::Url(url) => {
                let response = reqwest::blocking::get(url).map_err(|e| Error::ScriptLoad {
                    locator: url.clone(),
                    reason: e.to_string(),
                })?;
                if !response.status().is_success() {
                    return Err(Error::ScriptLoad {
                        locator: url.clone(),
                        reason: format!("unexpected HTTP status {}", response.status()),
                    });
                }
                response.text().map_err(|e| Error::ScriptLoad {
                    locator: url.clone(),
                    reason: e.to_string(),
                })
            }
            ScriptLocator::Inline(text) => Ok(text.clone()),
        }
    }
}

/// The scripts present in one version directory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VersionScripts {
    pub init: Option<ScriptLocator>,
    pub migration: Option<ScriptLocator>,
    pub finalize: Option<ScriptLocator>,
}

impl VersionScripts {
    pub fn is_empty(&self) -> bool {
        self.init.is_none() && self.migration.is_none() && self.finalize.is_none()
    }
}

/// The full set of discovered versions, keyed and ordered by their lexical
/// version identifier. Immutable once discovered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MigrationSources {
    versions: BTreeMap<String, VersionScripts>,
}

impl MigrationSources {
    /// An empty source set, for programmatic construction via [with_version](Self::with_version).
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan `root` for version subdirectories.
    ///
    /// Non-directory entries under the root are ignored. A subdirectory
    /// containing none of the recognized script files fails the whole scan
    /// with [Error::InvalidLayout](crate::Error::InvalidLayout), so a bad
    /// layout is reported before any script executes.
    pub fn from_filesystem(root: impl AsRef<Path>) -> Result<Self, Error> {
        let root = root.as_ref();
        let entries = fs::read_dir(root).map_err(|e| Error::InvalidLayout {
            path: root.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut versions = BTreeMap::new();
        for entry in entries {
            let entry = entry.map_err(|e| Error::InvalidLayout {
                path: root.to_path_buf(),
                reason: e.to_string(),
            })?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();

            let locator_for = |filename: &str| {
                let candidate = path.join(filename);
                candidate.is_file().then(|| ScriptLocator::Path(candidate))
            };
            let scripts = VersionScripts {
                init: locator_for(INIT_SCRIPT_FILENAME),
                migration: locator_for(MIGRATION_SCRIPT_FILENAME),
                finalize: locator_for(FINALIZE_SCRIPT_FILENAME),
            };
            if scripts.is_empty() {
                return Err(Error::InvalidLayout {
                    path,
                    reason: format!(
                        "version directory contains none of the recognized script files {}, {}, {}",
                        INIT_SCRIPT_FILENAME, MIGRATION_SCRIPT_FILENAME, FINALIZE_SCRIPT_FILENAME
                    ),
                });
            }
            versions.insert(name, scripts);
        }

        Ok(Self { versions })
    }

    /// Add or replace a version programmatically. Useful for tests and for
    /// remote (`Url`) locators, where there is no directory to scan.
    pub fn with_version(mut self, name: impl Into<String>, scripts: VersionScripts) -> Self {
        self.versions.insert(name.into(), scripts);
        self
    }

    /// Version identifiers in lexical ascending order.
    pub fn versions(&self) -> impl Iterator<Item = &str> {
        self.versions.keys().map(String::as_str)
    }

    pub fn scripts(&self, version: &str) -> Option<&VersionScripts> {
        self.versions.get(version)
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn scans_version_directories_and_classifies_scripts() {
        let root = tempfile::tempdir().unwrap();
        let v1 = root.path().join("0001");
        fs::create_dir(&v1).unwrap();
        fs::write(v1.join("init.sql"), "CREATE TABLE a (id INTEGER)").unwrap();
        fs::write(v1.join("finalize.sql"), "CREATE INDEX ix_a ON a(id)").unwrap();
        let v2 = root.path().join("0002");
        fs::create_dir(&v2).unwrap();
        fs::write(v2.join("migration.js"), "// programmatic step").unwrap();
        // a stray file at the root is ignored
        fs::write(root.path().join("README.txt"), "not a version").unwrap();

        let sources = MigrationSources::from_filesystem(root.path()).unwrap();
        assert_eq!(sources.versions().collect::<Vec<_>>(), vec!["0001", "0002"]);

        let v1_scripts = sources.scripts("0001").unwrap();
        assert!(v1_scripts.init.is_some());
        assert!(v1_scripts.migration.is_none());
        assert!(v1_scripts.finalize.is_some());

        let v2_scripts = sources.scripts("0002").unwrap();
        assert!(v2_scripts.init.is_none());
        assert!(v2_scripts.migration.is_some());
    }

    #[test]
    fn version_directory_without_recognized_files_fails_the_scan() {
        let root = tempfile::tempdir().unwrap();
        let good = root.path().join("0001");
        fs::create_dir(&good).unwrap();
        fs::write(good.join("init.sql"), "SELECT 1").unwrap();
        let bad = root.path().join("0002");
        fs::create_dir(&bad).unwrap();
        fs::write(bad.join("notes.txt"), "nothing recognized here").unwrap();

        let result = MigrationSources::from_filesystem(root.path());
        match result {
            Err(Error::InvalidLayout { path, .. }) => assert_eq!(path, bad),
            other => panic!("expected InvalidLayout, got {:?}", other),
        }
    }

    #[test]
    fn missing_root_fails_the_scan() {
        let root = tempfile::tempdir().unwrap();
        let missing = root.path().join("does-not-exist");
        assert!(matches!(
            MigrationSources::from_filesystem(&missing),
            Err(Error::InvalidLayout { .. })
        ));
    }

    #[test]
    fn versions_iterate_in_lexical_order() {
        let sources = MigrationSources::new()
            .with_version(
                "v2",
                VersionScripts {
                    init: Some(ScriptLocator::Inline("SELECT 1".into())),
                    ..Default::default()
                },
            )
            .with_version(
                "0001",
                VersionScripts {
                    init: Some(ScriptLocator::Inline("SELECT 1".into())),
                    ..Default::default()
                },
            );
        assert_eq!(sources.versions().collect::<Vec<_>>(), vec!["0001", "v2"]);
    }

    #[test]
    fn path_locator_loads_file_contents() {
        let root = tempfile::tempdir().unwrap();
        let script = root.path().join("init.sql");
        fs::write(&script, "SELECT 42").unwrap();
        let locator = ScriptLocator::Path(script);
        assert_eq!(
            locator.load(&CancellationToken::new()).unwrap(),
            "SELECT 42"
        );
    }

    #[test]
    fn path_locator_missing_file_is_a_load_error() {
        let locator = ScriptLocator::Path("/no/such/script.sql".into());
        assert!(matches!(
            locator.load(&CancellationToken::new()),
            Err(Error::ScriptLoad { .. })
        ));
    }

    #[cfg(feature = "remote")]
    #[test]
    fn unreachable_url_locator_is_a_load_error() {
        // nothing listens on port 1; fails without touching the network
        let locator = ScriptLocator::Url("http://127.0.0.1:1/init.sql".to_string());
        assert!(matches!(
            locator.load(&CancellationToken::new()),
            Err(Error::ScriptLoad { .. })
        ));
    }

    #[test]
    fn load_observes_cancellation() {
        let token = CancellationToken::new();
        token.cancel();
        let locator = ScriptLocator::Inline("SELECT 1".into());
        assert_eq!(locator.load(&token), Err(Error::Cancelled));
    }
}
