use anyhow::{Context, Result, bail};
use log::debug;
use std::path::PathBuf;

use crate::{
    package::FrameworkName,
    repository::SourceEntry,
    runtime::Runtime,
};

use super::paths::{default_install_root, store_path};

/// Name of the source registered when none is given.
pub const DEFAULT_SOURCE_NAME: &str = "local";

/// Values taken from the command line and environment.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub root: Option<PathBuf>,
    /// `NAME=PATH` entries.
    pub sources: Vec<String>,
    pub active: Option<String>,
    pub consumer: Option<String>,
    pub framework: Option<String>,
    pub dry_run: bool,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub root: PathBuf,
    pub sources: Vec<SourceEntry>,
    pub active: Option<String>,
    pub consumer: Option<String>,
    pub framework: Option<FrameworkName>,
    pub dry_run: bool,
}

impl Config {
    pub fn new<R: Runtime>(runtime: &R, overrides: ConfigOverrides) -> Result<Self> {
        let root = match overrides.root {
            Some(path) => path,
            None => default_install_root(runtime)?,
        };

        let mut sources = overrides
            .sources
            .iter()
            .map(|spec| parse_source(spec))
            .collect::<Result<Vec<_>>>()?;
        if sources.is_empty() {
            let feed = root.join("feed");
            debug!("No source given, using {:?}", feed);
            sources.push(SourceEntry::new(
                DEFAULT_SOURCE_NAME,
                feed.to_string_lossy(),
            ));
        }

        let framework = overrides
            .framework
            .as_deref()
            .map(|f| f.parse::<FrameworkName>())
            .transpose()
            .context("Invalid --framework")?;

        Ok(Self {
            root,
            sources,
            active: overrides.active,
            consumer: overrides.consumer,
            framework,
            dry_run: overrides.dry_run,
        })
    }

    pub fn store_path(&self) -> PathBuf {
        store_path(&self.root)
    }
}

/// Parse a `NAME=PATH` source definition.
pub fn parse_source(spec: &str) -> Result<SourceEntry> {
    let Some((name, location)) = spec.split_once('=') else {
        bail!("Invalid source '{}', expected NAME=PATH", spec);
    };
    let (name, location) = (name.trim(), location.trim());
    if name.is_empty() || location.is_empty() {
        bail!("Invalid source '{}', expected NAME=PATH", spec);
    }
    Ok(SourceEntry::new(name, location))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::MockRuntime;

    #[test]
    fn test_config_defaults() {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_home_dir()
            .returning(|| Some(PathBuf::from("/home/user")));

        let config = Config::new(&runtime, ConfigOverrides::default()).unwrap();

        assert_eq!(config.root, PathBuf::from("/home/user/.pkgplan"));
        assert_eq!(config.store_path(), PathBuf::from("/home/user/.pkgplan/store.json"));
        assert_eq!(
            config.sources,
            vec![SourceEntry::new("local", "/home/user/.pkgplan/feed")]
        );
        assert!(config.framework.is_none());
    }

    #[test]
    fn test_config_with_overrides() {
        // Custom root bypasses the home directory lookup.
        let runtime = MockRuntime::new();
        let overrides = ConfigOverrides {
            root: Some(PathBuf::from("/custom")),
            sources: vec!["main=/feeds/main".into(), "extra = /feeds/extra".into()],
            active: Some("extra".into()),
            consumer: Some("web".into()),
            framework: Some("net45".into()),
            dry_run: true,
        };

        let config = Config::new(&runtime, overrides).unwrap();

        assert_eq!(
            config.sources,
            vec![
                SourceEntry::new("main", "/feeds/main"),
                SourceEntry::new("extra", "/feeds/extra"),
            ]
        );
        assert_eq!(config.active.as_deref(), Some("extra"));
        assert_eq!(config.framework, Some("net45".parse().unwrap()));
        assert!(config.dry_run);
    }

    #[test]
    fn test_config_rejects_bad_source() {
        let overrides = ConfigOverrides {
            root: Some(PathBuf::from("/custom")),
            sources: vec!["no-separator".into()],
            ..Default::default()
        };
        let err = Config::new(&MockRuntime::new(), overrides).unwrap_err();
        assert!(err.to_string().contains("expected NAME=PATH"));

        assert!(parse_source("=/path").is_err());
        assert!(parse_source("name=").is_err());
    }

    #[test]
    fn test_config_rejects_bad_framework() {
        let overrides = ConfigOverrides {
            root: Some(PathBuf::from("/custom")),
            framework: Some("".into()),
            ..Default::default()
        };
        assert!(Config::new(&MockRuntime::new(), overrides).is_err());
    }
}
