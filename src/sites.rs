//! Site registry.
//!
//! Each `[sites.<name>]` entry is a tenant of the index. This module lists
//! them and turns a site entry into the pieces a reconciliation run needs:
//! its source tree, scope, path mapper, and path filter.

use anyhow::Result;
use docsync_core::error::SyncError;
use docsync_core::paths::DocPathMapper;
use docsync_core::source::SourceTree;
use docsync_core::SyncScope;

use crate::config::{Config, SiteConfig, SourceKind};
use crate::connector_fs::LocalTree;
use crate::connector_github::GitHubTree;
use crate::filter::GlobFilter;

/// Everything needed to reconcile one site.
pub struct SiteRuntime {
    pub name: String,
    pub source: Box<dyn SourceTree>,
    pub scope: SyncScope,
    pub mapper: DocPathMapper,
    pub filter: GlobFilter,
}

/// Look up a configured site, failing with [`SyncError::InvalidScope`].
pub fn resolve<'a>(config: &'a Config, name: &str) -> std::result::Result<&'a SiteConfig, SyncError> {
    config
        .site(name)
        .ok_or_else(|| SyncError::InvalidScope(format!("unknown site '{}'", name)))
}

/// Check that every requested site is configured.
pub fn ensure_known(config: &Config, names: &[String]) -> std::result::Result<(), SyncError> {
    let unknown: Vec<&str> = names
        .iter()
        .filter(|n| config.site(n).is_none())
        .map(String::as_str)
        .collect();
    if unknown.is_empty() {
        Ok(())
    } else {
        Err(SyncError::InvalidScope(format!(
            "unknown site(s) specified: {}",
            unknown.join(", ")
        )))
    }
}

pub fn open_site(config: &Config, name: &str) -> Result<SiteRuntime> {
    let site = resolve(config, name)?;

    let source: Box<dyn SourceTree> = match (&site.github, &site.local) {
        (Some(gh), _) => Box::new(GitHubTree::new(gh, config.sync.request_timeout())?),
        (None, Some(local)) => Box::new(LocalTree::new(local)),
        (None, None) => return Err(SyncError::InvalidScope(format!("site '{}' has no source", name)).into()),
    };

    Ok(SiteRuntime {
        name: name.to_string(),
        source,
        scope: SyncScope::new(Some(name.to_string()), site.root.trim_matches('/')),
        mapper: DocPathMapper::new(site.path_prefix.clone(), site.path_suffix.clone()),
        filter: GlobFilter::new(&site.include_globs, &site.exclude_globs)?,
    })
}

/// Print the configured sites as a table.
pub fn list_sites(config: &Config) -> Result<()> {
    if config.sites.is_empty() {
        println!("No sites configured.");
        return Ok(());
    }

    println!("{:<20} {:<8} LOCATION", "SITE", "SOURCE");
    for (name, site) in &config.sites {
        let kind = site.source_kind();
        let location = site.location();
        let location = match (kind, &site.local) {
            (SourceKind::Local, Some(local)) if !local.path.join(site.root.trim_matches('/')).is_dir() => {
                format!("{} (missing)", location)
            }
            _ => location,
        };
        println!("{:<20} {:<8} {}", name, kind.as_str(), location);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LocalSourceConfig;
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    fn config() -> Config {
        let site = SiteConfig {
            root: "/docs/".into(),
            path_prefix: "/kb/".into(),
            path_suffix: String::new(),
            include_globs: vec!["**/*.md".into()],
            exclude_globs: vec![],
            read_token_env: None,
            github: None,
            local: Some(LocalSourceConfig {
                path: PathBuf::from("/srv/kb"),
                follow_symlinks: false,
            }),
        };
        let toml_src = "[db]\npath = \"x.sqlite\"\n";
        let mut cfg: Config = toml::from_str(toml_src).unwrap();
        cfg.sites = BTreeMap::from([("kb".to_string(), site)]);
        cfg
    }

    #[test]
    fn test_open_site_builds_scope_and_mapper() {
        let cfg = config();
        let runtime = open_site(&cfg, "kb").unwrap();
        assert_eq!(runtime.scope, SyncScope::new(Some("kb".into()), "docs"));
        assert_eq!(runtime.mapper.doc_path("guide/intro.md"), "/kb/guide/intro");
    }

    #[test]
    fn test_unknown_sites_are_listed() {
        let cfg = config();
        assert!(ensure_known(&cfg, &["kb".to_string()]).is_ok());
        let err = ensure_known(&cfg, &["kb".into(), "x".into(), "y".into()]).unwrap_err();
        assert_eq!(err.to_string(), "invalid scope: unknown site(s) specified: x, y");
        assert!(matches!(resolve(&cfg, "nope"), Err(SyncError::InvalidScope(_))));
    }
}
