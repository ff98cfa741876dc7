use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use anyhow::{Result, bail};

pub const ENDPOINT_ENV_VAR: &str = "TIEOUT_ENDPOINT";
pub const DEFAULT_WAREHOUSE_FILE: &str = "warehouse.sqlite";

/// Where queries go: a local SQLite file or a remote query API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WarehouseTarget {
    Sqlite(PathBuf),
    Remote {
        base_url: String,
        timeout: Option<Duration>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimePaths {
    pub home_dir: PathBuf,
    pub cwd: PathBuf,
    pub warehouse: WarehouseTarget,
}

/// Resolves the warehouse target.
///
/// An endpoint (flag or env) wins over any SQLite path; without either the
/// warehouse is `~/.tieout/warehouse.sqlite`.
pub fn resolve_runtime_paths(
    home_dir: &Path,
    cwd: &Path,
    warehouse_override: Option<&Path>,
    endpoint: Option<&str>,
    timeout_secs: Option<u64>,
) -> Result<RuntimePaths> {
    if !home_dir.is_absolute() {
        bail!("home_dir must be absolute: {}", home_dir.display());
    }
    if !cwd.is_absolute() {
        bail!("cwd must be absolute: {}", cwd.display());
    }

    let home_dir = normalize_lexical(home_dir);
    let cwd = normalize_lexical(cwd);

    let endpoint = endpoint.map(str::trim).filter(|value| !value.is_empty());
    let warehouse = match (endpoint, warehouse_override) {
        (Some(base_url), _) => {
            if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
                bail!("endpoint must be an http(s) URL: {base_url}");
            }
            WarehouseTarget::Remote {
                base_url: base_url.to_string(),
                timeout: timeout_secs.map(Duration::from_secs),
            }
        }
        (None, Some(path)) => WarehouseTarget::Sqlite(resolve_user_path(path, &home_dir, &cwd)?),
        (None, None) => WarehouseTarget::Sqlite(
            home_dir.join(".tieout").join(DEFAULT_WAREHOUSE_FILE),
        ),
    };

    Ok(RuntimePaths {
        home_dir,
        cwd,
        warehouse,
    })
}

pub fn resolve_user_path(path: &Path, home_dir: &Path, cwd: &Path) -> Result<PathBuf> {
    let expanded = expand_tilde(path, home_dir)?;
    let resolved = if expanded.is_absolute() {
        expanded
    } else {
        cwd.join(expanded)
    };

    Ok(normalize_lexical(&resolved))
}

fn expand_tilde(path: &Path, home_dir: &Path) -> Result<PathBuf> {
    let mut components = path.components();
    match components.next() {
        Some(Component::Normal(first)) if first == "~" => {
            let mut expanded = home_dir.to_path_buf();
            for component in components {
                expanded.push(component.as_os_str());
            }
            Ok(expanded)
        }
        Some(Component::Normal(first))
            if first
                .to_str()
                .is_some_and(|segment| segment.starts_with('~')) =>
        {
            bail!(
                "unsupported home expansion syntax (only `~` and `~/...` are supported): {}",
                path.display()
            )
        }
        _ => Ok(path.to_path_buf()),
    }
}

fn normalize_lexical(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push(component.as_os_str());
                }
            }
            _ => normalized.push(component.as_os_str()),
        }
    }

    normalized
}
