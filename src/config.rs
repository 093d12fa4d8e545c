use std::path::PathBuf;

pub const ENV_WORKSPACE: &str = "GRADEBOOKD_WORKSPACE";
pub const ENV_LOG: &str = "GRADEBOOKD_LOG";
pub const ENV_LOG_FORMAT: &str = "GRADEBOOKD_LOG_FORMAT";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Workspace to open before the first request. The host can still switch
    /// with `workspace.select`.
    pub workspace: Option<PathBuf>,
    pub log_filter: String,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    fn from_lookup<F>(get: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let workspace = get(ENV_WORKSPACE)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);
        let log_filter = get(ENV_LOG)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "info".to_string());
        let log_format = match get(ENV_LOG_FORMAT).as_deref().map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        Config {
            workspace,
            log_filter,
            log_format,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn cfg(pairs: &[(&str, &str)]) -> Config {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let c = cfg(&[]);
        assert!(c.workspace.is_none());
        assert_eq!(c.log_filter, "info");
        assert_eq!(c.log_format, LogFormat::Pretty);
    }

    #[test]
    fn reads_all_keys() {
        let c = cfg(&[
            (ENV_WORKSPACE, "/tmp/ws"),
            (ENV_LOG, "gradebookd=debug"),
            (ENV_LOG_FORMAT, "JSON"),
        ]);
        assert_eq!(c.workspace, Some(PathBuf::from("/tmp/ws")));
        assert_eq!(c.log_filter, "gradebookd=debug");
        assert_eq!(c.log_format, LogFormat::Json);
    }

    #[test]
    fn blank_workspace_is_ignored() {
        let c = cfg(&[(ENV_WORKSPACE, "   ")]);
        assert!(c.workspace.is_none());
    }
}
