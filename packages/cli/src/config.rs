//! Run configuration, assembled from command-line flags and the environment.

use std::fs;
use std::path::{Path, PathBuf};

use trustgraph::{RuleCatalog, TrustAnchors, Validator};

/// Everything needed to build a [`Validator`].
///
/// | Flag | Variable | Default | Description |
/// |------|----------|---------|-------------|
/// | `--trusted-anchor` | `TRUSTGRAPH_TRUSTED_ANCHORS` | (none) | Anchor IRIs; the variable is comma-separated |
/// | `--trust-list` | | (none) | JSON file holding an array of anchor IRIs |
/// | `--rules` | `TRUSTGRAPH_RULES` | embedded catalog | Replacement rule catalog (JSON) |
#[derive(Debug, Clone, Default)]
pub struct ValidatorConfig {
    pub anchors: TrustAnchors,
    pub rules: Option<PathBuf>,
}

impl ValidatorConfig {
    /// Merge anchors given inline with those read from an optional trust list.
    pub fn new(
        anchors: Vec<String>,
        trust_list: Option<&Path>,
        rules: Option<PathBuf>,
    ) -> Result<Self, String> {
        let mut set: TrustAnchors = anchors
            .into_iter()
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .collect();
        if let Some(path) = trust_list {
            for iri in read_trust_list(path)? {
                set.insert(iri);
            }
        }
        if set.is_empty() {
            tracing::warn!("no trusted anchors configured; every issuer will be unattested");
        }
        Ok(Self { anchors: set, rules })
    }

    /// The configured rule catalog, or the embedded default.
    pub fn catalog(&self) -> Result<RuleCatalog, String> {
        match &self.rules {
            None => RuleCatalog::embedded()
                .map_err(|e| format!("embedded rule catalog is invalid: {e}")),
            Some(path) => {
                let text = fs::read_to_string(path)
                    .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
                RuleCatalog::from_json(&text)
                    .map_err(|e| format!("invalid rule catalog {}: {}", path.display(), e))
            }
        }
    }

    pub fn validator(&self) -> Result<Validator, String> {
        Ok(Validator::new(self.catalog()?, self.anchors.clone()))
    }
}

fn read_trust_list(path: &Path) -> Result<Vec<String>, String> {
    let text = fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
    serde_json::from_str::<Vec<String>>(&text).map_err(|e| {
        format!(
            "trust list {} must be a JSON array of IRIs: {}",
            path.display(),
            e
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_anchors_are_dropped() {
        let cfg = ValidatorConfig::new(vec![" did:web:a ".into(), "".into()], None, None).unwrap();
        assert_eq!(cfg.anchors.len(), 1);
        assert!(cfg.anchors.contains("did:web:a"));
    }

    #[test]
    fn trust_list_is_merged() {
        let path = std::env::temp_dir().join(format!("trustgraph-anchors-{}.json", std::process::id()));
        fs::write(&path, r#"["did:web:b", "did:web:a"]"#).unwrap();
        let cfg = ValidatorConfig::new(vec!["did:web:a".into()], Some(&path), None).unwrap();
        fs::remove_file(&path).ok();
        assert_eq!(cfg.anchors.len(), 2);
    }

    #[test]
    fn missing_rules_file_is_an_error() {
        let cfg = ValidatorConfig {
            rules: Some(PathBuf::from("/nonexistent/rules.json")),
            ..Default::default()
        };
        assert!(cfg.catalog().is_err());
    }

    #[test]
    fn default_catalog_loads() {
        assert_eq!(ValidatorConfig::default().catalog().unwrap().len(), 4);
    }
}
