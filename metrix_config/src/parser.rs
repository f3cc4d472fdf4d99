use crate::config::{MetricsConfig, MetricsFile};
use anyhow::Result;
use std::path::Path;
use tracing::info;

pub async fn load_config_from_file(path: impl AsRef<Path>) -> Result<MetricsConfig> {
    let path = path.as_ref();
    let contents = tokio::fs::read_to_string(path).await?;

    let extension = path.extension().and_then(|s| s.to_str());

    let config = match extension {
        Some("yaml") | Some("yml") => parse_yaml(&contents),
        Some("toml") => parse_toml(&contents),
        Some("json") => parse_json(&contents),
        _ => Err(anyhow::anyhow!(
            "Unsupported file format. Use .yaml, .yml, .toml, or .json"
        )),
    }?;

    info!("Loaded metrics configuration from {}", path.display());
    Ok(config)
}

pub fn parse_config_from_str(content: &str, format: &str) -> Result<MetricsConfig> {
    match format.to_lowercase().as_str() {
        "yaml" | "yml" => parse_yaml(content),
        "toml" => parse_toml(content),
        "json" => parse_json(content),
        _ => Err(anyhow::anyhow!("Unsupported format: {}", format)),
    }
}

fn parse_yaml(content: &str) -> Result<MetricsConfig> {
    let config: MetricsConfig = serde_yaml::from_str(content)?;
    config.validate()?;
    Ok(config)
}

fn parse_toml(content: &str) -> Result<MetricsConfig> {
    let file: MetricsFile = toml::from_str(content)?;
    file.metrics.validate()?;
    Ok(file.metrics)
}

fn parse_json(content: &str) -> Result<MetricsConfig> {
    let config: MetricsConfig = serde_json::from_str(content)?;
    config.validate()?;
    Ok(config)
}
