use serde::Deserialize;
use std::fs;

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub uri: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub http_bind_addr: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReportFormat {
    #[default]
    Ndjson,
    Csv,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ReportConfig {
    #[serde(default)]
    pub format: ReportFormat,
    /// Output file; stdout when absent.
    pub output_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub bind_addr: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    #[serde(default)]
    pub report: ReportConfig,
    pub metrics: Option<MetricsConfig>,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        use std::env;

        let path = env::var("APPORTION_CONFIG").unwrap_or_else(|_| "apportion-config.toml".to_string());
        let contents = fs::read_to_string(&path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> anyhow::Result<Self> {
        let cfg: AppConfig = toml::from_str(contents)?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_config_with_defaults() {
        let cfg = AppConfig::from_toml(
            r#"
            [database]
            uri = "postgres://localhost/utilities"
            max_connections = 4

            [api]
            http_bind_addr = "127.0.0.1:8080"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.database.max_connections, 4);
        assert_eq!(cfg.report.format, ReportFormat::Ndjson);
        assert!(cfg.report.output_path.is_none());
        assert!(cfg.metrics.is_none());
    }

    #[test]
    fn parses_csv_report_and_metrics() {
        let cfg = AppConfig::from_toml(
            r#"
            [database]
            uri = "postgres://localhost/utilities"
            max_connections = 4

            [api]
            http_bind_addr = "0.0.0.0:8080"

            [report]
            format = "csv"
            output_path = "report.csv"

            [metrics]
            bind_addr = "0.0.0.0:9000"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.report.format, ReportFormat::Csv);
        assert_eq!(cfg.report.output_path.as_deref(), Some("report.csv"));
        assert_eq!(cfg.metrics.unwrap().bind_addr, "0.0.0.0:9000");
    }
}
