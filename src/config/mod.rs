use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Command file; stdin when unset.
    pub input_path: Option<String>,
    /// Levels per side in the final snapshot.
    pub depth: usize,
    pub log_format: LogFormat,
    /// Request queue size of the book service used by `engine --service`.
    pub channel_capacity: usize,
    pub emit_metrics: bool,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Pretty,
    Json,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            input_path: None,
            depth: 5,
            log_format: LogFormat::Pretty,
            channel_capacity: 1024,
            emit_metrics: false,
        }
    }
}

impl Settings {
    /// Loads settings from an optional file, then `CLOB_*` environment overrides.
    pub fn load(path: Option<&str>) -> anyhow::Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path));
        }
        builder = builder.add_source(config::Environment::with_prefix("CLOB"));
        let settings: Self = builder.build()?.try_deserialize()?;
        if settings.channel_capacity == 0 {
            anyhow::bail!("channel_capacity must be positive");
        }
        Ok(settings)
    }
}
