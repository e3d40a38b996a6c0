use std::{
    collections::HashSet,
    fs::read_to_string,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{extract::ExtractionRule, plot::Plot};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not read config {path:?}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Could not parse config {path:?}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yml::Error,
    },
    #[error("Config has no pipelines")]
    NoPipelines,
    #[error("Pipeline {0} has no sources")]
    NoSources(String),
    #[error("Pipeline {0} is defined more than once")]
    DuplicatePipeline(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub name: String,
    pub pipelines: Vec<Pipeline>,
}

/// One chart: every source is extracted with `rule`, concatenated in order and plotted to `output`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    pub name: String,
    #[serde(default)]
    pub rule: ExtractionRule,
    pub sources: Vec<Source>,
    pub output: PathBuf,
    pub plot: Box<dyn Plot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub category: String,
    pub path: PathBuf,
}

impl Config {
    /// Reads a YAML config. Relative source and output paths are taken
    /// relative to the directory holding the config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_yaml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self, serde_yml::Error> {
        serde_yml::from_str(content)
    }

    pub fn resolve_paths(&mut self, base: &Path) {
        for pipeline in &mut self.pipelines {
            for source in &mut pipeline.sources {
                if source.path.is_relative() {
                    source.path = base.join(&source.path);
                }
            }
            if pipeline.output.is_relative() {
                pipeline.output = base.join(&pipeline.output);
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pipelines.is_empty() {
            return Err(ConfigError::NoPipelines);
        }
        let mut names = HashSet::new();
        for pipeline in &self.pipelines {
            if !names.insert(pipeline.name.as_str()) {
                return Err(ConfigError::DuplicatePipeline(pipeline.name.clone()));
            }
            if pipeline.sources.is_empty() {
                return Err(ConfigError::NoSources(pipeline.name.clone()));
            }
        }
        Ok(())
    }

    pub fn pipeline(&self, name: &str) -> Option<&Pipeline> {
        self.pipelines.iter().find(|p| p.name == name)
    }
}
