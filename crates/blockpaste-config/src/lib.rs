use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use blockpaste_dom::{Selector, SelectorError};
use blockpaste_engine::blocks::{AttributeSchema, AttributeSource, AttributeType};
use blockpaste_engine::raw_handling::DEFAULT_FLATTEN_SCOPE;
use blockpaste_engine::rich_text::{FormatType, FormatTypeError};
use blockpaste_engine::{
    BlockError, BlockType, BlockTypeRegistry, FormatTypeRegistry, Pattern, PatternRegistry,
    RawHandlerContext, Transform, parse_blocks,
};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {config_path}: {source}")]
    ConfigReadError {
        config_path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {config_path}: {source}")]
    ConfigParseError {
        config_path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid selector {selector:?}: {source}")]
    InvalidSelector {
        selector: String,
        source: SelectorError,
    },

    #[error("Invalid patterns directory {pattern}: {source}")]
    InvalidPatternsDir {
        pattern: String,
        source: glob::PatternError,
    },

    #[error("Failed to read pattern file at {path}: {source}")]
    PatternReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    FormatType(#[from] FormatTypeError),

    #[error(transparent)]
    Block(#[from] BlockError),
}

/// Where a block attribute is read from, as written in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceConfig {
    Attribute,
    Html,
    Text,
    Tag,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    /// HTML attribute name, for `source = "attribute"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
    /// Value type used for JSON output. Defaults to string.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<AttributeType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

/// A raw transform that builds its block from the attribute schema alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTransformConfig {
    pub selector: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
}

/// A block type defined in the config file, or extra raw transforms for an
/// existing one when `name` is already registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockTypeConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, AttributeConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub raw_transforms: Vec<RawTransformConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Block used for markup no transform claims.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_block: Option<String>,

    /// Lists inside elements matching this selector are flattened into
    /// paragraphs. An empty string disables flattening.
    #[serde(default = "default_flatten_lists_in")]
    pub flatten_lists_in: String,

    /// Directory of `*.html` files, each loaded as a pattern named after the
    /// file stem.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patterns_dir: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub format_types: Vec<FormatType>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub block_types: Vec<BlockTypeConfig>,
}

fn default_flatten_lists_in() -> String {
    DEFAULT_FLATTEN_SCOPE.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fallback_block: None,
            flatten_lists_in: default_flatten_lists_in(),
            patterns_dir: None,
            format_types: Vec::new(),
            block_types: Vec::new(),
        }
    }
}

fn parse_selector(selector: &str) -> Result<Selector, ConfigError> {
    Selector::parse(selector).map_err(|source| ConfigError::InvalidSelector {
        selector: selector.to_string(),
        source,
    })
}

impl AttributeConfig {
    fn to_schema(&self) -> Result<AttributeSchema, ConfigError> {
        let selector = self.selector.as_deref().map(parse_selector).transpose()?;
        let source = match &self.source {
            None => AttributeSource::None,
            Some(SourceConfig::Html) => AttributeSource::Html { selector },
            Some(SourceConfig::Text) => AttributeSource::Text { selector },
            Some(SourceConfig::Tag) => AttributeSource::Tag { selector },
            Some(SourceConfig::Attribute) => AttributeSource::Attribute {
                selector,
                attribute: self.attribute.clone().unwrap_or_default(),
            },
        };
        let schema = AttributeSchema::new(source).with_type(self.kind.unwrap_or_default());
        Ok(match &self.default {
            Some(default) => schema.with_default(default),
            None => schema,
        })
    }
}

impl RawTransformConfig {
    fn to_transform(&self) -> Result<Transform, ConfigError> {
        let transform = Transform::raw().with_selector(parse_selector(&self.selector)?);
        Ok(match self.priority {
            Some(priority) => transform.with_priority(priority),
            None => transform,
        })
    }
}

impl Config {
    pub fn load_from_path<P: AsRef<Path>>(config_path: P) -> Result<Option<Self>, ConfigError> {
        let config_path = config_path.as_ref();
        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(config_path).map_err(|source| {
            ConfigError::ConfigReadError {
                config_path: config_path.to_path_buf(),
                source,
            }
        })?;

        let mut config: Config =
            toml::from_str(&content).map_err(|source| ConfigError::ConfigParseError {
                config_path: config_path.to_path_buf(),
                source,
            })?;

        // Expand shell variables and tilde in the patterns directory
        config.patterns_dir = config
            .patterns_dir
            .map(|dir| Self::expand_path(&dir).unwrap_or(dir));

        Ok(Some(config))
    }

    pub fn load() -> Result<Option<Self>, ConfigError> {
        let config_path = Self::config_path();
        Self::load_from_path(&config_path)
    }

    pub fn save_to_path<P: AsRef<Path>>(&self, config_path: P) -> anyhow::Result<()> {
        let config_path = config_path.as_ref();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        self.save_to_path(&config_path)
    }

    pub fn config_path() -> PathBuf {
        let config_dir = shellexpand::tilde("~/.config/blockpaste");
        PathBuf::from(config_dir.as_ref()).join("config.toml")
    }

    fn expand_path(path: &Path) -> Option<PathBuf> {
        let path_str = path.to_string_lossy();
        match shellexpand::full(&path_str) {
            Ok(expanded) => Some(PathBuf::from(expanded.as_ref())),
            Err(_) => None,
        }
    }

    /// The core format types plus those defined in the file.
    pub fn format_type_registry(&self) -> Result<FormatTypeRegistry, ConfigError> {
        let mut registry = FormatTypeRegistry::with_core_formats();
        for format_type in &self.format_types {
            registry.register(format_type.clone())?;
        }
        Ok(registry)
    }

    /// The core block types plus those defined in the file. Entries naming
    /// an already registered block type add raw transforms to it.
    pub fn block_type_registry(&self) -> Result<BlockTypeRegistry, ConfigError> {
        let mut registry = BlockTypeRegistry::with_core_blocks();
        for entry in &self.block_types {
            let transforms = entry
                .raw_transforms
                .iter()
                .map(RawTransformConfig::to_transform)
                .collect::<Result<Vec<_>, _>>()?;

            if let Some(existing) = registry.get_mut(&entry.name) {
                debug!("adding {} raw transform(s) to {}", transforms.len(), entry.name);
                for (key, attribute) in &entry.attributes {
                    existing.attributes.insert(key.clone(), attribute.to_schema()?);
                }
                existing.transforms.extend(transforms);
                continue;
            }

            let title = entry.title.clone().unwrap_or_else(|| entry.name.clone());
            let mut block_type = BlockType::new(&entry.name, title);
            for (key, attribute) in &entry.attributes {
                block_type = block_type.with_attribute(key, attribute.to_schema()?);
            }
            for transform in transforms {
                block_type = block_type.with_transform(transform);
            }
            registry.register(block_type)?;
        }
        Ok(registry)
    }

    /// Selector for list flattening; `None` when disabled.
    pub fn flatten_scope(&self) -> Result<Option<Selector>, ConfigError> {
        let scope = self.flatten_lists_in.trim();
        if scope.is_empty() {
            return Ok(None);
        }
        parse_selector(scope).map(Some)
    }

    /// Applies the pipeline switches to a context built from this config's
    /// registries.
    pub fn raw_handler_context<'a>(
        &self,
        blocks: &'a BlockTypeRegistry,
        format_types: &'a FormatTypeRegistry,
    ) -> Result<RawHandlerContext<'a>, ConfigError> {
        let mut ctx = RawHandlerContext::new(blocks, format_types)
            .with_list_flattening(self.flatten_scope()?);
        if let Some(fallback) = &self.fallback_block {
            ctx = ctx.with_fallback_block(fallback);
        }
        Ok(ctx)
    }

    /// Parses every `*.html` file of `patterns_dir` into a pattern named
    /// after the file stem.
    pub fn load_patterns(&self, ctx: &RawHandlerContext<'_>) -> Result<PatternRegistry, ConfigError> {
        let mut patterns = PatternRegistry::new();
        let Some(dir) = &self.patterns_dir else {
            return Ok(patterns);
        };

        let pattern = dir.join("*.html").to_string_lossy().into_owned();
        let paths = glob::glob(&pattern).map_err(|source| ConfigError::InvalidPatternsDir {
            pattern: pattern.clone(),
            source,
        })?;
        for path in paths.flatten() {
            let Some(name) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
                continue;
            };
            let html = std::fs::read_to_string(&path).map_err(|source| {
                ConfigError::PatternReadError {
                    path: path.clone(),
                    source,
                }
            })?;
            patterns.register(Pattern::new(name, parse_blocks(&html, ctx)));
        }
        info!("loaded {} pattern(s) from {}", patterns.len(), dir.display());
        Ok(patterns)
    }
}
