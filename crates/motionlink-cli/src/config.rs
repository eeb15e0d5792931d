use std::path::{Path, PathBuf};

use motionlink_common::{Association, ConfigError, MotionlinkError};
use motionlink_renderer::{DatabaseRule, TemplateRule};
use serde::Deserialize;
use serde_json::Value;
use smol_str::SmolStr;

/// Contents of `motionlink.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub associations: Vec<Association>,
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RuleConfig {
    pub template: PathBuf,
    pub out_dir: PathBuf,
    pub uses: DatabaseConfig,
    #[serde(default)]
    pub also_uses: Vec<DatabaseConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub database: SmolStr,
    pub take_only: Option<usize>,
    pub sorts: Option<Value>,
    pub filter: Option<Value>,
    #[serde(default = "default_fetch_blocks")]
    pub fetch_blocks: bool,
    /// Title property whose plain text becomes the row title.
    pub title_property: Option<String>,
}

fn default_fetch_blocks() -> bool {
    true
}

impl Config {
    pub fn load(config_file: &Path) -> Result<Config, MotionlinkError> {
        let text = std::fs::read_to_string(config_file)
            .map_err(|e| MotionlinkError::io(config_file, e))?;
        Ok(Self::parse(config_file, &text, std::env::vars())?)
    }

    /// Parse config text after substituting `$VAR` references from `vars`.
    pub fn parse(
        config_file: &Path,
        text: &str,
        vars: impl IntoIterator<Item = (String, String)>,
    ) -> Result<Config, ConfigError> {
        let text = substitute_vars(text, vars);
        toml::from_str(&text).map_err(|e| ConfigError::Parse {
            path: config_file.to_path_buf(),
            message: e.to_string(),
        })
    }

    pub fn template_rules(&self) -> Vec<TemplateRule> {
        self.rules.iter().map(RuleConfig::to_rule).collect()
    }
}

/// Longer names are substituted first so `$TOKEN_A` is never split by `$TOKEN`.
fn substitute_vars(text: &str, vars: impl IntoIterator<Item = (String, String)>) -> String {
    let mut vars: Vec<_> = vars.into_iter().collect();
    vars.sort_by(|(a, _), (b, _)| b.len().cmp(&a.len()));

    let mut text = text.to_string();
    for (k, v) in vars {
        text = text.replace(&format!("${k}"), &v);
    }
    text
}

impl RuleConfig {
    pub fn to_rule(&self) -> TemplateRule {
        self.also_uses.iter().fold(
            TemplateRule::new(&self.template, &self.out_dir, self.uses.to_rule()),
            |rule, db| rule.also_uses(db.to_rule()),
        )
    }
}

impl DatabaseConfig {
    pub fn to_rule(&self) -> DatabaseRule {
        let mut rule = DatabaseRule::new(self.database.clone()).fetch_blocks(self.fetch_blocks);
        if let Some(n) = self.take_only {
            rule = rule.take_only(n);
        }
        if let Some(sorts) = &self.sorts {
            rule = rule.sorts(sorts.clone());
        }
        if let Some(filter) = &self.filter {
            rule = rule.filter(filter.clone());
        }

        if self.title_property.is_none() && !self.fetch_blocks {
            return rule;
        }
        let title_property = self.title_property.clone();
        let render_content = self.fetch_blocks;
        rule.map(move |mut row, ctx| {
            if let Some(title) = title_property.as_deref().and_then(|p| row.title_property(p)) {
                row.title = title;
            }
            if render_content {
                let content = ctx.render_blocks(&row.blocks);
                row.other_data.insert("content".into(), content.into());
            }
            row
        })
    }
}
