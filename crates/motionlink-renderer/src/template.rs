//! Template rendering and the per-rule output writer.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use minijinja::Environment;
use motionlink_common::MotionlinkError;
use motionlink_common::model::Row;
use serde_json::Value;
use tracing::debug;

use crate::fs::FilePersistence;
use crate::links::LinkResolver;

/// Renders a view with template source text.
pub trait TemplateRenderer: Send + Sync {
    /// `name` identifies the template in errors.
    fn render(&self, name: &str, template: &str, view: &Value) -> Result<String, MotionlinkError>;
}

/// Jinja-style templates. No auto-escaping: output is usually markdown.
#[derive(Debug)]
pub struct MiniJinjaRenderer {
    env: Environment<'static>,
}

impl MiniJinjaRenderer {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_keep_trailing_newline(true);
        Self { env }
    }

    /// Access to the environment, for registering filters and globals.
    pub fn environment_mut(&mut self) -> &mut Environment<'static> {
        &mut self.env
    }
}

impl Default for MiniJinjaRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateRenderer for MiniJinjaRenderer {
    fn render(&self, name: &str, template: &str, view: &Value) -> Result<String, MotionlinkError> {
        self.env
            .render_str(template, view)
            .map_err(|e| MotionlinkError::Template {
                template: name.to_string(),
                message: e.to_string(),
            })
    }
}

/// Reads each template file once per run.
#[derive(Debug, Default)]
pub struct TemplateCache {
    files: DashMap<PathBuf, Arc<str>>,
}

impl TemplateCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn read(
        &self,
        fs: &impl FilePersistence,
        path: &Path,
    ) -> Result<Arc<str>, MotionlinkError> {
        if let Some(text) = self.files.get(path) {
            return Ok(text.clone());
        }
        debug!(path = %path.display(), "reading template");
        let text: Arc<str> = fs.read_text(path).await?.into();
        self.files.insert(path.to_path_buf(), text.clone());
        Ok(text)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// `.md` for `templates/post.md`; empty when the template has no extension.
pub fn template_extension(template: &Path) -> String {
    template
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default()
}

/// Renders ready rows with one template and submits them for flushing.
pub struct OutputWriter<'a> {
    templates: &'a dyn TemplateRenderer,
    links: &'a LinkResolver,
    template_name: String,
    template: Arc<str>,
    out_dir: PathBuf,
    extension: String,
}

impl<'a> OutputWriter<'a> {
    pub fn new(
        templates: &'a dyn TemplateRenderer,
        links: &'a LinkResolver,
        template_path: &Path,
        template: Arc<str>,
        out_dir: &Path,
    ) -> Self {
        Self {
            templates,
            links,
            template_name: template_path.display().to_string(),
            template,
            out_dir: out_dir.to_path_buf(),
            extension: template_extension(template_path),
        }
    }

    /// `<out_dir>/<title><template extension>`
    pub fn output_path(&self, row: &Row) -> PathBuf {
        self.out_dir.join(format!("{}{}", row.title, self.extension))
    }

    pub fn write(&self, row: &Row) -> Result<PathBuf, MotionlinkError> {
        let view = serde_json::to_value(row).map_err(|e| MotionlinkError::Template {
            template: self.template_name.clone(),
            message: e.to_string(),
        })?;
        let content = self
            .templates
            .render(&self.template_name, &self.template, &view)?;
        let path = self.output_path(row);
        debug!(row = %row.id, path = %path.display(), "row rendered");
        self.links.submit(content, path.clone(), row.id.clone());
        Ok(path)
    }
}
