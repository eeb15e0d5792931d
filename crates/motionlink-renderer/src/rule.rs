use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use motionlink_common::model::Row;
use motionlink_common::remote::RowQuery;
use serde_json::Value;
use smol_str::SmolStr;

use crate::build::TransformContext;

/// Per-row user transform. Runs once per fetched row, after its blocks are
/// attached and before the row is written.
pub type RowTransform = Arc<dyn Fn(Row, &TransformContext<'_>) -> Row + Send + Sync>;

/// Which database to read and how.
#[derive(Clone)]
pub struct DatabaseRule {
    /// Association name, resolved to credentials at build time.
    pub database: SmolStr,
    pub take_only: Option<usize>,
    pub sorts: Option<Value>,
    pub filter: Option<Value>,
    /// Fetch each row's block tree.
    pub fetch_blocks: bool,
    pub map: Option<RowTransform>,
}

impl fmt::Debug for DatabaseRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseRule")
            .field("database", &self.database)
            .field("take_only", &self.take_only)
            .field("sorts", &self.sorts)
            .field("filter", &self.filter)
            .field("fetch_blocks", &self.fetch_blocks)
            .field("map", &self.map.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

impl DatabaseRule {
    pub fn new(database: impl Into<SmolStr>) -> Self {
        Self {
            database: database.into(),
            take_only: None,
            sorts: None,
            filter: None,
            fetch_blocks: false,
            map: None,
        }
    }

    pub fn take_only(mut self, n: usize) -> Self {
        self.take_only = Some(n);
        self
    }

    pub fn sorts(mut self, sorts: Value) -> Self {
        self.sorts = Some(sorts);
        self
    }

    pub fn filter(mut self, filter: Value) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn fetch_blocks(mut self, fetch: bool) -> Self {
        self.fetch_blocks = fetch;
        self
    }

    pub fn map<F>(mut self, transform: F) -> Self
    where
        F: Fn(Row, &TransformContext<'_>) -> Row + Send + Sync + 'static,
    {
        self.map = Some(Arc::new(transform));
        self
    }

    pub fn query(&self) -> RowQuery {
        RowQuery {
            take_only: self.take_only,
            sorts: self.sorts.clone(),
            filter: self.filter.clone(),
        }
    }
}

/// One template applied to every row of a database.
#[derive(Debug, Clone)]
pub struct TemplateRule {
    pub template: PathBuf,
    pub out_dir: PathBuf,
    pub uses: DatabaseRule,
    /// Secondary databases, visible to the transform by name.
    pub also_uses: Vec<DatabaseRule>,
}

impl TemplateRule {
    pub fn new(
        template: impl Into<PathBuf>,
        out_dir: impl Into<PathBuf>,
        uses: DatabaseRule,
    ) -> Self {
        Self {
            template: template.into(),
            out_dir: out_dir.into(),
            uses,
            also_uses: Vec::new(),
        }
    }

    pub fn also_uses(mut self, rule: DatabaseRule) -> Self {
        self.also_uses.push(rule);
        self
    }
}
