//! Fetching databases and turning their rows into output files.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use motionlink_common::model::{Block, Database, FileObject, Row};
use motionlink_common::remote::{ContentSource, RemotePaginator};
use motionlink_common::{CredentialResolver, MotionlinkError};
use n0_future::{StreamExt, pin};
use smol_str::SmolStr;
use tracing::{debug, error, info};

use crate::block::{BlockRenderers, RenderContext};
use crate::fs::FilePersistence;
use crate::links::{FlushReport, LinkResolver};
use crate::media::{MediaRef, StagingMediaResolver};
use crate::rule::{DatabaseRule, TemplateRule};
use crate::template::{MiniJinjaRenderer, OutputWriter, TemplateCache, TemplateRenderer};
use crate::tree::MarkdownRenderer;

/// What a row transform can see.
pub struct TransformContext<'a> {
    others: &'a HashMap<SmolStr, Database>,
    markdown: &'a MarkdownRenderer,
    render: RenderContext<'a>,
}

impl<'a> TransformContext<'a> {
    pub fn new(
        others: &'a HashMap<SmolStr, Database>,
        markdown: &'a MarkdownRenderer,
        render: RenderContext<'a>,
    ) -> Self {
        Self {
            others,
            markdown,
            render,
        }
    }

    /// Secondary databases of the rule, keyed by association name.
    pub fn others(&self) -> &HashMap<SmolStr, Database> {
        self.others
    }

    pub fn other(&self, name: &str) -> Option<&Database> {
        self.others.get(name)
    }

    pub fn render_blocks(&self, blocks: &[Block]) -> String {
        self.markdown.render_forest(blocks, &self.render)
    }

    pub fn resolve_media(&self, file: &FileObject) -> MediaRef {
        self.render.resolve_media(file)
    }
}

/// A rule that failed. Other rules still run.
#[derive(Debug)]
pub struct RuleFailure {
    pub template: PathBuf,
    pub error: MotionlinkError,
}

#[derive(Debug, Default)]
pub struct RunReport {
    pub rows: usize,
    pub failures: Vec<RuleFailure>,
    pub media_files: usize,
    pub flush: FlushReport,
}

/// One build run: every rule, then media download, then link resolution.
pub struct Pipeline<S, F> {
    paginator: RemotePaginator<S>,
    fs: F,
    credentials: Box<dyn CredentialResolver>,
    markdown: MarkdownRenderer,
    templates: Box<dyn TemplateRenderer>,
    template_cache: TemplateCache,
    media: StagingMediaResolver,
    links: LinkResolver,
    http: reqwest::Client,
}

impl<S, F> Pipeline<S, F>
where
    S: ContentSource + 'static,
    F: FilePersistence,
{
    pub fn new(
        paginator: RemotePaginator<S>,
        fs: F,
        credentials: impl CredentialResolver + 'static,
    ) -> Self {
        Self {
            paginator,
            fs,
            credentials: Box::new(credentials),
            markdown: MarkdownRenderer::default(),
            templates: Box::new(MiniJinjaRenderer::new()),
            template_cache: TemplateCache::new(),
            media: StagingMediaResolver::new(),
            links: LinkResolver::new(),
            http: reqwest::Client::new(),
        }
    }

    /// Block renderers are fixed for the whole run once the pipeline is built.
    pub fn with_renderers(mut self, renderers: BlockRenderers) -> Self {
        self.markdown = MarkdownRenderer::new(renderers);
        self
    }

    pub fn with_templates(mut self, templates: impl TemplateRenderer + 'static) -> Self {
        self.templates = Box::new(templates);
        self
    }

    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    pub fn paginator(&self) -> &RemotePaginator<S> {
        &self.paginator
    }

    pub fn fs(&self) -> &F {
        &self.fs
    }

    pub fn links(&self) -> &LinkResolver {
        &self.links
    }

    pub fn media(&self) -> &StagingMediaResolver {
        &self.media
    }

    /// Fetch one database and run each row through the rule's transform.
    ///
    /// Rows are processed one at a time in source order; `on_row_ready` sees
    /// each row after its transform. The first error aborts the fetch.
    pub async fn fetch_database<R>(
        &self,
        rule: &DatabaseRule,
        out_dir: &Path,
        others: &HashMap<SmolStr, Database>,
        mut on_row_ready: R,
    ) -> Result<Database, MotionlinkError>
    where
        R: FnMut(&Row) -> Result<(), MotionlinkError> + Send,
    {
        let credentials = self.credentials.resolve(&rule.database)?;
        debug!(database = %rule.database, id = %credentials.database_id, "fetching database");

        let data = self.paginator.fetch_database(&credentials).await?;
        let ctx = TransformContext::new(
            others,
            &self.markdown,
            RenderContext::new(&self.media, out_dir),
        );

        let stream = self.paginator.fetch_rows(&credentials, &rule.query());
        pin!(stream);

        let mut rows = Vec::new();
        while let Some(row) = stream.next().await {
            let mut row = row?;
            if rule.fetch_blocks {
                row.blocks = self
                    .paginator
                    .fetch_block_tree(&row.id, &credentials.token)
                    .await?;
            }
            if let Some(map) = &rule.map {
                row = map(row, &ctx);
            }
            on_row_ready(&row)?;
            rows.push(row);
        }

        debug!(database = %rule.database, rows = rows.len(), "database fetched");
        Ok(Database { data, rows })
    }

    /// Fetch a rule's secondary databases concurrently.
    pub async fn fetch_secondaries(
        &self,
        rule: &TemplateRule,
    ) -> Result<HashMap<SmolStr, Database>, MotionlinkError> {
        let none = HashMap::new();
        let fetches = rule.also_uses.iter().map(|db| {
            let none = &none;
            async move {
                let database = self
                    .fetch_database(db, &rule.out_dir, none, |_| Ok(()))
                    .await?;
                Ok::<_, MotionlinkError>((db.database.clone(), database))
            }
        });
        n0_future::join_all(fetches).await.into_iter().collect()
    }

    /// Build one rule: secondaries first, then every primary row rendered
    /// with the rule's template and submitted for flushing.
    pub async fn build_rule(&self, rule: &TemplateRule) -> Result<usize, MotionlinkError> {
        info!(
            template = %rule.template.display(),
            database = %rule.uses.database,
            "building rule"
        );

        // unknown associations fail before anything is fetched
        for db in std::iter::once(&rule.uses).chain(&rule.also_uses) {
            self.credentials.resolve(&db.database)?;
        }

        let others = self.fetch_secondaries(rule).await?;
        let template = self.template_cache.read(&self.fs, &rule.template).await?;
        self.fs.mkdir_all(&rule.out_dir).await?;

        let writer = OutputWriter::new(
            self.templates.as_ref(),
            &self.links,
            &rule.template,
            template,
            &rule.out_dir,
        );
        let database = self
            .fetch_database(&rule.uses, &rule.out_dir, &others, |row| {
                writer.write(row).map(|_| ())
            })
            .await?;

        info!(
            template = %rule.template.display(),
            rows = database.rows.len(),
            "rule built"
        );
        Ok(database.rows.len())
    }

    /// Build every rule in order, then download staged media and flush.
    ///
    /// A failing rule is logged and reported; the remaining rules still run.
    pub async fn run(self, rules: &[TemplateRule]) -> Result<RunReport, MotionlinkError> {
        let mut report = RunReport::default();

        for rule in rules {
            match self.build_rule(rule).await {
                Ok(rows) => report.rows += rows,
                Err(err) => {
                    error!(template = %rule.template.display(), error = %err, "rule failed");
                    report.failures.push(RuleFailure {
                        template: rule.template.clone(),
                        error: err,
                    });
                }
            }
        }

        let media = self.media.commit(&self.http, &self.fs).await;
        let Pipeline { links, fs, .. } = self;
        report.flush = links.flush(&fs).await?;
        report.media_files = media?;

        info!(
            rows = report.rows,
            written = report.flush.written,
            unresolved = report.flush.unresolved.len(),
            failed_rules = report.failures.len(),
            "build finished"
        );
        Ok(report)
    }
}
