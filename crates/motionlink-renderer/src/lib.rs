//! motionlink renderer
//!
//! Turns rows of a remote content database into files. Each [`TemplateRule`]
//! names a template, an output directory and the databases it reads; the
//! [`Pipeline`] fetches those rows, renders their block trees to markdown,
//! stages any hosted media, renders the template once per row and finally
//! writes everything out with cross-row links resolved.

pub mod block;
pub mod build;
pub mod fs;
pub mod links;
pub mod media;
pub mod paths;
pub mod rich_text;
pub mod rule;
pub mod template;
pub mod tree;

pub use block::{BlockRenderFn, BlockRenderers, DEFAULT_PAGE_HOST, RenderContext};
pub use build::{Pipeline, RuleFailure, RunReport, TransformContext};
pub use fs::{FilePersistence, LocalFs, MemoryFs};
pub use links::{FlushReport, LinkResolver, OutputRecord};
pub use media::{MediaRef, MediaResolver, PassthroughMedia, StagingMediaResolver, media_folder};
pub use paths::relative_link;
pub use rich_text::{apply_annotations, path_placeholder, render_all, render_rich_text};
pub use rule::{DatabaseRule, RowTransform, TemplateRule};
pub use template::{MiniJinjaRenderer, OutputWriter, TemplateCache, TemplateRenderer};
pub use tree::{CHILD_INDENT, MarkdownRenderer};
