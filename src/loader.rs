//! Document loaders: turn files into [`Document`] values.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use pulldown_cmark::{Event, HeadingLevel, Options, Parser, Tag};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::schema::Document;

pub const DEFAULT_EXTENSIONS: &[&str] = &["txt", "md", "markdown", "rst"];

#[async_trait]
pub trait Loader: Send + Sync {
    async fn load(&self) -> Result<Vec<Document>>;
}

/// Whole file as a single document
pub struct TextLoader {
    path: PathBuf,
}

impl TextLoader {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_owned(),
        }
    }
}

#[async_trait]
impl Loader for TextLoader {
    async fn load(&self) -> Result<Vec<Document>> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        Ok(vec![
            Document::new(content).with_meta("source", self.path.display().to_string())
        ])
    }
}

/// One document per heading section of a markdown file
pub struct MarkdownLoader {
    path: PathBuf,
}

impl MarkdownLoader {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_owned(),
        }
    }
}

#[async_trait]
impl Loader for MarkdownLoader {
    async fn load(&self) -> Result<Vec<Document>> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        let source = self.path.display().to_string();
        Ok(split_markdown(&content)
            .into_iter()
            .map(|doc| doc.with_meta("source", source.clone()))
            .collect())
    }
}

#[derive(Default)]
struct Section {
    heading: Option<(String, usize)>,
    body: String,
}

impl Section {
    fn into_document(self) -> Option<Document> {
        let body = self.body.trim();
        match self.heading {
            Some((title, level)) => {
                let content = if body.is_empty() {
                    title.clone()
                } else {
                    format!("{}\n\n{}", title, body)
                };
                Some(
                    Document::new(content)
                        .with_meta("section", title)
                        .with_meta("level", level.to_string()),
                )
            }
            None if body.is_empty() => None,
            None => Some(Document::new(body)),
        }
    }
}

fn heading_level(level: HeadingLevel) -> usize {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

/// Split markdown into heading sections. Text before the first heading
/// becomes its own document without `section`/`level` metadata.
pub fn split_markdown(content: &str) -> Vec<Document> {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);

    let mut documents = Vec::new();
    let mut current = Section::default();
    let mut heading_text: Option<(String, usize)> = None;

    for event in Parser::new_ext(content, options) {
        match event {
            Event::Start(Tag::Heading(level, ..)) => {
                documents.extend(std::mem::take(&mut current).into_document());
                heading_text = Some((String::new(), heading_level(level)));
            }
            Event::End(Tag::Heading(..)) => {
                if let Some((title, level)) = heading_text.take() {
                    current.heading = Some((title.trim().to_string(), level));
                }
            }
            Event::Text(text) | Event::Code(text) => match heading_text.as_mut() {
                Some((title, _)) => title.push_str(&text),
                None => current.body.push_str(&text),
            },
            Event::SoftBreak | Event::HardBreak => match heading_text.as_mut() {
                Some((title, _)) => title.push(' '),
                None => current.body.push('\n'),
            },
            Event::End(Tag::Paragraph) | Event::End(Tag::CodeBlock(_)) => {
                current.body.push_str("\n\n");
            }
            Event::End(Tag::Item) => current.body.push('\n'),
            Event::Start(Tag::Item) => current.body.push_str("- "),
            _ => {}
        }
    }
    documents.extend(current.into_document());

    documents
}

/// Every matching file under a directory, in path order
pub struct DirectoryLoader {
    root: PathBuf,
    extensions: Vec<String>,
    split_markdown: bool,
}

impl DirectoryLoader {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_owned(),
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            split_markdown: false,
        }
    }

    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions
            .into_iter()
            .map(|e| e.into().trim_start_matches('.').to_ascii_lowercase())
            .collect();
        self
    }

    /// Load markdown files section by section instead of whole
    pub fn with_markdown_sections(mut self, split: bool) -> Self {
        self.split_markdown = split;
        self
    }

    fn matches(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| self.extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
            .unwrap_or(false)
    }

    /// Matching files, sorted
    pub fn files(&self) -> Result<Vec<PathBuf>> {
        if !self.root.is_dir() {
            return Err(anyhow!("{} is not a directory", self.root.display()));
        }

        let mut files: Vec<PathBuf> = WalkDir::new(&self.root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && self.matches(e.path()))
            .map(|e| e.into_path())
            .collect();
        files.sort();
        Ok(files)
    }
}

fn is_markdown(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("md") || e.eq_ignore_ascii_case("markdown"))
        .unwrap_or(false)
}

#[async_trait]
impl Loader for DirectoryLoader {
    async fn load(&self) -> Result<Vec<Document>> {
        let files = self.files()?;
        let mut documents = Vec::new();
        for path in &files {
            let loaded = if self.split_markdown && is_markdown(path) {
                MarkdownLoader::new(path).load().await?
            } else {
                TextLoader::new(path).load().await?
            };
            debug!(path = %path.display(), documents = loaded.len(), "loaded file");
            documents.extend(loaded);
        }
        info!(files = files.len(), documents = documents.len(), root = %self.root.display(), "directory loaded");
        Ok(documents)
    }
}

/// Loader for a file or directory path, picked by what exists on disk
pub fn loader_for<P: AsRef<Path>>(path: P) -> Result<Box<dyn Loader>> {
    let path = path.as_ref();
    if path.is_dir() {
        Ok(Box::new(DirectoryLoader::new(path).with_markdown_sections(true)))
    } else if path.is_file() && is_markdown(path) {
        Ok(Box::new(MarkdownLoader::new(path)))
    } else if path.is_file() {
        Ok(Box::new(TextLoader::new(path)))
    } else {
        Err(anyhow!("No such file or directory: {}", path.display()))
    }
}
