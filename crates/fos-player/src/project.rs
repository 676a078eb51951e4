//! Project discovery
//!
//! A project directory holds `index.html`, whose `<script src>` tags give
//! the scripts to run in document order, and an optional `package.json`
//! with window settings.

use std::cell::RefCell;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use html5ever::TokenizerResult;
use html5ever::tendril::StrTendril;
use html5ever::tokenizer::states::RawKind;
use html5ever::tokenizer::{
    BufferQueue, StartTag, TagToken, Token, TokenSink, TokenSinkResult, Tokenizer, TokenizerOpts,
};
use serde::Deserialize;

pub const INDEX_FILE: &str = "index.html";
pub const PACKAGE_FILE: &str = "package.json";

/// Window settings from `package.json`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "fOS Player".to_string(),
            width: 816,
            height: 624,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct Package {
    #[serde(default)]
    window: WindowConfig,
}

/// A discovered project
#[derive(Debug)]
pub struct Project {
    pub dir: PathBuf,
    pub scripts: Vec<String>,
    pub window: WindowConfig,
}

impl Project {
    pub fn open(dir: &Path) -> Result<Self> {
        let index = dir.join(INDEX_FILE);
        if !index.is_file() {
            bail!("{} is not a project directory: {INDEX_FILE} not found", dir.display());
        }
        let html = fs::read_to_string(&index)
            .with_context(|| format!("cannot read {}", index.display()))?;
        let scripts = script_sources(&html);
        tracing::info!(count = scripts.len(), "scripts found in {INDEX_FILE}");

        Ok(Self {
            dir: dir.to_path_buf(),
            scripts,
            window: window_config(dir)?,
        })
    }
}

fn window_config(dir: &Path) -> Result<WindowConfig> {
    let path = dir.join(PACKAGE_FILE);
    let text = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::debug!("no {PACKAGE_FILE}, using default window");
            return Ok(WindowConfig::default());
        }
        Err(e) => {
            tracing::debug!(error = %e, "cannot read {PACKAGE_FILE}, using default window");
            return Ok(WindowConfig::default());
        }
    };
    let package: Package = serde_json::from_str(&text)
        .with_context(|| format!("malformed {}", path.display()))?;
    Ok(package.window)
}

/// Collects `src` of script start tags
#[derive(Default)]
struct ScriptSink {
    sources: RefCell<Vec<String>>,
}

impl TokenSink for ScriptSink {
    type Handle = ();

    fn process_token(&self, token: Token, _line: u64) -> TokenSinkResult<()> {
        let TagToken(tag) = token else {
            return TokenSinkResult::Continue;
        };
        if tag.kind != StartTag || &*tag.name != "script" {
            return TokenSinkResult::Continue;
        }
        if let Some(src) = tag.attrs.iter().find(|a| &*a.name.local == "src") {
            let src = src.value.trim();
            if !src.is_empty() {
                self.sources.borrow_mut().push(src.to_string());
            }
        }
        // keep inline code from being read as markup
        TokenSinkResult::RawData(RawKind::ScriptData)
    }
}

/// `src` of every `<script>` in document order
pub fn script_sources(html: &str) -> Vec<String> {
    let tokenizer = Tokenizer::new(ScriptSink::default(), TokenizerOpts::default());
    let input = BufferQueue::default();
    input.push_back(StrTendril::from_slice(html));
    // a sink may suspend at a script; nothing runs here, so resume until drained
    while let TokenizerResult::Script(()) = tokenizer.feed(&input) {
        tracing::trace!("tokenizer suspended at a script");
    }
    tokenizer.end();
    tokenizer.sink.sources.take()
}
