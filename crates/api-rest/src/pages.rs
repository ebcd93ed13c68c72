//! HTML pages rendered from the template directory.
//!
//! Templates are read on every request, so edits show up without a restart and a
//! missing template surfaces as a request error rather than a startup failure.
//!
//! `documents.html` must contain the `{{documents}}` marker; it is replaced with
//! one list item per document, each linking to its download.

use docdir_files::DocumentName;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use std::path::PathBuf;

pub const HOME_TEMPLATE: &str = "home.html";
pub const DOCUMENTS_TEMPLATE: &str = "documents.html";
pub const DOCUMENTS_MARKER: &str = "{{documents}}";

#[derive(Debug, thiserror::Error)]
pub enum PagesError {
    #[error("failed to load template {path}: {source}", path = path.display())]
    TemplateLoad {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Renders the home and documents pages
#[derive(Clone, Debug)]
pub struct Pages {
    template_dir: PathBuf,
}

impl Pages {
    pub fn new(template_dir: impl Into<PathBuf>) -> Self {
        Self {
            template_dir: template_dir.into(),
        }
    }

    /// Renders the static home page.
    pub async fn home(&self) -> Result<String, PagesError> {
        self.load(HOME_TEMPLATE).await
    }

    /// Renders the document listing page for `names`, in the given order.
    pub async fn documents(&self, names: &[DocumentName]) -> Result<String, PagesError> {
        let template = self.load(DOCUMENTS_TEMPLATE).await?;
        Ok(template.replace(DOCUMENTS_MARKER, &render_document_list(names)))
    }

    async fn load(&self, file_name: &str) -> Result<String, PagesError> {
        let path = self.template_dir.join(file_name);
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| PagesError::TemplateLoad { path, source })
    }
}

fn render_document_list(names: &[DocumentName]) -> String {
    if names.is_empty() {
        return "<p class=\"empty\">No documents uploaded yet.</p>".to_string();
    }

    let mut html = String::from("<ul class=\"documents\">\n");
    for name in names {
        html.push_str(&format!(
            "  <li><a href=\"/download?file={}\">{}</a></li>\n",
            utf8_percent_encode(name.as_str(), NON_ALPHANUMERIC),
            escape_html(name.as_str()),
        ));
    }
    html.push_str("</ul>");
    html
}

fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
