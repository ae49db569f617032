use anyhow::{bail, Context};
use lopdf::Document;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const SUPPORTED_EXTENSIONS: [&str; 2] = ["pdf", "txt"];

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

pub fn is_supported(path: &Path) -> bool {
    extension_of(path).is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
}

/// Files to ingest for `path`: the file itself, or every supported file below a folder.
pub fn discover_documents(path: &Path) -> Vec<PathBuf> {
    if !path.is_dir() {
        return vec![path.to_path_buf()];
    }

    let mut files: Vec<PathBuf> = WalkDir::new(path)
        .into_iter()
        .filter_map(|item| item.ok())
        .filter(|entry| entry.file_type().is_file() && is_supported(entry.path()))
        .map(|entry| entry.path().to_path_buf())
        .collect();

    files.sort_unstable();
    files
}

pub fn source_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}

pub fn read_document_text(path: &Path) -> anyhow::Result<String> {
    match extension_of(path).as_deref() {
        Some("pdf") => read_pdf(path),
        Some("txt") => read_txt(path),
        _ => bail!(
            "unsupported file type: {} (only PDF and TXT files are allowed)",
            path.display()
        ),
    }
}

fn read_pdf(path: &Path) -> anyhow::Result<String> {
    let document = Document::load(path)
        .with_context(|| format!("failed to open pdf {}", path.display()))?;

    let mut text = String::new();
    for (page_no, _page_id) in document.get_pages() {
        let page_text = document
            .extract_text(&[page_no])
            .with_context(|| format!("failed to extract page {page_no} of {}", path.display()))?;
        if !page_text.trim().is_empty() {
            text.push_str(&format!("\n--- Page {page_no} ---\n{page_text}\n"));
        }
    }

    if text.trim().is_empty() {
        bail!("could not extract text from pdf: {}", path.display());
    }
    Ok(text.trim().to_string())
}

fn read_txt(path: &Path) -> anyhow::Result<String> {
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let text = match String::from_utf8(bytes) {
        Ok(text) => text,
        // Latin-1 maps every byte to the code point of the same value.
        Err(error) => error.into_bytes().into_iter().map(char::from).collect(),
    };
    Ok(text.trim().to_string())
}
