//! Command handlers.

use std::path::Path;

use super::AppContext;
use crate::models::{Document, SourceType};
use crate::services::ExtractionError;

/// Sniff a MIME type from content, falling back to a generic default.
fn detect_mime(content: &[u8], explicit: Option<&str>) -> String {
    if let Some(mime) = explicit {
        return mime.to_string();
    }
    infer::get(content)
        .map(|kind| kind.mime_type().to_string())
        .unwrap_or_else(|| "text/plain".to_string())
}

fn print_extraction(extraction: &crate::models::Extraction) {
    println!("extraction {}", extraction.id);
    println!("  document:   {}", extraction.document_id);
    println!("  version:    {}", extraction.version);
    println!("  status:     {}", extraction.status.as_str());
    println!("  doc type:   {}", extraction.doc_type.as_str());
    if let Some(parser) = &extraction.parser_used {
        println!("  parser:     {parser}");
    }
    if let Some(confidence) = extraction.overall_confidence {
        println!("  confidence: {confidence:.2}");
    }
    if let Some(error) = &extraction.error {
        println!("  error:      {error}");
    }
}

pub async fn ingest(app: &AppContext, file: &Path, mime: Option<&str>) -> anyhow::Result<()> {
    let content = std::fs::read(file)?;
    let mime_type = detect_mime(&content, mime);
    let file_name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned());

    let document = Document::new(
        app.ctx.tenant_id(),
        &content,
        file_name,
        mime_type,
        SourceType::Upload,
    );
    let stored = app.documents.insert(&document)?;
    if stored.id != document.id {
        println!("document already known as {}", stored.id);
    } else {
        println!("document {} ({} bytes, {})", stored.id, stored.size_bytes, stored.mime_type);
    }

    run_extraction(app, &stored.id, &content).await
}

pub async fn process(app: &AppContext, document_id: &str, file: &Path) -> anyhow::Result<()> {
    let content = std::fs::read(file)?;
    run_extraction(app, document_id, &content).await
}

async fn run_extraction(app: &AppContext, document_id: &str, content: &[u8]) -> anyhow::Result<()> {
    match app.orchestrator.process(&app.ctx, document_id, content).await {
        Ok(extraction) => {
            print_extraction(&extraction);
            if let Some(item) = app
                .review
                .get_by_extraction(&app.ctx, &extraction.id)?
            {
                println!("  queued for review as {} (priority {})", item.id, item.priority);
            }
            Ok(())
        }
        Err(e @ ExtractionError::ParserChainExhausted { .. }) => {
            let kind = if e.is_transient() { "transient" } else { "terminal" };
            anyhow::bail!("extraction failed ({kind}): {e}")
        }
        Err(e) => Err(e.into()),
    }
}

pub fn queue_list(app: &AppContext) -> anyhow::Result<()> {
    let items = app.review.list(&app.ctx)?;
    if items.is_empty() {
        println!("review queue is empty");
        return Ok(());
    }
    println!("{:<38} {:>8}  {:<12} {}", "id", "priority", "status", "extraction");
    for item in items {
        println!(
            "{:<38} {:>8}  {:<12} {}",
            item.id,
            item.priority,
            item.status.as_str(),
            item.extraction_id
        );
    }
    Ok(())
}

pub fn queue_claim(app: &AppContext, item_id: &str, user: &str) -> anyhow::Result<()> {
    let item = app.review.claim(&app.ctx, item_id, user)?;
    println!("claimed {} for {user}", item.id);
    Ok(())
}

pub fn queue_complete(app: &AppContext, item_id: &str, user: &str) -> anyhow::Result<()> {
    let item = app.review.complete(&app.ctx, item_id, user)?;
    println!("completed {}", item.id);
    Ok(())
}

pub fn queue_skip(app: &AppContext, item_id: &str, user: &str) -> anyhow::Result<()> {
    let item = app.review.skip(&app.ctx, item_id, user)?;
    println!("skipped {}", item.id);
    Ok(())
}

pub fn queue_sweep(app: &AppContext) -> anyhow::Result<()> {
    let released = app.review.sweep(&app.ctx)?;
    println!("released {released} stale claim(s)");
    Ok(())
}

pub async fn parsers(app: &AppContext) -> anyhow::Result<()> {
    for adapter in app.router.all_adapters() {
        let mark = if adapter.is_available() { "+" } else { "-" };
        let health = if adapter.is_available() {
            match adapter.health_check().await {
                Ok(()) => "ok".to_string(),
                Err(e) => format!("unhealthy: {e}"),
            }
        } else {
            adapter.availability_hint()
        };
        println!("{mark} {:<10} {health}", adapter.name());
    }
    Ok(())
}

pub fn status(app: &AppContext) -> anyhow::Result<()> {
    println!("documents:");
    for (status, count) in app.documents.status_counts(app.ctx.tenant_id())? {
        println!("  {:<12} {count}", status.as_str());
    }
    println!("review queue:");
    for (status, count) in app.review.status_counts(&app.ctx)? {
        println!("  {:<12} {count}", status.as_str());
    }
    Ok(())
}
