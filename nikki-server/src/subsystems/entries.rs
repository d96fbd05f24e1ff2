use chrono::Utc;
use nikki_core::{DiaryDocument, DiaryEntry, DiaryError};

use crate::context::DiaryContext;
use crate::subsystems::commit_message;

/// A newly committed entry plus the document it landed in.
#[derive(Debug)]
pub struct Submitted {
    pub entry: DiaryEntry,
    pub document: DiaryDocument,
}

pub async fn load(ctx: &DiaryContext) -> Result<DiaryDocument, DiaryError> {
    let (document, _) = ctx.rmw.adapter().read(&ctx.document_key).await?;
    Ok(document)
}

/// Authenticate, annotate, then prepend a new entry.
///
/// Commentary is requested before the document is read so the version token
/// is held for as short a time as possible.
pub async fn submit(
    ctx: &DiaryContext,
    password: Option<&str>,
    text: &str,
    image_url: Option<String>,
) -> Result<Submitted, DiaryError> {
    ctx.auth.require(password)?;

    let text = text.trim();
    let image_url = image_url.filter(|u| !u.trim().is_empty());
    if text.is_empty() && image_url.is_none() {
        return Err(DiaryError::InvalidRequest(
            "entry needs text or an image".to_string(),
        ));
    }

    let commentary = if text.is_empty() {
        None
    } else {
        ctx.annotator.annotate(text).await
    };

    let entry = DiaryEntry::new(text, image_url, Utc::now()).with_commentary(commentary);
    tracing::debug!(id = %entry.id, annotated = entry.gemini_response.is_some(), "Submitting entry");

    let to_insert = entry.clone();
    let committed = ctx
        .rmw
        .mutate(&ctx.document_key, &commit_message("add entry"), move |doc| {
            Ok(doc.with_entry(to_insert))
        })
        .await?;

    Ok(Submitted {
        entry,
        document: committed.document,
    })
}

/// Authenticate, then remove the entry keyed by `id`.
pub async fn delete(
    ctx: &DiaryContext,
    password: Option<&str>,
    id: &str,
) -> Result<DiaryDocument, DiaryError> {
    ctx.auth.require(password)?;

    if id.trim().is_empty() {
        return Err(DiaryError::InvalidRequest("id is required".to_string()));
    }

    let committed = ctx
        .rmw
        .mutate(&ctx.document_key, &commit_message("delete entry"), |doc| {
            doc.without_entry(id)
        })
        .await?;
    Ok(committed.document)
}
