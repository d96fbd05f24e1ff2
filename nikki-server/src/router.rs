use nikki_core::protocol::{DiaryRequest, DiaryResponse};
use nikki_core::DiaryError;

use crate::context::DiaryContext;
use crate::subsystems::checkins::{self, CheckInOutcome};
use crate::subsystems::{entries, media};

pub async fn handle_request(request: DiaryRequest, ctx: &DiaryContext) -> DiaryResponse {
    match request {
        DiaryRequest::Health => match entries::load(ctx).await {
            Ok(doc) => DiaryResponse::ok(serde_json::json!({
                "status": "healthy",
                "store": ctx.store_name(),
                "entries": doc.entries.len(),
                "checkins": doc.checkins.len(),
            })),
            Err(e) => {
                tracing::error!(error = %e, "Health check could not read the diary");
                DiaryResponse::from_error(&e)
            }
        },
        DiaryRequest::Load => to_response(entries::load(ctx).await.and_then(|doc| {
            serde_json::to_value(&doc).map_err(DiaryError::from)
        })),
        DiaryRequest::CheckPassword { password } => {
            match ctx.auth.require(password.as_deref()) {
                Ok(()) => DiaryResponse::ok(serde_json::json!({"ok": true})),
                Err(e) => DiaryResponse::from_error(&e),
            }
        }
        DiaryRequest::Submit {
            password,
            text,
            image_url,
        } => to_response(
            entries::submit(ctx, password.as_deref(), &text, image_url)
                .await
                .and_then(|submitted| {
                    Ok(serde_json::json!({
                        "entry": serde_json::to_value(&submitted.entry)?,
                        "entries": serde_json::to_value(&submitted.document.entries)?,
                    }))
                }),
        ),
        DiaryRequest::Delete { password, id } => {
            match entries::delete(ctx, password.as_deref(), &id).await {
                Ok(doc) => DiaryResponse::ok(serde_json::json!({
                    "deleted": id,
                    "remaining": doc.entries.len(),
                })),
                Err(e) => DiaryResponse::from_error(&e),
            }
        }
        DiaryRequest::CheckIn {
            password,
            at,
            utc_offset_minutes,
        } => match checkins::check_in(ctx, password.as_deref(), at, utc_offset_minutes).await {
            Ok(CheckInOutcome::Recorded { checkins }) => to_response(
                serde_json::to_value(&checkins)
                    .map(|c| serde_json::json!({"checked_in": true, "checkins": c}))
                    .map_err(DiaryError::from),
            ),
            Ok(CheckInOutcome::AlreadyCheckedIn { day }) => DiaryResponse::ok(serde_json::json!({
                "checked_in": false,
                "reason": format!("already checked in on {day}"),
            })),
            Err(e) => DiaryResponse::from_error(&e),
        },
        DiaryRequest::Avatar => to_response(
            media::avatar(ctx)
                .await
                .and_then(|avatar| serde_json::to_value(avatar).map_err(DiaryError::from)),
        ),
    }
}

fn to_response(result: Result<serde_json::Value, DiaryError>) -> DiaryResponse {
    match result {
        Ok(data) => DiaryResponse::ok(data),
        Err(e) => DiaryResponse::from_error(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subsystems::test_support::{context, SECRET};
    use nikki_core::DocumentStore;

    #[tokio::test]
    async fn health_reports_store_and_counts() {
        let (ctx, _) = context();
        let resp = handle_request(DiaryRequest::Health, &ctx).await;
        let data = resp.data.unwrap();
        assert_eq!(data["status"], "healthy");
        assert_eq!(data["store"], "memory");
        assert_eq!(data["entries"], 0);
    }

    #[tokio::test]
    async fn check_password_uses_the_gate() {
        let (ctx, _) = context();
        let ok = handle_request(
            DiaryRequest::CheckPassword {
                password: Some(SECRET.to_string()),
            },
            &ctx,
        )
        .await;
        assert!(ok.is_ok());

        let denied = handle_request(DiaryRequest::CheckPassword { password: None }, &ctx).await;
        assert_eq!(denied.kind.as_deref(), Some("unauthorized"));
    }

    #[tokio::test]
    async fn submit_then_load_round_trips() {
        let (ctx, _) = context();
        let resp = handle_request(
            DiaryRequest::Submit {
                password: Some(SECRET.to_string()),
                text: "今日は良い一日でした".to_string(),
                image_url: None,
            },
            &ctx,
        )
        .await;
        let data = resp.data.unwrap();
        assert_eq!(data["entries"].as_array().unwrap().len(), 1);
        assert_eq!(data["entry"]["text"], "今日は良い一日でした");

        let loaded = handle_request(DiaryRequest::Load, &ctx).await.data.unwrap();
        assert_eq!(loaded["entries"][0]["id"], data["entry"]["id"]);
        assert_eq!(loaded["checkins"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn corrupt_document_loads_empty() {
        let (ctx, store) = context();
        store.insert(&ctx.document_key, "{not an array}").await;

        let resp = handle_request(DiaryRequest::Load, &ctx).await;
        assert!(resp.is_ok());
        assert_eq!(
            resp.data.unwrap(),
            serde_json::json!({"entries": [], "checkins": []})
        );
    }

    #[tokio::test]
    async fn delete_unknown_reports_entry_not_found() {
        let (ctx, store) = context();
        let resp = handle_request(
            DiaryRequest::Delete {
                password: Some(SECRET.to_string()),
                id: "missing".to_string(),
            },
            &ctx,
        )
        .await;
        assert_eq!(resp.kind.as_deref(), Some("entry_not_found"));
        assert!(store.fetch(&ctx.document_key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn repeated_checkin_is_ok_but_not_recorded() {
        let (ctx, _) = context();
        let request = || DiaryRequest::CheckIn {
            password: Some(SECRET.to_string()),
            at: None,
            utc_offset_minutes: 0,
        };
        let first = handle_request(request(), &ctx).await.data.unwrap();
        assert_eq!(first["checked_in"], true);

        let second = handle_request(request(), &ctx).await;
        assert!(second.is_ok());
        assert_eq!(second.data.unwrap()["checked_in"], false);
    }
}
