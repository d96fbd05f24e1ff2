use nikki_core::media::Avatar;
use nikki_core::DiaryError;

use crate::context::DiaryContext;

pub async fn avatar(ctx: &DiaryContext) -> Result<Avatar, DiaryError> {
    ctx.avatar.avatar().await
}

/// Authenticate, then store `bytes` as a new image. Returns its public URL.
pub async fn upload(
    ctx: &DiaryContext,
    password: Option<&str>,
    bytes: &[u8],
    content_type: Option<&str>,
) -> Result<String, DiaryError> {
    ctx.auth.require(password)?;
    ctx.uploader.upload(bytes, content_type).await
}
