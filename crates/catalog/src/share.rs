use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use models::{GoesFrame, Id, ShareLink};
use rand::RngCore;

/// URL-safe random token for public share links.
fn new_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

pub async fn create(pool: &sqlx::PgPool, frame_id: Id, hours: i64) -> sqlx::Result<ShareLink> {
    let token = new_token();
    let expires_at = Utc::now() + Duration::hours(hours);
    sqlx::query_as::<_, ShareLink>(
        "INSERT INTO share_links (token, frame_id, expires_at)
         VALUES ($1, $2, $3)
         RETURNING token, frame_id, expires_at, created_at",
    )
    .bind(&token)
    .bind(frame_id)
    .bind(expires_at)
    .fetch_one(pool)
    .await
}

pub enum Lookup {
    Valid(ShareLink, GoesFrame),
    Expired(DateTime<Utc>),
    Missing,
}

/// Resolve a token to its frame. Expiry is a hard boundary.
pub async fn resolve(pool: &sqlx::PgPool, token: &str) -> sqlx::Result<Lookup> {
    let link: Option<ShareLink> = sqlx::query_as(
        "SELECT token, frame_id, expires_at, created_at FROM share_links WHERE token = $1",
    )
    .bind(token)
    .fetch_optional(pool)
    .await?;

    let Some(link) = link else {
        return Ok(Lookup::Missing);
    };
    if link.expires_at < Utc::now() {
        return Ok(Lookup::Expired(link.expires_at));
    }
    match crate::frames::fetch(pool, link.frame_id).await? {
        Some(frame) => Ok(Lookup::Valid(link, frame)),
        None => Ok(Lookup::Missing),
    }
}

#[cfg(test)]
mod test {
    use super::new_token;

    #[test]
    fn tokens_are_unique_and_url_safe() {
        let a = new_token();
        let b = new_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43); // 32 bytes, unpadded base64
        assert!(a
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }
}
