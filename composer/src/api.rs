//! REST client for the club platform backend.
//!
//! Covers the collaborators around the composer: the club listing that
//! feeds mention lookup, and post creation, listing and deletion. Calls that
//! need a signed-in club take the [`Session`] explicitly.

use richdoc::Document;
use serde::{Deserialize, Serialize};

use crate::lookup::Entity;

/// HTTP client for one backend instance.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
}

/// Credentials of a signed-in club, as the session cookie the backend set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub cookie: String,
}

impl Session {
    pub fn new(cookie: impl Into<String>) -> Self {
        Session {
            cookie: cookie.into(),
        }
    }
}

/// One page of a paginated listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paged<T> {
    pub content: Vec<T>,
    pub page: u32,
    pub size: u32,
    pub total_elements: u64,
    pub total_pages: u32,
    pub last: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClubResponse {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub profile_picture: Option<String>,
    #[serde(default)]
    pub banner: Option<String>,
}

impl From<ClubResponse> for Entity {
    fn from(club: ClubResponse) -> Self {
        Entity {
            id: club.id,
            name: club.name,
            image: club.profile_picture,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostResponse {
    pub id: i64,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub club: Option<ClubResponse>,
    #[serde(default)]
    pub creation_date: Option<String>,
}

impl PostResponse {
    /// The post body as a document; legacy plain-text bodies become one paragraph.
    pub fn document(&self) -> Document {
        richdoc::deserialize(&self.content)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePost {
    pub title: String,
    pub content: String,
}

impl CreatePost {
    pub fn new(title: impl Into<String>, body: &Document) -> Self {
        CreatePost {
            title: title.into(),
            content: richdoc::serialize(body),
        }
    }
}

/// Errors from the backend API layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The HTTP request itself failed (network, DNS, TLS, decoding).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The backend answered with a non-2xx status.
    #[error("backend returned {status}: {body}")]
    Status { status: u16, body: String },
}

impl ApiClient {
    /// * `base_url` - backend root, e.g. `http://localhost:8080`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/v1/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// `GET /clubs?page=&size=`
    pub async fn list_clubs(&self, page: u32, size: u32) -> Result<Paged<ClubResponse>, ApiError> {
        tracing::debug!(page, size, "listing clubs");
        let response = self
            .client
            .get(self.endpoint("clubs"))
            .query(&[("page", page), ("size", size)])
            .send()
            .await?;
        Self::parse_response(response).await
    }

    /// `POST /posts` as the signed-in club.
    pub async fn create_post(&self, session: &Session, post: &CreatePost) -> Result<PostResponse, ApiError> {
        tracing::debug!(title = %post.title, bytes = post.content.len(), "creating post");
        let response = self
            .client
            .post(self.endpoint("posts"))
            .header(reqwest::header::COOKIE, &session.cookie)
            .json(post)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    /// `GET /clubs/{id}/posts`, newest first.
    pub async fn list_club_posts(
        &self,
        club_id: i64,
        page: u32,
        size: u32,
    ) -> Result<Paged<PostResponse>, ApiError> {
        let page = page.to_string();
        let size = size.to_string();
        let response = self
            .client
            .get(self.endpoint(&format!("clubs/{}/posts", club_id)))
            .query(&[
                ("page", page.as_str()),
                ("size", size.as_str()),
                ("sort", "creationDate,desc"),
            ])
            .send()
            .await?;
        Self::parse_response(response).await
    }

    /// `DELETE /posts/{id}` as the signed-in club.
    pub async fn delete_post(&self, session: &Session, post_id: i64) -> Result<(), ApiError> {
        tracing::debug!(post_id, "deleting post");
        let response = self
            .client
            .delete(self.endpoint(&format!("posts/{}", post_id)))
            .header(reqwest::header::COOKIE, &session.cookie)
            .send()
            .await?;
        Self::ensure_success(response).await?;
        Ok(())
    }

    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            tracing::warn!(status = status.as_u16(), "backend request failed");
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_join_cleanly() {
        let api = ApiClient::new("http://localhost:8080/");
        assert_eq!(api.endpoint("clubs"), "http://localhost:8080/api/v1/clubs");
        assert_eq!(api.endpoint("/posts/3"), "http://localhost:8080/api/v1/posts/3");
    }

    #[test]
    fn paged_clubs_decode_from_backend_shape() {
        let body = r#"{"content":[{"id":7,"name":"Chess Club","description":null,"tags":["games"],
            "profilePicture":"https://cdn.uni.edu/chess.png","banner":null}],
            "page":0,"size":50,"totalElements":1,"totalPages":1,"last":true}"#;
        let page: Paged<ClubResponse> = serde_json::from_str(body).unwrap();
        assert!(page.last);
        let entity: Entity = page.content.into_iter().next().unwrap().into();
        assert_eq!(
            entity,
            Entity {
                id: 7,
                name: "Chess Club".into(),
                image: Some("https://cdn.uni.edu/chess.png".into()),
            }
        );
    }

    #[test]
    fn create_post_carries_serialized_body() {
        let body = Document {
            nodes: vec![richdoc::Block::paragraph(vec![richdoc::Inline::mention(9, "Chemistry Club")])],
        };
        let post = CreatePost::new("Fair", &body);
        let json = serde_json::to_value(&post).unwrap();
        assert_eq!(json["title"], "Fair");
        assert_eq!(richdoc::deserialize(json["content"].as_str().unwrap()), body);
    }

    #[test]
    fn legacy_posts_read_as_text() {
        let post = PostResponse {
            id: 1,
            title: "Old".into(),
            content: "plain words".into(),
            club: None,
            creation_date: None,
        };
        assert_eq!(post.document().to_string(), "plain words\n");
    }
}
