use std::sync::Arc;

use log::{debug, warn};
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use sharelocation_logic::{PositionStore, PositionUpdate, StoreError, UserPosition};

use crate::{
    FirebaseConfig, SharedSession,
    documents::{Document, DocumentPage, encode_update},
};

const PAGE_SIZE: &str = "300";

fn write_failed(why: impl std::fmt::Display) -> StoreError {
    StoreError::WriteFailed(why.to_string())
}

fn read_failed(why: impl std::fmt::Display) -> StoreError {
    StoreError::ReadFailed(why.to_string())
}

/// The user collection in Cloud Firestore, through its REST API
pub struct Firestore {
    client: Client,
    config: Arc<FirebaseConfig>,
    session: SharedSession,
}

impl Firestore {
    pub(crate) fn new(client: Client, config: Arc<FirebaseConfig>, session: SharedSession) -> Self {
        Self {
            client,
            config,
            session,
        }
    }

    /// Attach the signed in user's ID token, requests go out anonymously otherwise
    async fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match self.session.read().await.as_ref() {
            Some(session) => req.bearer_auth(&session.id_token),
            None => req,
        }
    }

    async fn fetch_page(&self, page_token: Option<&str>) -> Result<DocumentPage, StoreError> {
        let mut url = Url::parse(&self.config.collection_url()).map_err(read_failed)?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("pageSize", PAGE_SIZE);
            if let Some(token) = page_token {
                query.append_pair("pageToken", token);
            }
        }

        self.authorize(self.client.get(url))
            .await
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .map_err(read_failed)?
            .json::<DocumentPage>()
            .await
            .map_err(read_failed)
    }
}

impl PositionStore for Firestore {
    async fn upsert(&self, user_id: &str, update: PositionUpdate) -> Result<(), StoreError> {
        if update.is_empty() {
            return Ok(());
        }

        let encoded = encode_update(&update);
        let mut url = Url::parse(&self.config.document_url(user_id)).map_err(write_failed)?;
        {
            let mut query = url.query_pairs_mut();
            for field in &encoded.mask {
                query.append_pair("updateMask.fieldPaths", field);
            }
        }

        self.authorize(self.client.patch(url))
            .await
            .json(&encoded.body)
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .map_err(write_failed)?;

        debug!("Wrote {:?} for {user_id}", encoded.mask);

        Ok(())
    }

    async fn get(&self, user_id: &str) -> Result<Option<UserPosition>, StoreError> {
        let url = Url::parse(&self.config.document_url(user_id)).map_err(read_failed)?;

        let resp = self
            .authorize(self.client.get(url))
            .await
            .send()
            .await
            .map_err(read_failed)?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let doc = resp
            .error_for_status()
            .map_err(read_failed)?
            .json::<Document>()
            .await
            .map_err(read_failed)?;

        Ok(Some(doc.into_position()))
    }

    async fn get_all(&self) -> Result<Vec<UserPosition>, StoreError> {
        let mut positions = Vec::new();
        let mut page_token = None;

        loop {
            let page = self.fetch_page(page_token.as_deref()).await?;
            positions.extend(page.documents.into_iter().map(Document::into_position));

            match page.next_page_token {
                Some(token) if !token.is_empty() => {
                    if page_token.as_ref() == Some(&token) {
                        warn!("Firestore returned the same page token twice, stopping");
                        break;
                    }
                    page_token = Some(token);
                }
                _ => break,
            }
        }

        Ok(positions)
    }
}

#[cfg(test)]
mod tests {
    use sharelocation_logic::{AuthProvider, Location};

    use super::*;
    use crate::tests::StubServer;

    const DOCS: &str = "/v1/projects/demo/databases/(default)/documents/pessoa";

    fn doc(id: &str, name: &str) -> String {
        format!(
            r#"{{"name": "projects/demo/databases/(default)/documents/pessoa/{id}", "fields": {{"nome": {{"stringValue": "{name}"}}, "latitude": {{"doubleValue": 1.5}}, "longitude": {{"integerValue": "2"}}}}}}"#
        )
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let server = StubServer::start().await;
        let (_, store) = server.clients();
        server.reply(404, r#"{"error": {"code": 404, "status": "NOT_FOUND"}}"#);
        server.reply(200, doc("abc", "Ana"));

        assert_eq!(store.get("nobody").await, Ok(None));

        let found = store.get("abc").await.expect("Read failed").expect("No record");
        assert_eq!(found.user_id, "abc");
        assert_eq!(found.display_name.as_deref(), Some("Ana"));
        assert_eq!(found.location(), Some(Location::new(1.5, 2.0)));

        let seen = server.seen();
        assert_eq!(seen[0].method, "GET");
        assert_eq!(seen[0].target, format!("{DOCS}/nobody"));
        assert_eq!(seen[0].header("authorization"), None, "Sent a token while signed out");
    }

    #[tokio::test]
    async fn test_server_error_is_read_failure() {
        let server = StubServer::start().await;
        let (_, store) = server.clients();
        server.reply(503, r#"{"error": {"code": 503}}"#);

        assert!(matches!(store.get("abc").await, Err(StoreError::ReadFailed(_))));
    }

    #[tokio::test]
    async fn test_get_all_follows_pages() {
        let server = StubServer::start().await;
        let (_, store) = server.clients();
        server.reply(
            200,
            format!(r#"{{"documents": [{}], "nextPageToken": "p2"}}"#, doc("a", "Ana")),
        );
        server.reply(200, format!(r#"{{"documents": [{}]}}"#, doc("b", "Bruno")));

        let all = store.get_all().await.expect("Read failed");
        let ids = all.iter().map(|r| r.user_id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["a", "b"]);

        let seen = server.seen();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].target, format!("{DOCS}?pageSize=300"));
        assert_eq!(seen[1].target, format!("{DOCS}?pageSize=300&pageToken=p2"));
    }

    #[tokio::test]
    async fn test_get_all_stops_on_repeated_token() {
        let server = StubServer::start().await;
        let (_, store) = server.clients();
        for id in ["a", "b", "c"] {
            server.reply(
                200,
                format!(r#"{{"documents": [{}], "nextPageToken": "same"}}"#, doc(id, id)),
            );
        }

        let all = store.get_all().await.expect("Read failed");
        assert_eq!(all.len(), 2);
        assert_eq!(server.seen().len(), 2, "Kept asking for the same page");
    }

    #[tokio::test]
    async fn test_get_all_empty_collection() {
        let server = StubServer::start().await;
        let (_, store) = server.clients();
        server.reply(200, "{}");

        assert_eq!(store.get_all().await, Ok(Vec::new()));
    }

    #[tokio::test]
    async fn test_upsert_masks_fields() {
        let server = StubServer::start().await;
        let (_, store) = server.clients();
        server.reply(200, doc("abc", "Ana"));
        server.reply(403, r#"{"error": {"code": 403}}"#);

        store
            .upsert("abc", PositionUpdate::location(Location::new(10.0, 20.0)))
            .await
            .expect("Write failed");

        let seen = server.seen();
        assert_eq!(seen[0].method, "PATCH");
        assert_eq!(
            seen[0].target,
            format!(
                "{DOCS}/abc?updateMask.fieldPaths=latitude&updateMask.fieldPaths=longitude"
            )
        );
        let body = seen[0].json();
        assert_eq!(body["fields"]["latitude"]["doubleValue"], 10.0);
        assert!(body["fields"].get("nome").is_none(), "Name would be cleared");

        let res = store
            .upsert("abc", PositionUpdate::profile("Ana", "ana@example.com"))
            .await;
        assert!(matches!(res, Err(StoreError::WriteFailed(_))));

        store
            .upsert("abc", PositionUpdate::default())
            .await
            .expect("Empty update failed");
        assert_eq!(server.seen().len(), 2, "Sent an empty update");
    }

    #[tokio::test]
    async fn test_requests_carry_token_after_sign_in() {
        let server = StubServer::start().await;
        let (auth, store) = server.clients();
        server.reply(200, r#"{"localId": "abc", "idToken": "tok-1"}"#);
        server.reply(200, doc("abc", "Ana"));

        auth.sign_in("ana@example.com", "secret1")
            .await
            .expect("Sign in failed");
        store.get("abc").await.expect("Read failed");

        let seen = server.seen();
        assert_eq!(seen[1].header("authorization"), Some("Bearer tok-1"));

        auth.sign_out().await;
        server.reply(404, "{}");
        store.get("abc").await.expect("Read failed");
        assert_eq!(server.seen()[2].header("authorization"), None);
    }
}
