//! Bluesky publisher over the AT Protocol XRPC endpoints. A fresh
//! session per publish call keeps the client stateless; the daily post
//! volume is far too small for session reuse to matter.

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use igreports_common::Config;

use crate::traits::{PublishOutcome, Publisher};

const DEFAULT_PDS_URL: &str = "https://bsky.social";

pub struct BlueskyPublisher {
    handle: String,
    app_password: String,
    pds_url: String,
    http: reqwest::Client,
}

#[derive(Deserialize)]
struct Session {
    #[serde(rename = "accessJwt")]
    access_jwt: String,
    did: String,
}

#[derive(Deserialize)]
struct CreateRecordResponse {
    uri: String,
}

impl BlueskyPublisher {
    pub fn new(config: &Config) -> Self {
        Self {
            handle: config.bluesky_handle.clone(),
            app_password: config.bluesky_app_password.clone(),
            pds_url: DEFAULT_PDS_URL.to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub fn with_pds_url(mut self, url: impl Into<String>) -> Self {
        self.pds_url = url.into();
        self
    }

    async fn create_session(&self) -> Result<Session, String> {
        let resp = self
            .http
            .post(format!("{}/xrpc/com.atproto.server.createSession", self.pds_url))
            .json(&json!({
                "identifier": self.handle,
                "password": self.app_password,
            }))
            .send()
            .await
            .map_err(|e| format!("session request failed: {e}"))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(format!("session rejected ({status}): {body}"));
        }
        resp.json::<Session>()
            .await
            .map_err(|e| format!("malformed session response: {e}"))
    }

    async fn create_post(&self, session: &Session, text: &str) -> Result<String, String> {
        let resp = self
            .http
            .post(format!("{}/xrpc/com.atproto.repo.createRecord", self.pds_url))
            .bearer_auth(&session.access_jwt)
            .json(&json!({
                "repo": session.did,
                "collection": "app.bsky.feed.post",
                "record": {
                    "$type": "app.bsky.feed.post",
                    "text": text,
                    "createdAt": Utc::now().to_rfc3339(),
                },
            }))
            .send()
            .await
            .map_err(|e| format!("post request failed: {e}"))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(format!("post rejected ({status}): {body}"));
        }
        let created = resp
            .json::<CreateRecordResponse>()
            .await
            .map_err(|e| format!("malformed post response: {e}"))?;
        Ok(created.uri)
    }
}

#[async_trait]
impl Publisher for BlueskyPublisher {
    async fn publish(&self, text: &str) -> PublishOutcome {
        let session = match self.create_session().await {
            Ok(s) => s,
            Err(detail) => return PublishOutcome::Failed { detail },
        };
        debug!(did = %session.did, "Bluesky session established");

        match self.create_post(&session, text).await {
            Ok(reference) => PublishOutcome::Published { reference },
            Err(detail) => PublishOutcome::Failed { detail },
        }
    }
}
