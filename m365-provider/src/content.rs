//! Mobile app content upload.
//!
//! Uploading a package to an Intune mobile app is a chain of dependent
//! requests, all under `{app}/{app type}/contentVersions`:
//!
//! ```text
//! POST contentVersions                        -> version id
//! POST contentVersions/{v}/files              -> file id
//! poll files/{f} until azureStorageUriRequestSuccess
//! PUT blocks + block list to the returned SAS URI
//! POST files/{f}/commit with the encryption info
//! poll files/{f} until commitFileSuccess
//! PATCH {app} committedContentVersion = {v}
//! poll {app} until publishingState = published
//! ```
//!
//! The package is prepared (and encrypted) in the pre phase so that a bad
//! source file fails before the app itself is written. The committed
//! version is remembered in private state to skip uploads that would not
//! change anything.

use crate::error::{ProviderError, ProviderResult};
use crate::package::{self, PreparedContent};
use crate::policy::{CriticalSection, PollPolicy, PollState, poll_until};
use crate::private_state::PrivateState;
use crate::subaction::{ActionContext, Operation, Stash, StashKey, SubAction};
use async_trait::async_trait;
use m365_crypto::digest_file;
use m365_model::ODATA_TYPE;
use m365_types::TypedValue;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Private state key of the last committed content.
pub const PRIVATE_STATE_KEY: &str = "mobile_app_content";

/// Attribute of the content object holding the package path.
pub const SOURCE_FILE: &str = "source_file";
/// Attribute of the content object holding the package's SHA-256 (hex).
pub const SOURCE_SHA256: &str = "source_sha256";

const STAGED: StashKey<StagedContent> = StashKey::new("mobile_app_content.staged");

/// What was last committed for an app, as stored in private state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentPrivateData {
    #[serde(rename = "ContentVersionIdCommited", default, skip_serializing_if = "Option::is_none")]
    pub content_version_id_commited: Option<String>,
    #[serde(rename = "ContentMd5", default, skip_serializing_if = "Option::is_none")]
    pub content_md5: Option<String>,
    #[serde(rename = "SourceSha256", default, skip_serializing_if = "Option::is_none")]
    pub source_sha256: Option<String>,
}

impl ContentPrivateData {
    pub fn load(private: &dyn PrivateState) -> ProviderResult<Option<Self>> {
        private
            .get_key(PRIVATE_STATE_KEY)
            .filter(|bytes| !bytes.is_empty())
            .map(|bytes| serde_json::from_slice(&bytes))
            .transpose()
            .map_err(Into::into)
    }

    pub fn store(&self, private: &mut dyn PrivateState) -> ProviderResult<()> {
        private.set_key(PRIVATE_STATE_KEY, serde_json::to_vec(self)?);
        Ok(())
    }
}

#[derive(Debug)]
struct StagedContent {
    prepared: PreparedContent,
    odata_type: String,
    source_sha256: String,
}

/// Uploads the package named by a content attribute whenever its hash
/// changes.
///
/// The content attribute is a local object with [`SOURCE_FILE`] and
/// [`SOURCE_SHA256`]; it is never sent to Graph.
#[derive(Debug, Clone)]
pub struct MobileAppContent {
    attribute: String,
    upload_lock: Arc<CriticalSection>,
}

impl MobileAppContent {
    /// Uploads serialize on a lock of their own.
    pub fn new(attribute: impl Into<String>) -> Self {
        Self::with_lock(attribute, Arc::new(CriticalSection::new(Duration::ZERO)))
    }

    /// Uploads serialize on `lock`, which may be shared between app types.
    /// After contention they settle for `ContentConfig::lock_settle_delay`,
    /// whatever the lock's own delay.
    pub fn with_lock(attribute: impl Into<String>, lock: Arc<CriticalSection>) -> Self {
        Self {
            attribute: attribute.into(),
            upload_lock: lock,
        }
    }

    fn content<'a>(&self, tree: Option<&'a TypedValue>) -> Option<&'a TypedValue> {
        tree.and_then(|t| t.get_attr(&self.attribute))
            .filter(|v| !v.is_null_or_unknown())
    }

    /// Whether the planned package is already the committed content.
    async fn unchanged(&self, ctx: &ActionContext<'_>, planned_sha256: &str) -> ProviderResult<bool> {
        let uri = format!("{}?$select=committedContentVersion", ctx.entity_uri()?);
        let current = ctx.client.get(&uri, &[200]).await?.into_body();
        let Some(server_version) = current.get("committedContentVersion").and_then(Value::as_str) else {
            return Ok(false);
        };

        let state_sha256 = self.content(ctx.state).and_then(|c| c.attr_str(SOURCE_SHA256));
        let same_as_state = state_sha256.is_some_and(|h| h.eq_ignore_ascii_case(planned_sha256));

        let record = ContentPrivateData::load(&*ctx.private)?;
        let unchanged = match record.as_ref().and_then(|r| r.content_version_id_commited.as_deref()) {
            Some(committed) if committed != server_version => false,
            Some(_) => match record.as_ref().and_then(|r| r.source_sha256.as_deref()) {
                Some(recorded) => recorded.eq_ignore_ascii_case(planned_sha256),
                None => same_as_state,
            },
            None => same_as_state,
        };
        debug!(server_version, unchanged, "compared committed content");
        Ok(unchanged)
    }

    async fn wait_for_file_state(&self, ctx: &ActionContext<'_>, file_uri: &str, phase: &str) -> ProviderResult<Value> {
        let pending = format!("{phase}Pending");
        let success = format!("{phase}Success");
        let (pending, success) = (pending.as_str(), success.as_str());
        let client = ctx.client;
        let policy = PollPolicy::every(ctx.config.content.upload_state_poll());

        poll_until(&policy, ctx.sleeper, phase, move || async move {
            let file = client.get(file_uri, &[200]).await?.into_body();
            let state = file.get("uploadState").and_then(Value::as_str).unwrap_or_default();
            if state == success {
                Ok(PollState::Done(file))
            } else if state == pending {
                Ok(PollState::Pending)
            } else {
                Err(ProviderError::UnexpectedState {
                    what: "content file upload".to_string(),
                    state: state.to_string(),
                })
            }
        })
        .await
    }

    async fn wait_for_publishing(&self, ctx: &ActionContext<'_>, app_uri: &str) -> ProviderResult<()> {
        let client = ctx.client;
        let policy = PollPolicy::every(ctx.config.content.publishing_state_poll());
        poll_until(&policy, ctx.sleeper, "publishing", move || async move {
            let app = client.get(app_uri, &[200]).await?.into_body();
            match app.get("publishingState").and_then(Value::as_str).unwrap_or_default() {
                "published" => Ok(PollState::Done(())),
                "processing" | "notPublished" => Ok(PollState::Pending),
                other => Err(ProviderError::UnexpectedState {
                    what: "app publishing".to_string(),
                    state: other.to_string(),
                }),
            }
        })
        .await
    }

    async fn upload(&self, ctx: &mut ActionContext<'_>, staged: StagedContent) -> ProviderResult<()> {
        let _guard = self
            .upload_lock
            .enter_settling(ctx.sleeper, ctx.config.content.lock_settle_delay())
            .await;
        ctx.sleeper.sleep(ctx.config.content.pre_create_delay()).await;

        let app_uri = ctx.entity_uri()?.to_string();
        let versions_uri = format!("{app_uri}/{}/contentVersions", staged.odata_type.trim_start_matches('#'));
        let version = ctx.client.post(&versions_uri, &json!({}), &[200, 201]).await?.into_body();
        let version_id = id_of(&version, "content version")?;

        let prepared = &staged.prepared;
        let files_uri = format!("{versions_uri}/{version_id}/files");
        let file_body = json!({
            "@odata.type": "#microsoft.graph.mobileAppContentFile",
            "name": prepared.name,
            "size": prepared.size,
            "sizeEncrypted": prepared.encrypted_size,
            "manifest": null,
            "isDependency": false,
        });
        let file = ctx.client.post(&files_uri, &file_body, &[200, 201]).await?.into_body();
        let file_uri = format!("{files_uri}/{}", id_of(&file, "content file")?);

        let file = self.wait_for_file_state(ctx, &file_uri, "azureStorageUriRequest").await?;
        let sas_uri = file
            .get("azureStorageUri")
            .and_then(Value::as_str)
            .ok_or_else(|| ProviderError::UnexpectedResponse("content file has no azureStorageUri".to_string()))?;
        let blocks = ctx
            .client
            .blob_uploader(ctx.config.content.block_size)
            .upload_file(sas_uri, &prepared.encrypted_file, &prepared.encrypted_md5)
            .await?;

        let commit = json!({ "fileEncryptionInfo": serde_json::to_value(&prepared.encryption_info)? });
        ctx.client.post(&format!("{file_uri}/commit"), &commit, &[200, 204]).await?;
        self.wait_for_file_state(ctx, &file_uri, "commitFile").await?;

        let patch = json!({
            ODATA_TYPE: staged.odata_type,
            "committedContentVersion": version_id,
        });
        ctx.client.patch(&app_uri, &patch, &[200, 204]).await?;
        self.wait_for_publishing(ctx, &app_uri).await?;

        ContentPrivateData {
            content_version_id_commited: Some(version_id.clone()),
            content_md5: Some(prepared.encrypted_md5.clone()),
            source_sha256: Some(staged.source_sha256.clone()),
        }
        .store(&mut *ctx.private)?;
        info!(app = %app_uri, version = %version_id, blocks, "committed app content");
        Ok(())
    }
}

fn id_of(entity: &Value, what: &str) -> ProviderResult<String> {
    entity
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ProviderError::UnexpectedResponse(format!("created {what} has no id")))
}

fn join_error(e: tokio::task::JoinError) -> ProviderError {
    ProviderError::Io(std::io::Error::other(e))
}

#[async_trait]
impl SubAction for MobileAppContent {
    fn name(&self) -> &str {
        "mobile_app_content"
    }

    async fn pre(
        &self,
        ctx: &mut ActionContext<'_>,
        mut body: Option<&mut Map<String, Value>>,
        stash: &mut Stash,
    ) -> ProviderResult<()> {
        if let Some(body) = body.as_deref_mut() {
            let graph_key = ctx.schema.attribute(&self.attribute)?.graph_key();
            body.remove(graph_key.as_ref());
        }
        let Some(content) = self.content(ctx.plan) else {
            return Ok(());
        };
        let source = content
            .attr_str(SOURCE_FILE)
            .map(PathBuf::from)
            .ok_or_else(|| ProviderError::MissingAttribute(format!("{}.{SOURCE_FILE}", self.attribute)))?;

        let source_sha256 = match content.attr_str(SOURCE_SHA256) {
            Some(hash) => hash.to_ascii_lowercase(),
            None => {
                let path = source.clone();
                tokio::task::spawn_blocking(move || digest_file(&path))
                    .await
                    .map_err(join_error)??
                    .sha256_hex()
            }
        };

        if ctx.operation == Operation::Update && self.unchanged(ctx, &source_sha256).await? {
            debug!(attribute = %self.attribute, "content unchanged, skipping upload");
            return Ok(());
        }

        let odata_type = body
            .as_deref()
            .and_then(|b| b.get(ODATA_TYPE))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ProviderError::Config("app content needs the app's derived type to be set".to_string()))?;

        let prepared = tokio::task::spawn_blocking(move || package::prepare(&source))
            .await
            .map_err(join_error)??;
        if let (Some(identity), Some(body)) = (&prepared.appx, body) {
            identity.apply_to(body);
        }
        stash.insert(
            &STAGED,
            StagedContent {
                prepared,
                odata_type,
                source_sha256,
            },
        );
        Ok(())
    }

    async fn post(&self, ctx: &mut ActionContext<'_>, stash: &mut Stash) -> ProviderResult<()> {
        match stash.take(&STAGED) {
            Some(staged) => self.upload(ctx, staged).await,
            None => Ok(()),
        }
    }
}
