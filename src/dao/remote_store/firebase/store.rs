use std::{collections::BTreeMap, sync::Arc};

use futures::{StreamExt, future::BoxFuture};
use reqwest::{Client, Method, Response, StatusCode, header::ACCEPT};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::dao::{
    remote_store::{RemoteStore, Subscription, SubscriptionEvent, SubscriptionHandle},
    storage::{StoreError, StoreResult},
};

use super::{
    config::FirebaseConfig,
    error::{FirebaseError, FirebaseResult},
    stream::{SseDecoder, StreamOutcome, StreamState},
};

/// [`RemoteStore`] backed by the realtime database REST and streaming APIs.
#[derive(Clone)]
pub struct FirebaseStore {
    client: Client,
    base_url: Arc<str>,
    auth_token: Option<Arc<str>>,
}

impl FirebaseStore {
    /// Build the HTTP client and check that the database answers.
    pub async fn connect(config: FirebaseConfig) -> FirebaseResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| FirebaseError::ClientBuilder { source })?;

        let store = Self {
            client,
            base_url: Arc::from(config.database_url.trim_end_matches('/')),
            auth_token: config.auth_token.map(Arc::from),
        };

        store.ping().await?;
        info!(url = %store.base_url, "realtime database reachable");
        Ok(store)
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}.json", self.base_url, path.trim_matches('/'));
        let builder = self.client.request(method, url);
        match &self.auth_token {
            Some(token) => builder.query(&[("auth", token.as_ref())]),
            None => builder,
        }
    }

    fn check_status(path: &str, response: &Response) -> FirebaseResult<()> {
        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(FirebaseError::PermissionDenied {
                    path: path.to_string(),
                })
            }
            status => Err(FirebaseError::RequestStatus {
                path: path.to_string(),
                status,
            }),
        }
    }

    async fn send_json(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> FirebaseResult<Response> {
        let mut builder = self.request(method, path);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        let response = builder
            .send()
            .await
            .map_err(|source| FirebaseError::RequestSend {
                path: path.to_string(),
                source,
            })?;
        Self::check_status(path, &response)?;
        Ok(response)
    }

    async fn get_value(&self, path: &str) -> FirebaseResult<Option<Value>> {
        let response = self.send_json(Method::GET, path, None).await?;
        let value = response
            .json::<Value>()
            .await
            .map_err(|source| FirebaseError::DecodeResponse {
                path: path.to_string(),
                source,
            })?;
        Ok((!value.is_null()).then_some(value))
    }

    async fn ping(&self) -> FirebaseResult<()> {
        let response = self
            .request(Method::GET, "")
            .query(&[("shallow", "true")])
            .send()
            .await
            .map_err(|source| FirebaseError::RequestSend {
                path: "/".into(),
                source,
            })?;

        // Rules may hide the root from this identity; the database still answered.
        match Self::check_status("/", &response) {
            Ok(()) | Err(FirebaseError::PermissionDenied { .. }) => Ok(()),
            Err(err) => Err(err),
        }
    }

    async fn open_stream(&self, path: &str) -> FirebaseResult<Response> {
        let response = self
            .request(Method::GET, path)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|source| FirebaseError::RequestSend {
                path: path.to_string(),
                source,
            })?;
        Self::check_status(path, &response)?;
        Ok(response)
    }
}

/// Forward decoded stream events to the subscriber until it goes away or the stream ends.
async fn forward_stream(
    path: String,
    response: Response,
    tx: mpsc::UnboundedSender<SubscriptionEvent>,
) {
    let mut bytes = response.bytes_stream();
    let mut decoder = SseDecoder::default();
    let mut state = StreamState::default();

    loop {
        tokio::select! {
            _ = tx.closed() => break,
            chunk = bytes.next() => {
                let chunk = match chunk {
                    Some(Ok(chunk)) => chunk,
                    Some(Err(source)) => {
                        let err = FirebaseError::Stream { path: path.clone(), source };
                        warn!(%path, error = %err, "realtime stream failed");
                        let _ = tx.send(Err(err.into()));
                        break;
                    }
                    None => {
                        let _ = tx.send(Err(FirebaseError::StreamClosed { path: path.clone() }.into()));
                        break;
                    }
                };

                for event in decoder.push(&chunk) {
                    match state.apply(event) {
                        Ok(StreamOutcome::Value(value)) => {
                            if tx.send(Ok(value)).is_err() {
                                return;
                            }
                        }
                        Ok(StreamOutcome::Idle) => {}
                        Ok(StreamOutcome::Revoked) => {
                            let _ = tx.send(Err(StoreError::permission_denied(path.clone())));
                            return;
                        }
                        Err(message) => {
                            let err = FirebaseError::MalformedEvent { path: path.clone(), message };
                            let _ = tx.send(Err(err.into()));
                        }
                    }
                }
            }
        }
    }

    debug!(%path, "realtime stream detached");
}

impl RemoteStore for FirebaseStore {
    fn read(&self, path: &str) -> BoxFuture<'static, StoreResult<Option<Value>>> {
        let store = self.clone();
        let path = path.to_string();
        Box::pin(async move { store.get_value(&path).await.map_err(Into::into) })
    }

    fn write(&self, path: &str, value: Value) -> BoxFuture<'static, StoreResult<()>> {
        let store = self.clone();
        let path = path.to_string();
        Box::pin(async move {
            let method = if value.is_null() {
                Method::DELETE
            } else {
                Method::PUT
            };
            let body = (!value.is_null()).then_some(&value);
            store.send_json(method, &path, body).await?;
            Ok(())
        })
    }

    fn update(&self, updates: BTreeMap<String, Value>) -> BoxFuture<'static, StoreResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            // A root PATCH with slash-separated keys is applied atomically by the database.
            let body: serde_json::Map<String, Value> = updates
                .into_iter()
                .map(|(path, value)| (path.trim_matches('/').to_string(), value))
                .collect();
            store
                .send_json(Method::PATCH, "", Some(&Value::Object(body)))
                .await?;
            Ok(())
        })
    }

    fn subscribe(&self, path: &str) -> BoxFuture<'static, StoreResult<Subscription>> {
        let store = self.clone();
        let path = path.to_string();
        Box::pin(async move {
            let response = store.open_stream(&path).await?;
            let (tx, updates) = mpsc::unbounded_channel();
            let task = tokio::spawn(forward_stream(path.clone(), response, tx));
            let abort = task.abort_handle();
            debug!(%path, "realtime stream attached");

            Ok(Subscription {
                updates,
                handle: SubscriptionHandle::new(move || abort.abort()),
            })
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StoreResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ping().await.map_err(Into::into) })
    }
}
