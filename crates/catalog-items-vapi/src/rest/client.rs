use catalog_items::{
    CatalogItem, CatalogService, CloneSpec, Library, ServiceError, SessionState, UploadTarget,
};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

use super::models::{
    CreateSpec, Endpoint, Envelope, ErrorBody, FileAdd, FileInfo, FileSpec, FindSpec, ItemFind,
    LibraryFind, LibraryTarget, OvfCreate, OvfCreateResult, OvfCreateSpec, ResourceId,
    SessionCreate, SessionInfo, SourceType,
};

/// Header carrying the API session on every authenticated request.
pub const SESSION_HEADER: &str = "vmware-api-session-id";

const UPDATE_SESSION: &str = "com/vmware/content/library/item/update-session";
const SESSION_FILE: &str = "com/vmware/content/library/item/updatesession/file";

/// [`CatalogService`] over the vSphere Automation REST API.
#[derive(Debug, Clone)]
pub struct VapiClient {
    client: reqwest::Client,
    base_url: String,
    session_id: Option<String>,
}

impl VapiClient {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            session_id: None,
        }
    }

    /// Reuse an existing API session.
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Open an API session with basic credentials.
    pub async fn login(
        client: reqwest::Client,
        base_url: impl Into<String>,
        username: &str,
        password: &str,
    ) -> Result<Self, ServiceError> {
        let unauthenticated = Self::new(client, base_url);
        let request = unauthenticated
            .request(Method::POST, "com/vmware/cis/session")
            .basic_auth(username, Some(password));
        let response = unauthenticated.send(request, username).await?;
        let session_id: String = value(response).await?;

        tracing::debug!(user = username, "API session opened");
        Ok(unauthenticated.with_session(session_id))
    }

    /// Close the API session, if one is held.
    pub async fn logout(&self) -> Result<(), ServiceError> {
        if self.session_id.is_none() {
            return Ok(());
        }
        let request = self.request(Method::DELETE, "com/vmware/cis/session");
        self.send(request, "session").await.map(drop)
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// The session header, for requests made outside this client such as
    /// file pushes to upload endpoints.
    pub fn session_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(value) = self
            .session_id
            .as_deref()
            .and_then(|id| HeaderValue::from_str(id).ok())
        {
            headers.insert(SESSION_HEADER, value);
        }
        headers
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/rest/{path}", self.base_url);
        self.client
            .request(method, url)
            .headers(self.session_headers())
    }

    /// Send `request`. A 404 becomes [`ServiceError::NotFound`] for `subject`.
    async fn send(&self, request: RequestBuilder, subject: &str) -> Result<Response, ServiceError> {
        let response = request
            .send()
            .await
            .map_err(|e| ServiceError::Transport(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ServiceError::NotFound(subject.to_owned()));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&text)
                .map(|body| body.summary())
                .unwrap_or(text);
            return Err(ServiceError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, subject: &str) -> Result<T, ServiceError> {
        let response = self.send(self.request(Method::GET, path), subject).await?;
        value(response).await
    }

    async fn post<B, T>(&self, path: &str, body: &B, subject: &str) -> Result<T, ServiceError>
    where
        B: serde::Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let request = self.request(Method::POST, path).json(body);
        let response = self.send(request, subject).await?;
        value(response).await
    }

    /// Bodiless POST action; the response payload is ignored.
    async fn act(&self, path: &str, subject: &str) -> Result<(), ServiceError> {
        self.send(self.request(Method::POST, path), subject)
            .await
            .map(drop)
    }

    async fn delete(&self, path: &str, subject: &str) -> Result<(), ServiceError> {
        self.send(self.request(Method::DELETE, path), subject)
            .await
            .map(drop)
    }
}

async fn value<T: DeserializeOwned>(response: Response) -> Result<T, ServiceError> {
    response
        .json::<Envelope<T>>()
        .await
        .map(|envelope| envelope.value)
        .map_err(|e| ServiceError::Decode(e.to_string()))
}

#[async_trait::async_trait]
impl CatalogService for VapiClient {
    async fn library(&self, id: &str) -> Result<Library, ServiceError> {
        self.get(&format!("com/vmware/content/library/id:{id}"), id)
            .await
    }

    async fn find_libraries(&self, name: &str) -> Result<Vec<String>, ServiceError> {
        let body = FindSpec {
            spec: LibraryFind { name },
        };
        self.post("com/vmware/content/library?~action=find", &body, name)
            .await
    }

    async fn create_library(&self, library: &Library) -> Result<String, ServiceError> {
        let body = CreateSpec {
            create_spec: library,
        };
        self.post("com/vmware/content/local-library", &body, &library.name)
            .await
    }

    async fn delete_library(&self, id: &str) -> Result<(), ServiceError> {
        self.delete(&format!("com/vmware/content/local-library/id:{id}"), id)
            .await
    }

    async fn find_items(&self, library_id: &str, name: &str) -> Result<Vec<String>, ServiceError> {
        let body = FindSpec {
            spec: ItemFind { library_id, name },
        };
        self.post("com/vmware/content/library/item?~action=find", &body, name)
            .await
    }

    async fn item(&self, id: &str) -> Result<CatalogItem, ServiceError> {
        self.get(&format!("com/vmware/content/library/item/id:{id}"), id)
            .await
    }

    async fn create_item(&self, item: &CatalogItem) -> Result<String, ServiceError> {
        let body = CreateSpec { create_spec: item };
        self.post("com/vmware/content/library/item", &body, &item.name)
            .await
    }

    async fn delete_item(&self, id: &str) -> Result<(), ServiceError> {
        self.delete(&format!("com/vmware/content/library/item/id:{id}"), id)
            .await
    }

    async fn create_update_session(&self, item_id: &str) -> Result<String, ServiceError> {
        let body = CreateSpec {
            create_spec: SessionCreate {
                library_item_id: item_id,
            },
        };
        self.post(UPDATE_SESSION, &body, item_id).await
    }

    async fn add_push_file(
        &self,
        session: &str,
        name: &str,
        size: u64,
    ) -> Result<UploadTarget, ServiceError> {
        let body = FileAdd {
            file_spec: FileSpec {
                name,
                source_type: SourceType::Push,
                size: Some(size),
                source_endpoint: None,
            },
        };
        let path = format!("{SESSION_FILE}/id:{session}?~action=add");
        let info: FileInfo = self.post(&path, &body, session).await?;

        let endpoint = info
            .upload_endpoint
            .ok_or_else(|| ServiceError::Decode(format!("no upload endpoint issued for {name}")))?;
        Ok(UploadTarget {
            endpoint_uri: endpoint.uri,
            declared_size: size,
        })
    }

    async fn add_pull_file(
        &self,
        session: &str,
        name: &str,
        uri: &str,
    ) -> Result<(), ServiceError> {
        let body = FileAdd {
            file_spec: FileSpec {
                name,
                source_type: SourceType::Pull,
                size: None,
                source_endpoint: Some(Endpoint {
                    uri: uri.to_owned(),
                }),
            },
        };
        let path = format!("{SESSION_FILE}/id:{session}?~action=add");
        let _: FileInfo = self.post(&path, &body, session).await?;
        Ok(())
    }

    async fn session_state(&self, session: &str) -> Result<SessionState, ServiceError> {
        let info: SessionInfo = self
            .get(&format!("{UPDATE_SESSION}/id:{session}"), session)
            .await?;

        Ok(match info.state.as_str() {
            "ACTIVE" => SessionState::Pending,
            "ERROR" => SessionState::Error(
                info.error_message
                    .map(|m| m.default_message)
                    .unwrap_or_else(|| "update session failed".to_owned()),
            ),
            _ => SessionState::Ready,
        })
    }

    async fn complete_session(&self, session: &str) -> Result<(), ServiceError> {
        self.act(&format!("{UPDATE_SESSION}/id:{session}?~action=complete"), session)
            .await
    }

    async fn cancel_session(&self, session: &str) -> Result<(), ServiceError> {
        self.act(&format!("{UPDATE_SESSION}/id:{session}?~action=cancel"), session)
            .await
    }

    async fn create_ovf_from_template(&self, spec: &CloneSpec) -> Result<String, ServiceError> {
        let body = OvfCreate {
            create_spec: OvfCreateSpec { name: &spec.name },
            source: ResourceId {
                resource_type: "VirtualMachine",
                id: &spec.source_moid,
            },
            target: LibraryTarget {
                library_id: &spec.target_library_id,
            },
        };
        let result: OvfCreateResult = self
            .post("com/vmware/vcenter/ovf/library-item", &body, &spec.source_moid)
            .await?;

        if !result.succeeded {
            let detail = result
                .error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no error detail".to_owned());
            return Err(ServiceError::Rejected(detail));
        }
        result
            .ovf_library_item_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ServiceError::Rejected("no item id returned".to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_header_only_when_logged_in() {
        let client = VapiClient::new(reqwest::Client::new(), "https://vc.example/");
        assert!(client.session_headers().is_empty());

        let client = client.with_session("abc123");
        assert_eq!(
            client.session_headers().get(SESSION_HEADER).unwrap(),
            "abc123"
        );
    }

    #[test]
    fn base_url_is_trimmed() {
        let client = VapiClient::new(reqwest::Client::new(), "https://vc.example/");
        assert_eq!(client.base_url, "https://vc.example");
    }
}
