use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;

use super::{
    ClientError, ClientResult, NewRecordStoreAccessKey, NewRecordStoreEndpoint, NewRecordStoreUser,
    RecordStoreAccessKey, RecordStoreApi, RecordStoreEndpoint, RecordStoreUser,
};

/// Record-store (LRS) admin API over HTTP, authenticated by an API key header.
#[derive(Clone)]
pub struct HttpRecordStore {
    client: Client,
    base_url: String,
    api_key_header: String,
    api_key: String,
}

impl HttpRecordStore {
    pub fn new(
        base_url: impl Into<String>,
        api_key_header: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> ClientResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::backend("record-store", e))?;

        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        Ok(Self {
            client,
            base_url,
            api_key_header: api_key_header.into(),
            api_key: api_key.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request.header(self.api_key_header.as_str(), self.api_key.as_str())
    }

    async fn send(&self, request: RequestBuilder, what: &str) -> ClientResult<reqwest::Response> {
        let response = self
            .authed(request)
            .send()
            .await
            .map_err(|e| ClientError::backend("record-store", format!("{what} request failed: {e}")))?;

        match response.status() {
            s if s.is_success() => Ok(response),
            StatusCode::NOT_FOUND => Err(ClientError::NotFound(what.to_string())),
            s => Err(ClientError::backend("record-store", format!("{what} returned {s}"))),
        }
    }

    async fn json<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> ClientResult<T> {
        self.send(request, what)
            .await?
            .json::<T>()
            .await
            .map_err(|e| ClientError::backend("record-store", format!("{what} response unreadable: {e}")))
    }
}

#[async_trait]
impl RecordStoreApi for HttpRecordStore {
    async fn find_users_by_email(&self, email: &str) -> ClientResult<Vec<RecordStoreUser>> {
        let search = json!({ "email": email }).to_string();
        let request = self
            .client
            .get(self.url("admin/api/user"))
            .query(&[("search", search)]);
        self.json(request, "user search").await
    }

    async fn create_user(&self, user: &NewRecordStoreUser) -> ClientResult<RecordStoreUser> {
        let request = self.client.post(self.url("admin/api/user")).json(user);
        self.json(request, "user create").await
    }

    async fn list_endpoints(&self) -> ClientResult<Vec<RecordStoreEndpoint>> {
        let request = self
            .client
            .get(self.url("admin/api/lrs"))
            .query(&[("limit", "0")]);
        self.json(request, "lrs list").await
    }

    async fn create_endpoint(&self, endpoint: &NewRecordStoreEndpoint) -> ClientResult<RecordStoreEndpoint> {
        let request = self.client.post(self.url("admin/api/lrs")).json(endpoint);
        self.json(request, "lrs create").await
    }

    async fn delete_endpoint(&self, id: &str) -> ClientResult<()> {
        let request = self.client.delete(self.url(&format!("admin/api/lrs/{id}")));
        self.send(request, "lrs delete").await?;
        Ok(())
    }

    async fn list_access_keys(&self, endpoint_name: &str) -> ClientResult<Vec<RecordStoreAccessKey>> {
        let request = self
            .client
            .get(self.url(&format!("api/{endpoint_name}/xapi-access-keys")));
        self.json(request, "access key list").await
    }

    async fn create_access_key(&self, endpoint_name: &str, key: &NewRecordStoreAccessKey) -> ClientResult<()> {
        let request = self
            .client
            .post(self.url(&format!("api/{endpoint_name}/xapi-access-keys")))
            .json(key);
        self.send(request, "access key create").await?;
        Ok(())
    }
}
