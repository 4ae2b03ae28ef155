use std::future::Future;

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use tracing::debug;
use url::Url;

use konect_types::api::{
    AuthResponse, CreateRoomRequest, ErrorBody, LoginRequest, RegisterRequest, SendMessageRequest,
    StoredMessage,
};
use konect_types::{FileDescriptor, MessageKind, Room, RoomId};

use crate::error::ClientError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    Login {
        email: String,
        password: String,
    },
    Register {
        username: String,
        email: String,
        password: String,
    },
}

/// Request/response calls the client consumes. `HttpApi` talks to the real
/// server; tests substitute in-process fakes.
pub trait ChatApi: Send + Sync {
    fn authenticate(
        &self,
        credentials: &Credentials,
    ) -> impl Future<Output = Result<AuthResponse, ClientError>> + Send;

    fn list_rooms(&self, token: &str) -> impl Future<Output = Result<Vec<Room>, ClientError>> + Send;

    fn create_room(
        &self,
        token: &str,
        name: &str,
        description: Option<&str>,
    ) -> impl Future<Output = Result<Room, ClientError>> + Send;

    /// Last `limit` messages of a room, in whatever order the server picks.
    fn fetch_history(
        &self,
        token: &str,
        room_id: &RoomId,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<StoredMessage>, ClientError>> + Send;

    /// Store a message. The stored message comes back over the push channel,
    /// not through this call.
    fn post_message(
        &self,
        token: &str,
        room_id: &RoomId,
        content: &str,
        kind: MessageKind,
    ) -> impl Future<Output = Result<(), ClientError>> + Send;

    fn upload_file(
        &self,
        token: &str,
        filename: &str,
        bytes: Vec<u8>,
    ) -> impl Future<Output = Result<FileDescriptor, ClientError>> + Send;
}

pub struct HttpApi {
    client: Client,
    base: Url,
}

impl HttpApi {
    pub fn new(base: Url) -> Self {
        Self {
            client: Client::new(),
            base,
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        self.base
            .join(path)
            .map_err(|e| ClientError::Network(format!("bad endpoint {}: {}", path, e)))
    }

    async fn execute(request: RequestBuilder) -> Result<Response, ClientError> {
        let resp = request.send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let message = match resp.json::<ErrorBody>().await {
            Ok(body) => body.error,
            Err(_) => status.canonical_reason().unwrap_or("request failed").to_string(),
        };
        debug!("Request failed with {}: {}", status, message);

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ClientError::Auth(message)),
            _ => Err(ClientError::Api {
                status: status.as_u16(),
                message,
            }),
        }
    }
}

impl ChatApi for HttpApi {
    async fn authenticate(&self, credentials: &Credentials) -> Result<AuthResponse, ClientError> {
        let request = match credentials {
            Credentials::Login { email, password } => self
                .client
                .post(self.endpoint("/api/auth/login")?)
                .json(&LoginRequest { email, password }),
            Credentials::Register {
                username,
                email,
                password,
            } => self
                .client
                .post(self.endpoint("/api/auth/register")?)
                .json(&RegisterRequest {
                    username,
                    email,
                    password,
                }),
        };

        Ok(Self::execute(request).await?.json().await?)
    }

    async fn list_rooms(&self, token: &str) -> Result<Vec<Room>, ClientError> {
        let request = self.client.get(self.endpoint("/api/rooms")?).bearer_auth(token);
        Ok(Self::execute(request).await?.json().await?)
    }

    async fn create_room(
        &self,
        token: &str,
        name: &str,
        description: Option<&str>,
    ) -> Result<Room, ClientError> {
        let request = self
            .client
            .post(self.endpoint("/api/rooms")?)
            .bearer_auth(token)
            .json(&CreateRoomRequest { name, description });
        Ok(Self::execute(request).await?.json().await?)
    }

    async fn fetch_history(
        &self,
        token: &str,
        room_id: &RoomId,
        limit: u32,
    ) -> Result<Vec<StoredMessage>, ClientError> {
        let request = self
            .client
            .get(self.endpoint(&format!("/api/rooms/{}/messages", room_id))?)
            .bearer_auth(token)
            .query(&[("limit", limit)]);
        Ok(Self::execute(request).await?.json().await?)
    }

    async fn post_message(
        &self,
        token: &str,
        room_id: &RoomId,
        content: &str,
        kind: MessageKind,
    ) -> Result<(), ClientError> {
        let request = self
            .client
            .post(self.endpoint(&format!("/api/rooms/{}/messages", room_id))?)
            .bearer_auth(token)
            .json(&SendMessageRequest {
                content,
                message_type: kind,
            });
        Self::execute(request).await?;
        Ok(())
    }

    async fn upload_file(
        &self,
        token: &str,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<FileDescriptor, ClientError> {
        let part = reqwest::multipart::Part::bytes(bytes).file_name(filename.to_string());
        let form = reqwest::multipart::Form::new().part("file", part);
        let request = self
            .client
            .post(self.endpoint("/api/upload")?)
            .bearer_auth(token)
            .multipart(form);
        Ok(Self::execute(request).await?.json().await?)
    }
}
