use crate::config::ClientConfig;
use crate::connection::Connection;
use crate::error::{Result, SnapmakerError};
use crate::protocol::{parse_object, ConnectBody};
use reqwest::StatusCode;
use serde_json::{Map, Value};

/// What the printer said to a `POST /connect`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectReply {
    /// A token came back: freshly issued, or echoed when we sent one
    Token(String),

    /// 204 No Content: the approval prompt is still open on the touchscreen
    Pending,
}

/// The two API operations the client needs from one printer
#[derive(Debug, Clone)]
pub struct PrinterConnection {
    host: String,
    connection: Connection,
}

impl PrinterConnection {
    /// Prepare a connection to the printer at `host`. No request is sent.
    pub fn new(host: impl Into<String>, config: &ClientConfig) -> Result<Self> {
        let host = host.into();
        let connection = Connection::new(&host, config)?;

        Ok(Self { host, connection })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// `POST /api/v1/connect`, optionally carrying a token as form data.
    ///
    /// Without a token this asks the printer to issue one; with a token it
    /// checks whether that token has been approved.
    pub async fn request_connect(&self, token: Option<&str>) -> Result<ConnectReply> {
        let mut request = self.connection.post("connect");
        if let Some(token) = token {
            request = request.form(&[("token", token)]);
        }

        let (status, body) = self.connection.send(request).await?;
        if status == StatusCode::NO_CONTENT {
            return Ok(ConnectReply::Pending);
        }

        let body: ConnectBody = serde_json::from_value(Value::Object(parse_object(&body)?))?;
        match body.token {
            Some(token) if !token.is_empty() => Ok(ConnectReply::Token(token)),
            _ => Err(SnapmakerError::MalformedResponse(
                "connect response carries no token".to_string(),
            )),
        }
    }

    /// `GET /api/v1/status?token=...`, returning the raw status object.
    pub async fn request_status(&self, token: &str) -> Result<Map<String, Value>> {
        let request = self.connection.get("status").query(&[("token", token)]);
        let (_, body) = self.connection.send(request).await?;

        parse_object(&body)
    }
}
