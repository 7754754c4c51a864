use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::error::{BoundaryError, CoreError, CoreResult};

/// Request method understood by the subject system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single request dispatched to the subject system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectRequest {
    pub method: Method,
    pub path: String,
    #[serde(default)]
    pub body: Value,
}

impl SubjectRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            body: Value::Null,
        }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            body,
        }
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Put,
            path: path.into(),
            body,
        }
    }

    pub fn patch(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Patch,
            path: path.into(),
            body,
        }
    }
}

/// Status code plus JSON body returned by the subject system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectResponse {
    pub status: u16,
    #[serde(default)]
    pub body: Value,
}

impl SubjectResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    pub fn ok(body: Value) -> Self {
        Self::new(200, body)
    }

    pub fn created(body: Value) -> Self {
        Self::new(201, body)
    }

    /// Error body in the shape the subject uses for rejections
    pub fn error(status: u16, message: impl Into<String>, errors: Value) -> Self {
        Self::new(
            status,
            serde_json::json!({ "message": message.into(), "errors": errors }),
        )
    }

    pub fn is_error(&self) -> bool {
        self.status >= 400
    }

    /// Turn a status of 400 or above into a boundary error, surfacing `message` and `errors` verbatim.
    pub fn into_checked(self, request: &SubjectRequest) -> CoreResult<Value> {
        if !self.is_error() {
            return Ok(self.body);
        }
        let message = self
            .body
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("Request failed")
            .to_string();
        let errors = self.body.get("errors").cloned().unwrap_or(Value::Null);
        Err(CoreError::Boundary(BoundaryError::rejected(
            request.method.as_str(),
            &request.path,
            self.status,
            message,
            errors,
        )))
    }

    /// Check the status and decode the body as `T`; a decode failure is a contract violation.
    pub fn decode<T: DeserializeOwned>(self, request: &SubjectRequest) -> CoreResult<T> {
        let status = self.status;
        let body = self.into_checked(request)?;
        serde_json::from_value(body).map_err(|err| {
            CoreError::Boundary(BoundaryError::contract_violation(
                request.method.as_str(),
                &request.path,
                status,
                err.to_string(),
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BoundaryErrorKind;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Wrapped {
        data: Inner,
    }

    #[derive(Debug, Deserialize)]
    struct Inner {
        id: u64,
    }

    #[test]
    fn error_status_surfaces_message_and_errors() {
        let request = SubjectRequest::patch("/characters/7", json!({"race_slug": "nope"}));
        let response = SubjectResponse::error(422, "Invalid race", json!({"race_slug": ["unknown"]}));
        match response.into_checked(&request) {
            Err(CoreError::Boundary(err)) => {
                assert_eq!(err.kind, BoundaryErrorKind::Rejected);
                assert_eq!(err.status, 422);
                assert_eq!(err.message, "Invalid race");
                assert_eq!(err.errors, json!({"race_slug": ["unknown"]}));
            }
            other => panic!("expected boundary error, got {:?}", other),
        }
    }

    #[test]
    fn undecodable_body_is_contract_violation() {
        let request = SubjectRequest::get("/characters/7");
        let response = SubjectResponse::ok(json!({"data": {"id": "not-a-number"}}));
        match response.decode::<Wrapped>(&request) {
            Err(CoreError::Boundary(err)) => assert_eq!(err.kind, BoundaryErrorKind::ContractViolation),
            other => panic!("expected contract violation, got {:?}", other),
        }
    }

    #[test]
    fn decodes_matching_body() {
        let request = SubjectRequest::get("/characters/7");
        let decoded: Wrapped = SubjectResponse::ok(json!({"data": {"id": 7}}))
            .decode(&request)
            .unwrap();
        assert_eq!(decoded.data.id, 7);
    }
}
