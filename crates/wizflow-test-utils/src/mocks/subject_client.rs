//! Mock implementation of the SubjectClient trait.

use async_trait::async_trait;
use mockall::mock;
use serde_json::json;

use wizflow_core::{CoreError, CoreResult, SubjectClient, SubjectRequest, SubjectResponse};

mock! {
    pub SubjectClient {}

    #[async_trait]
    impl SubjectClient for SubjectClient {
        async fn send(&self, request: SubjectRequest) -> CoreResult<SubjectResponse>;
    }
}

/// Creates a mock that rejects every request with `status`.
pub fn create_rejecting_subject_client(status: u16) -> MockSubjectClient {
    let mut mock = MockSubjectClient::new();
    mock.expect_send().returning(move |request| {
        Ok(SubjectResponse::error(
            status,
            format!("{} {} is not allowed", request.method, request.path),
            json!({}),
        ))
    });
    mock
}

/// Creates a mock whose transport fails on every request.
pub fn create_unreachable_subject_client() -> MockSubjectClient {
    let mut mock = MockSubjectClient::new();
    mock.expect_send()
        .returning(|_| Err(CoreError::TransportError("connection refused".to_string())));
    mock
}
