//! Mock summary service for testing.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use readgap_core::error::ServiceError;
use readgap_core::traits::{parse_service_reply, ServiceAssessment, SummaryRequest, SummaryService};

enum Behaviour {
    Reply(String),
    Fail,
}

/// A summary service that answers with a canned reply or always fails.
pub struct MockSummaryService {
    behaviour: Behaviour,
    call_count: AtomicU32,
    last_request: Mutex<Option<SummaryRequest>>,
}

impl MockSummaryService {
    /// Replies with `reply`, parsed exactly like a live model reply.
    pub fn with_reply(reply: &str) -> Self {
        Self::with_behaviour(Behaviour::Reply(reply.to_string()))
    }

    /// Fails every call with a network error.
    pub fn failing() -> Self {
        Self::with_behaviour(Behaviour::Fail)
    }

    fn with_behaviour(behaviour: Behaviour) -> Self {
        Self {
            behaviour,
            call_count: AtomicU32::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    pub fn last_request(&self) -> Option<SummaryRequest> {
        self.last_request
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl SummaryService for MockSummaryService {
    fn name(&self) -> &str {
        "mock"
    }

    async fn assess(&self, request: &SummaryRequest) -> anyhow::Result<ServiceAssessment> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        *self
            .last_request
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(request.clone());

        match &self.behaviour {
            Behaviour::Reply(reply) => Ok(parse_service_reply(reply)?),
            Behaviour::Fail => Err(ServiceError::NetworkError("mock service unavailable".into()).into()),
        }
    }
}
