//! Response schedule store.
//!
//! Holds, for one operation, a sparse position → response map plus the call
//! counter that selects from it. Not synchronized on its own: the engine keeps
//! each schedule behind the operation's lock.

use crate::error::MockError;
use crate::model::Operation;
use crate::response::{BodyKind, MockResponse, DEFAULT_RESPONSE_CODE};
use std::collections::BTreeMap;

/// Where the response for a call came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Scheduled,
    Default,
}

/// Outcome of [`ResponseSchedule::next_response`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// 1-based call number this response answers.
    pub position: u32,
    pub response: MockResponse,
    pub source: ResponseSource,
}

#[derive(Debug, Clone, Default)]
pub struct ResponseSchedule {
    body_kind: BodyKind,
    responses: BTreeMap<u32, MockResponse>,
    calls: u32,
}

impl ResponseSchedule {
    /// An empty schedule for an operation emitting `body_kind` bodies.
    pub fn new(body_kind: BodyKind) -> Self {
        Self {
            body_kind,
            responses: BTreeMap::new(),
            calls: 0,
        }
    }

    /// Drop every scheduled response and rewind the call counter.
    pub fn reset(&mut self) {
        self.responses.clear();
        self.calls = 0;
    }

    /// Store `response` for call number `position`, replacing any previous one.
    pub fn schedule_at(&mut self, position: u32, response: MockResponse) -> Result<(), MockError> {
        if position == 0 {
            return Err(MockError::InvalidPosition { position });
        }
        let response = self.normalize(response);
        self.responses.insert(position, response);
        Ok(())
    }

    /// Store `response` at the lowest position without an entry and return it.
    pub fn schedule_next(&mut self, response: MockResponse) -> u32 {
        let position = self.next_free_position();
        let response = self.normalize(response);
        self.responses.insert(position, response);
        position
    }

    /// Advance the call counter and pick the response for the new call number.
    pub fn next_response(&mut self, operation: &Operation) -> Selection {
        self.calls += 1;
        let position = self.calls;
        match self.responses.get(&position) {
            Some(response) => Selection {
                position,
                response: response.clone(),
                source: ResponseSource::Scheduled,
            },
            None => Selection {
                position,
                response: operation.default_response().clone(),
                source: ResponseSource::Default,
            },
        }
    }

    /// Number of calls answered since the last reset.
    pub fn calls(&self) -> u32 {
        self.calls
    }

    pub fn scheduled(&self, position: u32) -> Option<&MockResponse> {
        self.responses.get(&position)
    }

    pub fn scheduled_count(&self) -> usize {
        self.responses.len()
    }

    fn next_free_position(&self) -> u32 {
        let mut candidate = 1;
        for position in self.responses.keys() {
            if *position != candidate {
                break;
            }
            candidate += 1;
        }
        candidate
    }

    // Stored responses are final: code filled in, body in the operation's field.
    fn normalize(&self, mut response: MockResponse) -> MockResponse {
        response.fill_unset_code(DEFAULT_RESPONSE_CODE);
        response.body = response.body.coerce(self.body_kind);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::ResponseBody;

    fn operation() -> Operation {
        Operation::new("GET").default_text("<default/>").default_code(200)
    }

    #[test]
    fn test_default_response_for_every_call() {
        let op = operation();
        let mut schedule = ResponseSchedule::new(BodyKind::Text);
        for call in 1..=10 {
            let selection = schedule.next_response(&op);
            assert_eq!(selection.position, call);
            assert_eq!(selection.source, ResponseSource::Default);
            assert_eq!(&selection.response, op.default_response());
        }
    }

    #[test]
    fn test_sparse_position() {
        let op = operation();
        let mut schedule = ResponseSchedule::new(BodyKind::Text);
        let fifth = MockResponse::text("<dummyResponse>abc123</dummyResponse>").code(200);
        schedule.schedule_at(5, fifth.clone()).unwrap();

        for _ in 1..5 {
            assert_eq!(schedule.next_response(&op).source, ResponseSource::Default);
        }
        let selection = schedule.next_response(&op);
        assert_eq!(selection.position, 5);
        assert_eq!(selection.response, fifth);
        assert_eq!(schedule.next_response(&op).source, ResponseSource::Default);
    }

    #[test]
    fn test_schedule_at_overwrites() {
        let mut schedule = ResponseSchedule::new(BodyKind::Text);
        schedule.schedule_at(2, MockResponse::text("first")).unwrap();
        schedule.schedule_at(2, MockResponse::text("second")).unwrap();
        assert_eq!(schedule.scheduled_count(), 1);
        assert_eq!(
            schedule.scheduled(2).unwrap().body,
            ResponseBody::Text("second".to_string())
        );
    }

    #[test]
    fn test_position_zero_rejected() {
        let mut schedule = ResponseSchedule::new(BodyKind::Text);
        assert_eq!(
            schedule.schedule_at(0, MockResponse::text("x")),
            Err(MockError::InvalidPosition { position: 0 })
        );
    }

    #[test]
    fn test_unset_code_filled_at_schedule_time() {
        let mut schedule = ResponseSchedule::new(BodyKind::Text);
        schedule.schedule_at(1, MockResponse::text("x")).unwrap();
        assert_eq!(schedule.scheduled(1).unwrap().code, 200);

        schedule.schedule_at(2, MockResponse::text("x").code(500)).unwrap();
        assert_eq!(schedule.scheduled(2).unwrap().code, 500);
    }

    #[test]
    fn test_schedule_next_uses_lowest_free_position() {
        let mut schedule = ResponseSchedule::new(BodyKind::Text);
        assert_eq!(schedule.schedule_next(MockResponse::text("a")), 1);
        assert_eq!(schedule.schedule_next(MockResponse::text("b")), 2);

        schedule.schedule_at(4, MockResponse::text("d")).unwrap();
        assert_eq!(schedule.schedule_next(MockResponse::text("c")), 3);
        assert_eq!(schedule.schedule_next(MockResponse::text("e")), 5);

        // explicit position 1 overwrites, the next append still looks for a gap
        schedule.schedule_at(1, MockResponse::text("z")).unwrap();
        assert_eq!(schedule.schedule_next(MockResponse::text("f")), 6);
    }

    #[test]
    fn test_reset_clears_responses_and_counter() {
        let op = operation();
        let mut schedule = ResponseSchedule::new(BodyKind::Text);
        schedule.schedule_at(1, MockResponse::text("custom")).unwrap();
        schedule.next_response(&op);
        schedule.next_response(&op);
        assert_eq!(schedule.calls(), 2);

        schedule.reset();
        assert_eq!(schedule.calls(), 0);
        assert_eq!(schedule.scheduled_count(), 0);

        let selection = schedule.next_response(&op);
        assert_eq!(selection.position, 1);
        assert_eq!(selection.source, ResponseSource::Default);
    }

    #[test]
    fn test_binary_schedule_coerces_text() {
        let mut schedule = ResponseSchedule::new(BodyKind::Binary);
        schedule.schedule_at(1, MockResponse::text("abc")).unwrap();
        assert_eq!(
            schedule.scheduled(1).unwrap().body,
            ResponseBody::Binary(b"abc".to_vec())
        );
    }
}
