//! In-process gateway double for tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::conversations::ChatTurn;

use super::error::{GatewayError, GatewayResult};
use super::{Completion, CompletionGateway, GatewayFuture, Usage};

/// Gateway that replays scripted outcomes and records what it was sent.
#[derive(Default)]
pub struct ScriptedGateway {
    outcomes: Mutex<VecDeque<GatewayResult<Completion>>>,
    calls: Mutex<Vec<(Vec<ChatTurn>, Option<String>)>>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful assistant reply.
    pub fn reply(self, content: &str) -> Self {
        self.push(Ok(Completion {
            message: ChatTurn::assistant(content),
            model: "scripted-model".to_string(),
            usage: Usage {
                prompt_tokens: 1,
                completion_tokens: 2,
                total_tokens: 3,
            },
        }))
    }

    /// Queue a failure.
    pub fn fail(self, err: GatewayError) -> Self {
        self.push(Err(err))
    }

    fn push(self, outcome: GatewayResult<Completion>) -> Self {
        self.outcomes.lock().unwrap().push_back(outcome);
        self
    }

    /// Histories and model overrides received so far.
    pub fn calls(&self) -> Vec<(Vec<ChatTurn>, Option<String>)> {
        self.calls.lock().unwrap().clone()
    }
}

impl CompletionGateway for ScriptedGateway {
    fn complete<'a>(
        &'a self,
        messages: &'a [ChatTurn],
        model: Option<&'a str>,
    ) -> GatewayFuture<'a, GatewayResult<Completion>> {
        Box::pin(async move {
            self.calls
                .lock()
                .unwrap()
                .push((messages.to_vec(), model.map(str::to_string)));
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(GatewayError::Internal("no scripted outcome left".to_string())))
        })
    }
}
