//! Conversation loop: ask the model, run the command it tags, feed the result
//! back, repeat.
//!
//! Commands go through the orchestrator's executor so approval, retries and
//! session recording are the same as for plan steps.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::core::feedback::compose_feedback;
use crate::core::tags::first_tag;
use crate::core::types::CommandOutcome;
use crate::io::approval::Prompter;
use crate::io::model::{LanguageModel, Message};
use crate::io::prompt::PromptEngine;
use crate::io::shell::CommandRunner;
use crate::orchestrator::{KNOWLEDGE_ENTRIES, Orchestrator, ProcessContext};
use crate::session::Role;

/// Why the conversation loop ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum StopReason {
    /// The model replied without an action tag.
    Answered,
    /// The operator refused a command; nothing is fed back.
    Denied,
    /// `max_followups` results were already fed back.
    FollowupLimit,
    /// The model used a tag kind this loop cannot run.
    Unsupported(String),
}

/// One command the model asked for and what came of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Exchange {
    pub command: String,
    pub outcome: CommandOutcome,
    pub feedback: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conversation {
    /// Last model reply.
    pub reply: String,
    pub exchanges: Vec<Exchange>,
    pub stop: StopReason,
}

pub struct Assistant<M> {
    model: M,
    prompts: PromptEngine,
    max_followups: u32,
}

impl<M: LanguageModel> Assistant<M> {
    pub fn new(model: M, max_followups: u32) -> Result<Self> {
        Ok(Self {
            model,
            prompts: PromptEngine::new()?,
            max_followups,
        })
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Handle one user request. Model failures propagate; command failures are
    /// fed back to the model. Knowledge relevant to the request is appended
    /// to the system message.
    #[instrument(skip_all, fields(max_followups = self.max_followups))]
    pub fn respond<R: CommandRunner, P: Prompter>(
        &mut self,
        request: &str,
        orchestrator: &mut Orchestrator<'_, R, P>,
        ctx: &mut ProcessContext<'_>,
    ) -> Result<Conversation> {
        let knowledge = ctx
            .knowledge
            .as_deref()
            .map(|store| store.context_for_query(request, KNOWLEDGE_ENTRIES))
            .unwrap_or_default();
        let mut messages = vec![
            Message::system(self.prompts.render_system(&knowledge)?),
            Message::user(request),
        ];
        orchestrator.session_mut().add_turn(Role::User, request);

        let mut exchanges = Vec::new();
        let mut followups = 0;
        loop {
            let reply = self
                .model
                .complete(&messages)
                .with_context(|| format!("request reply {} from model", followups + 1))?;
            orchestrator
                .session_mut()
                .add_turn(Role::Assistant, reply.clone());
            messages.push(Message::assistant(reply.clone()));

            let Some(tag) = first_tag(&reply) else {
                return Ok(Conversation {
                    reply,
                    exchanges,
                    stop: StopReason::Answered,
                });
            };
            if !tag.is_terminal() {
                warn!(kind = %tag.kind, "unsupported action tag");
                return Ok(Conversation {
                    reply,
                    exchanges,
                    stop: StopReason::Unsupported(tag.kind),
                });
            }

            let outcome = orchestrator.execute_command(&tag.body, ctx);
            let feedback = compose_feedback(&outcome);
            info!(command = %tag.body, kind = ?feedback.kind, "command feedback");
            let follow_up = feedback.should_follow_up();
            let text = feedback.text;
            exchanges.push(Exchange {
                command: tag.body,
                outcome,
                feedback: text.clone(),
            });

            if !follow_up {
                return Ok(Conversation {
                    reply,
                    exchanges,
                    stop: StopReason::Denied,
                });
            }
            if followups >= self.max_followups {
                return Ok(Conversation {
                    reply,
                    exchanges,
                    stop: StopReason::FollowupLimit,
                });
            }

            followups += 1;
            orchestrator.session_mut().add_turn_with(
                Role::System,
                text.clone(),
                BTreeMap::from([("kind".to_string(), "feedback".to_string())]),
            );
            messages.push(Message::user(text));
        }
    }
}
