//! The multi-turn run loop: owns conversation state, drives
//! [`TurnRunner`] across however many turns a run needs, and exposes the
//! mutators (`register_tool`, `register_hook`, `switch_model`,
//! `set_reasoning_level`, `clear_messages`) that are rejected while a
//! turn is in flight.

use std::sync::Mutex;

use crate::abort::AbortToken;
use crate::config::AgentOptions;
use crate::error::{Error, Result};
use crate::events::{Event, EventSink, EventSubscriber};
use crate::hooks::{Hook, HookEngine};
use crate::stream::{Provider, ProviderStreamOptions};
use crate::tools::{CancellableTool, Tool, ToolRegistry};
use crate::turn::TurnRunner;
use crate::types::{AgentState, Content, Message, StopReason};

/// Owns one conversation's state and drives turns against a provider.
/// `Client` is internally synchronized so mutators can check
/// `AgentState::is_running` without requiring `&mut self` everywhere a
/// caller might want to hold a reference across an in-flight turn.
pub struct Client {
    provider: Box<dyn Provider>,
    registry: Mutex<ToolRegistry>,
    hooks: Mutex<HookEngine>,
    sink: EventSink,
    options: AgentOptions,
    state: Mutex<AgentState>,
    abort: Mutex<AbortToken>,
}

impl Client {
    pub fn new(session_id: impl Into<String>, provider: Box<dyn Provider>, options: AgentOptions) -> Self {
        Client {
            provider,
            registry: Mutex::new(ToolRegistry::new()),
            hooks: Mutex::new(HookEngine::new()),
            sink: EventSink::new(),
            options,
            state: Mutex::new(AgentState::new(session_id)),
            abort: Mutex::new(AbortToken::new()),
        }
    }

    pub fn subscribe(&self, subscriber: Box<dyn EventSubscriber>) {
        self.sink.subscribe(subscriber);
    }

    pub fn history(&self) -> Vec<Message> {
        self.state.lock().unwrap().messages.clone()
    }

    pub fn state_snapshot(&self) -> AgentState {
        self.state.lock().unwrap().clone()
    }

    pub fn register_tool(&self, tool: Box<dyn Tool>) -> Result<()> {
        self.guard_not_running()?;
        self.registry.lock().unwrap().register(tool);
        Ok(())
    }

    pub fn register_cancellable_tool(&self, tool: Box<dyn CancellableTool>) -> Result<()> {
        self.guard_not_running()?;
        self.registry.lock().unwrap().register_cancellable(tool);
        Ok(())
    }

    pub fn register_hook(&self, hook: Box<dyn Hook>) -> Result<()> {
        self.guard_not_running()?;
        self.hooks.lock().unwrap().register(hook);
        Ok(())
    }

    pub fn clear_messages(&self) -> Result<()> {
        self.guard_not_running()?;
        self.state.lock().unwrap().messages.clear();
        Ok(())
    }

    fn guard_not_running(&self) -> Result<()> {
        if self.state.lock().unwrap().is_running {
            return Err(Error::AgentBusy);
        }
        Ok(())
    }

    /// Cooperatively cancel the in-flight run, if any. Tripping an idle
    /// client's token is a harmless no-op for the next run.
    pub fn abort(&self) {
        self.abort.lock().unwrap().trip();
    }

    /// Send a user message and run turns until the model stops asking for
    /// tools, or `max_turns` is reached. Returns every message appended to
    /// history during this call (the new user message plus everything the
    /// turn loop produced).
    pub async fn run(&self, user_content: impl Into<Content>) -> Result<Vec<Message>> {
        {
            let mut state = self.state.lock().unwrap();
            if state.is_running {
                return Err(Error::AgentBusy);
            }
            state.is_running = true;
        }

        let abort = {
            let mut guard = self.abort.lock().unwrap();
            *guard = AbortToken::new();
            guard.clone()
        };

        let result = self.run_inner(user_content, &abort).await;

        self.state.lock().unwrap().is_running = false;
        result
    }

    async fn run_inner(&self, user_content: impl Into<Content>, abort: &AbortToken) -> Result<Vec<Message>> {
        self.sink.emit(Event::RunStarted);

        let user_message = Message::user(user_content);
        self.state.lock().unwrap().messages.push(user_message.clone());
        let mut produced = vec![user_message];

        let mut stop_reason = StopReason::EndTurn;
        for turn in 0..self.options.max_turns {
            if abort.is_tripped() {
                let partial = self.state.lock().unwrap().streaming_content.clone();
                self.sink.emit(Event::AgentInterrupted { partial_content: partial });
                return Err(Error::Aborted(String::new()));
            }

            let context = self.build_context();
            let stream_options = self.stream_options();

            // Locked fresh each turn (and dropped at the end of this loop
            // body) rather than held for the whole run: `build_context`
            // above takes its own short-lived lock on `registry`, and
            // `register_tool`/`register_hook` need to be able to acquire
            // these between runs without this loop holding them forever.
            let registry = self.registry.lock().unwrap();
            let hooks = self.hooks.lock().unwrap();
            let runner = TurnRunner::new(self.provider.as_ref(), &registry, &hooks, &self.sink, &self.state);

            // A genuine stream/provider error aborts the run: `AgentEnd`
            // (`RunEnded`) is still emitted, matching every other clean or
            // failing exit. `Aborted` is handled below instead, since an
            // interrupted turn reports itself via `TurnOutcome::interrupted`
            // rather than an `Err` so its partial messages aren't lost.
            let outcome = match runner.execute(turn, &context, &stream_options, abort).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    self.sink.emit(Event::RunEnded);
                    return Err(err);
                }
            };

            {
                let mut state = self.state.lock().unwrap();
                state.current_turn = turn;
                state.messages.extend(outcome.messages.iter().cloned());
                if let Some(usage) = outcome.usage {
                    state.token_usage_totals = state.token_usage_totals.add(&usage);
                }
            }
            produced.extend(outcome.messages.iter().cloned());

            if outcome.interrupted {
                let partial = outcome
                    .partial_content
                    .unwrap_or_else(|| self.state.lock().unwrap().streaming_content.clone());
                self.sink.emit(Event::AgentInterrupted { partial_content: partial });
                return Err(Error::Aborted(String::new()));
            }

            stop_reason = outcome.stop_reason;
            if stop_reason != StopReason::ToolUse {
                break;
            }
        }

        self.sink.emit(Event::RunEnded);
        let _ = stop_reason;
        Ok(produced)
    }

    fn build_context(&self) -> crate::types::Context {
        let state = self.state.lock().unwrap();
        let registry = self.registry.lock().unwrap();
        crate::types::Context {
            messages: state.messages.clone(),
            system_prompt: None,
            tools: registry.descriptors(),
        }
    }

    fn stream_options(&self) -> ProviderStreamOptions {
        ProviderStreamOptions {
            max_tokens: self.options.max_tokens,
            temperature: self.options.temperature,
            enable_thinking: self.options.enable_thinking,
            thinking_budget: self.options.thinking_budget,
            stop_sequences: self.options.stop_sequences.clone(),
            reasoning_effort: self.options.reasoning_effort.clone(),
        }
    }
}

/// Single-turn, historyless convenience entry point: build a throwaway
/// `Client`, send one message, and return just the resulting messages.
/// Useful for one-off prompts that need no multi-turn state.
pub async fn query(provider: Box<dyn Provider>, prompt: impl Into<Content>, options: AgentOptions) -> Result<Vec<Message>> {
    let client = Client::new("query", provider, options);
    client.run(prompt).await
}
