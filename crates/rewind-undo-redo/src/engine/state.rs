//! Lock-protected engine bookkeeping

use std::collections::{HashMap, VecDeque};

use crate::command::Command;
use crate::scope::{has_scope, Scope, Scopes};
use crate::stack::{Stack, StackId};

/// A submitted command the worker has not started yet
#[derive(Debug, Clone)]
pub(crate) struct PendingEntry {
    pub ticket: u64,
    pub text: String,
    pub scope: Scope,
    pub stack: StackId,
}

#[derive(Debug)]
pub(crate) struct EngineState {
    pub stacks: HashMap<StackId, Stack>,
    pub active: StackId,
    pub default_stack: StackId,
    pub undo_limit: usize,
    pub scopes: Scopes,
    pub routes: Vec<(Scope, StackId)>,
    pub pending: VecDeque<PendingEntry>,
    pub generation: u64,
    sequence: u64,
}

impl EngineState {
    pub fn new(
        scopes: Scopes,
        default_stack: StackId,
        undo_limit: usize,
        routes: Vec<(Scope, StackId)>,
    ) -> Self {
        let mut stacks = HashMap::new();
        stacks.insert(default_stack.clone(), Stack::new(default_stack.clone()));
        Self {
            stacks,
            active: default_stack.clone(),
            default_stack,
            undo_limit,
            scopes,
            routes,
            pending: VecDeque::new(),
            generation: 0,
            sequence: 0,
        }
    }

    pub fn next_sequence(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }

    pub fn stack_mut(&mut self, id: &StackId) -> &mut Stack {
        self.stacks
            .entry(id.clone())
            .or_insert_with(|| Stack::new(id.clone()))
    }

    pub fn active_stack(&self) -> Option<&Stack> {
        self.stacks.get(&self.active)
    }

    /// Explicit stack, else the first route matching the scope, else the active stack
    pub fn resolve_stack(&self, command: &Command) -> StackId {
        if let Some(stack) = command.stack() {
            return stack.clone();
        }
        if !command.scope().is_all() {
            if let Some((_, stack)) = self
                .routes
                .iter()
                .find(|(scope, _)| has_scope(*scope, command.scope()))
            {
                return stack.clone();
            }
        }
        self.active.clone()
    }

    /// Stack and command an undo should act on
    pub fn undo_target(&self, filter: Option<Scope>) -> Option<(StackId, Command)> {
        self.target(filter, Stack::undo_command)
    }

    /// Stack and command a redo should act on
    pub fn redo_target(&self, filter: Option<Scope>) -> Option<(StackId, Command)> {
        self.target(filter, Stack::redo_command)
    }

    fn target<F>(&self, filter: Option<Scope>, candidate: F) -> Option<(StackId, Command)>
    where
        F: Fn(&Stack) -> Option<&Command>,
    {
        match filter {
            None => self
                .active_stack()
                .and_then(|stack| candidate(stack).map(|c| (stack.id().clone(), c.clone()))),
            Some(filter) => self
                .stacks
                .values()
                .filter_map(|stack| {
                    candidate(stack)
                        .filter(|command| has_scope(filter, command.scope()))
                        .map(|command| (stack, command))
                })
                .max_by_key(|(stack, _)| stack.last_touched())
                .map(|(stack, command)| (stack.id().clone(), command.clone())),
        }
    }
}
