// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Completion plumbing between adapters and the pipeline.
//!
//! Every asynchronous operation gets a [`Completion`] carrying a correlation token. The
//! adapter consumes it with [`Completion::complete`]; if it is dropped instead, a
//! `Dropped` failure is delivered, so each operation produces exactly one
//! [`CompletionEvent`]. The pipeline drains events without blocking on its next tick.

use std::marker::PhantomData;

use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};

use crate::errors::{SyncError, TransportError};

pub type Token = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Published(Result<(), TransportError>),
    WatermarkSynced(Result<(), SyncError>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionEvent {
    pub token: Token,
    pub outcome: Outcome,
}

/// A result type that can be reported through a [`Completion`].
pub trait IntoOutcome: Sized {
    fn into_outcome(self) -> Outcome;
    fn dropped() -> Self;
}

impl IntoOutcome for Result<(), TransportError> {
    fn into_outcome(self) -> Outcome {
        Outcome::Published(self)
    }

    fn dropped() -> Self {
        Err(TransportError::Dropped)
    }
}

impl IntoOutcome for Result<(), SyncError> {
    fn into_outcome(self) -> Outcome {
        Outcome::WatermarkSynced(self)
    }

    fn dropped() -> Self {
        Err(SyncError::Dropped)
    }
}

pub struct Completion<R: IntoOutcome> {
    token: Token,
    tx: Option<UnboundedSender<CompletionEvent>>,
    _result: PhantomData<fn(R)>,
}

pub type PublishCompletion = Completion<Result<(), TransportError>>;
pub type WatermarkCompletion = Completion<Result<(), SyncError>>;

impl<R: IntoOutcome> Completion<R> {
    pub fn token(&self) -> Token {
        self.token
    }

    pub fn complete(mut self, result: R) {
        self.deliver(result);
    }

    fn deliver(&mut self, result: R) {
        if let Some(tx) = self.tx.take() {
            // Receiver gone means the pipeline shut down; nothing left to notify.
            let _ = tx.send(CompletionEvent {
                token: self.token,
                outcome: result.into_outcome(),
            });
        }
    }
}

impl<R: IntoOutcome> Drop for Completion<R> {
    fn drop(&mut self) {
        if self.tx.is_some() {
            tracing::debug!("Completion {} dropped without a result", self.token);
            self.deliver(R::dropped());
        }
    }
}

/// Issues tokens and collects completion events.
pub struct Completions {
    tx: UnboundedSender<CompletionEvent>,
    rx: UnboundedReceiver<CompletionEvent>,
    next_token: Token,
}

impl Completions {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx, next_token: 1 }
    }

    pub fn issue<R: IntoOutcome>(&mut self) -> Completion<R> {
        let token = self.next_token;
        self.next_token += 1;
        Completion {
            token,
            tx: Some(self.tx.clone()),
            _result: PhantomData,
        }
    }

    pub fn try_next(&mut self) -> Option<CompletionEvent> {
        match self.rx.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }
}

impl Default for Completions {
    fn default() -> Self {
        Self::new()
    }
}
