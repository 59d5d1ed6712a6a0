//! Actor scheduler.
//!
//! Every actor gets a private, unbounded, strictly ordered mailbox. Ractor
//! runs an actor's commands one at a time while many actors share the tokio
//! worker pool. On top of that this module fixes the failure policy: a
//! command that returns an error or panics is logged and dropped, and the
//! actor carries on with its next command.

use std::any::Any;
use std::future::Future;
use std::marker::PhantomData;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use broker_core::{BrokerError, Result};
use futures_util::FutureExt;
use ractor::concurrency::JoinHandle;
use ractor::rpc::CallResult;
use ractor::{Actor, ActorId, ActorProcessingErr, ActorRef, RpcReplyPort};

/// Upper bound on request/reply queries issued from outside the actor graph.
const QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// What an actor wants to happen after it handled a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Keep processing commands.
    Continue,
    /// Release the actor; queued commands are discarded.
    Stop,
}

/// Application logic of one actor type.
///
/// The scheduler owns the value and calls `handle` for each command, never
/// concurrently, so implementations mutate `self` without locks.
pub trait Behavior: Send + Sized + 'static {
    /// The closed set of commands this actor accepts.
    type Command: Send + 'static;

    /// Actor type name used in logs.
    const KIND: &'static str;

    /// Execute one command.
    fn handle(
        &mut self,
        myself: &Addr<Self::Command>,
        command: Self::Command,
    ) -> impl Future<Output = Result<Step>> + Send;
}

/// Handle to a running actor. Cheap to clone.
pub struct Addr<C> {
    inner: ActorRef<C>,
}

impl<C> Clone for Addr<C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<C> std::fmt::Debug for Addr<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Addr").field(&self.inner.get_id()).finish()
    }
}

impl<C> PartialEq for Addr<C> {
    fn eq(&self, other: &Self) -> bool {
        self.inner.get_id() == other.inner.get_id()
    }
}

impl<C> Eq for Addr<C> {}

impl<C: Send + 'static> Addr<C> {
    /// Stable identity of the actor.
    pub fn id(&self) -> ActorId {
        self.inner.get_id()
    }

    /// Enqueue a command. Never blocks.
    ///
    /// Commands posted from one actor to another run in post order.
    pub fn post(&self, command: C) -> Result<()> {
        self.inner
            .send_message(command)
            .map_err(|_| BrokerError::ActorStopped(self.id().to_string()))
    }

    /// Post a command carrying a reply port and wait for the answer.
    ///
    /// Only used from outside the actor graph (startup code, operators,
    /// tests); actors talk to each other with `post`.
    pub async fn query<R, F>(&self, build: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce(RpcReplyPort<R>) -> C,
    {
        match ractor::rpc::call(&self.inner, build, Some(QUERY_TIMEOUT)).await {
            Ok(CallResult::Success(reply)) => Ok(reply),
            Ok(CallResult::Timeout) => Err(BrokerError::ActorStopped(format!(
                "{} (query timed out)",
                self.id()
            ))),
            Ok(CallResult::SenderError) | Err(_) => {
                Err(BrokerError::ActorStopped(self.id().to_string()))
            }
        }
    }

    /// Ask the actor to stop after its current command.
    pub fn stop(&self) {
        self.inner.stop(None);
    }
}

/// Start an actor and return its handle.
///
/// The join handle resolves once the actor has stopped.
pub async fn spawn<B: Behavior>(behavior: B) -> Result<(Addr<B::Command>, JoinHandle<()>)> {
    let (inner, handle) = Actor::spawn(None, Cell::<B>(PhantomData), behavior)
        .await
        .map_err(|e| BrokerError::Spawn(format!("{}: {}", B::KIND, e)))?;
    Ok((Addr { inner }, handle))
}

/// Ractor adapter running a `Behavior`.
struct Cell<B>(PhantomData<fn() -> B>);

impl<B: Behavior> Actor for Cell<B> {
    type Msg = B::Command;
    type State = B;
    type Arguments = B;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> std::result::Result<Self::State, ActorProcessingErr> {
        tracing::debug!(actor = %myself.get_id(), kind = B::KIND, "actor started");
        Ok(args)
    }

    async fn post_stop(
        &self,
        myself: ActorRef<Self::Msg>,
        _state: &mut Self::State,
    ) -> std::result::Result<(), ActorProcessingErr> {
        tracing::debug!(actor = %myself.get_id(), kind = B::KIND, "actor stopped");
        Ok(())
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> std::result::Result<(), ActorProcessingErr> {
        let addr = Addr { inner: myself };
        let outcome = AssertUnwindSafe(state.handle(&addr, message))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(Step::Continue)) => {}
            Ok(Ok(Step::Stop)) => addr.stop(),
            Ok(Err(e)) => {
                tracing::error!(actor = %addr.id(), kind = B::KIND, error = %e, "command failed");
            }
            Err(panic) => {
                tracing::error!(
                    actor = %addr.id(),
                    kind = B::KIND,
                    panic = panic_message(panic.as_ref()),
                    "command panicked"
                );
            }
        }

        Ok(())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}
