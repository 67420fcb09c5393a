use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::future::BoxFuture;
use futures_util::Stream;
use log::error;
use tokio_util::sync::CancellationToken;

use crate::expression::types::Value;

use super::errors::QueryError;
use super::hooks::QueryHooks;

enum StreamState {
    Pending(BoxFuture<'static, Result<Vec<Value>, QueryError>>),
    Streaming(std::vec::IntoIter<Value>),
    Done,
}

/// Pull stream over the mapped results of an async enumeration.
///
/// The whole batch is materialized (and the enumeration hook fired) before
/// the first item is yielded. Cancellation is checked between items and
/// surfaces as a single `Err(QueryError::Cancelled)`.
pub struct MappedStream {
    state: StreamState,
    cancel: CancellationToken,
    hooks: QueryHooks,
}

impl MappedStream {
    pub(crate) fn new(
        execution: BoxFuture<'static, Result<Vec<Value>, QueryError>>,
        cancel: CancellationToken,
        hooks: QueryHooks,
    ) -> Self {
        MappedStream {
            state: StreamState::Pending(execution),
            cancel,
            hooks,
        }
    }

    fn fail(&mut self, err: QueryError) -> Poll<Option<Result<Value, QueryError>>> {
        error!("❌ Async enumeration failed: {}", err);
        self.hooks.failed(&err);
        self.state = StreamState::Done;
        Poll::Ready(Some(Err(err)))
    }
}

impl Stream for MappedStream {
    type Item = Result<Value, QueryError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            match &mut this.state {
                StreamState::Pending(execution) => match execution.as_mut().poll(cx) {
                    Poll::Pending => return Poll::Pending,
                    Poll::Ready(Ok(items)) => {
                        this.hooks.enumerated(&items);
                        this.state = StreamState::Streaming(items.into_iter());
                    }
                    Poll::Ready(Err(err)) => return this.fail(err),
                },
                StreamState::Streaming(_) if this.cancel.is_cancelled() => {
                    return this.fail(QueryError::Cancelled);
                }
                StreamState::Streaming(items) => match items.next() {
                    Some(item) => return Poll::Ready(Some(Ok(item))),
                    None => {
                        this.state = StreamState::Done;
                        return Poll::Ready(None);
                    }
                },
                StreamState::Done => return Poll::Ready(None),
            }
        }
    }
}
