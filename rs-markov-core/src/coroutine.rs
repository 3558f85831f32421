//! Cooperative step engine.
//!
//! A [`Coroutine`] wraps a procedure written as ordinary sequential code with
//! explicit suspension points. The caller advances it with [`Coroutine::step`]:
//! each call runs the procedure until its next [`Yielder::suspend`], hands the
//! suspended value back, and parks the procedure exactly there until the next
//! call delivers an input.
//!
//! The procedure is an `async` block polled by hand with a no-op waker. No
//! executor is involved and nothing runs between two `step` calls, so the
//! caller fully controls pacing and cancellation (drop the coroutine to cancel).
//!
//! ```
//! use rs_markov_core::coroutine::Coroutine;
//!
//! let mut counter = Coroutine::new(|co, start: u32| async move {
//! 	let mut total = start;
//! 	for _ in 0..3 {
//! 		total += co.suspend(total).await;
//! 	}
//! 	Ok(total)
//! });
//!
//! assert_eq!(counter.step(1).unwrap(), Some(1));
//! assert_eq!(counter.step(10).unwrap(), Some(11));
//! assert_eq!(counter.step(100).unwrap(), Some(111));
//! assert_eq!(counter.step(1000).unwrap(), None);
//! assert_eq!(counter.into_result(), Some(1111));
//! ```

use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use crate::error::{Error, Result};

type Procedure<'a, R> = Pin<Box<dyn Future<Output = Result<R>> + 'a>>;
type Starter<'a, Y, I, R> = Box<dyn FnOnce(Yielder<Y, I>, I) -> Procedure<'a, R> + 'a>;

/// Slot shared between the engine and the procedure's yield handle.
struct Exchange<Y, I> {
	/// Value handed out by the last suspension, not yet collected.
	yielded: Option<Y>,
	/// Input waiting to be delivered to the pending suspension.
	input: Option<I>,
}

/// Observable lifecycle of a [`Coroutine`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
	/// Created, the procedure has not run yet.
	NotStarted,
	/// Parked at a suspension point, waiting for the next `step`.
	Paused,
	/// Inside a `step` call. Only transient.
	Running,
	/// The procedure returned; its result is available.
	Finished,
	/// The procedure failed; the error was returned by the failing `step`.
	Failed,
}

enum Stage<'a, Y, I, R> {
	Created(Starter<'a, Y, I, R>),
	Suspended(Procedure<'a, R>),
	Running,
	Finished(Option<R>),
	/// Message of the error that ended the procedure.
	Failed(String),
}

/// Handle given to a procedure so it can suspend itself.
pub struct Yielder<Y, I = ()> {
	exchange: Rc<RefCell<Exchange<Y, I>>>,
}

impl<Y, I> Yielder<Y, I> {
	/// Suspends the procedure, handing `value` to the caller of `step`.
	///
	/// Resolves to the input of the `step` call that resumes the procedure.
	pub fn suspend(&self, value: Y) -> Suspend<'_, Y, I> {
		Suspend { yielder: self, value: Some(value) }
	}
}

/// Future returned by [`Yielder::suspend`].
///
/// Pending on its first poll (after publishing the value), ready with the
/// resumption input on the next one.
pub struct Suspend<'y, Y, I> {
	yielder: &'y Yielder<Y, I>,
	value: Option<Y>,
}

// Never pin-projected.
impl<Y, I> Unpin for Suspend<'_, Y, I> {}

impl<Y, I> Future for Suspend<'_, Y, I> {
	type Output = I;

	fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<I> {
		let this = self.get_mut();
		let mut exchange = this.yielder.exchange.borrow_mut();
		match this.value.take() {
			Some(value) => {
				exchange.yielded = Some(value);
				Poll::Pending
			}
			None => match exchange.input.take() {
				Some(input) => Poll::Ready(input),
				None => Poll::Pending,
			},
		}
	}
}

/// A procedure that runs in increments between suspension points.
///
/// - `Y`: values handed out at each suspension.
/// - `I`: inputs delivered on each `step` (the first one starts the procedure).
/// - `R`: final result.
///
/// `step` takes `&mut self`, so at most one step is ever in flight.
pub struct Coroutine<'a, Y, I = (), R = ()> {
	exchange: Rc<RefCell<Exchange<Y, I>>>,
	stage: Stage<'a, Y, I, R>,
}

impl<'a, Y, I, R> Coroutine<'a, Y, I, R> {
	/// Wraps `procedure`. Nothing runs until the first [`step`](Self::step).
	pub fn new<F, Fut>(procedure: F) -> Self
	where
		F: FnOnce(Yielder<Y, I>, I) -> Fut + 'a,
		Fut: Future<Output = Result<R>> + 'a,
	{
		let starter: Starter<'a, Y, I, R> =
			Box::new(move |yielder: Yielder<Y, I>, input: I| -> Procedure<'a, R> {
				Box::pin(procedure(yielder, input))
			});
		Self {
			exchange: Rc::new(RefCell::new(Exchange { yielded: None, input: None })),
			stage: Stage::Created(starter),
		}
	}

	/// Advances the procedure to its next suspension point.
	///
	/// - Not started: starts it with `input` as its argument.
	/// - Paused: delivers `input` as the result of the pending suspension.
	///
	/// # Returns
	/// - `Ok(Some(value))`: the procedure suspended with `value`.
	/// - `Ok(None)`: the procedure completed during this step; see
	///   [`result`](Self::result).
	///
	/// # Errors
	/// - The procedure's own error, exactly once, on the step where it failed.
	/// - [`Error::ForeignSuspension`] if it suspended without yielding.
	/// - [`Error::CoroutineFinished`] / [`Error::CoroutineFailed`] when stepped
	///   after reaching a terminal state. The latter repeats the original
	///   failure message.
	pub fn step(&mut self, input: I) -> Result<Option<Y>> {
		let mut procedure = match std::mem::replace(&mut self.stage, Stage::Running) {
			Stage::Created(start) => start(Yielder { exchange: Rc::clone(&self.exchange) }, input),
			Stage::Suspended(procedure) => {
				self.exchange.borrow_mut().input = Some(input);
				procedure
			}
			Stage::Finished(result) => {
				self.stage = Stage::Finished(result);
				return Err(Error::CoroutineFinished);
			}
			Stage::Failed(message) => {
				self.stage = Stage::Failed(message.clone());
				return Err(Error::CoroutineFailed(message));
			}
			// An earlier step unwound mid-poll.
			Stage::Running => {
				let message = "procedure panicked during a step".to_owned();
				self.stage = Stage::Failed(message.clone());
				return Err(Error::CoroutineFailed(message));
			}
		};

		let mut cx = Context::from_waker(Waker::noop());
		match procedure.as_mut().poll(&mut cx) {
			Poll::Ready(Ok(result)) => {
				self.stage = Stage::Finished(Some(result));
				Ok(None)
			}
			Poll::Ready(Err(e)) => {
				self.stage = Stage::Failed(e.to_string());
				Err(e)
			}
			Poll::Pending => {
				let yielded = self.exchange.borrow_mut().yielded.take();
				match yielded {
					Some(value) => {
						self.stage = Stage::Suspended(procedure);
						Ok(Some(value))
					}
					None => {
						self.stage = Stage::Failed(Error::ForeignSuspension.to_string());
						Err(Error::ForeignSuspension)
					}
				}
			}
		}
	}

	/// Current lifecycle state.
	pub fn status(&self) -> Status {
		match self.stage {
			Stage::Created(_) => Status::NotStarted,
			Stage::Suspended(_) => Status::Paused,
			Stage::Running => Status::Running,
			Stage::Finished(_) => Status::Finished,
			Stage::Failed(_) => Status::Failed,
		}
	}

	/// True once the procedure finished or failed.
	pub fn is_done(&self) -> bool {
		matches!(self.status(), Status::Finished | Status::Failed)
	}

	/// Final result, once finished.
	pub fn result(&self) -> Option<&R> {
		match &self.stage {
			Stage::Finished(result) => result.as_ref(),
			_ => None,
		}
	}

	/// Message of the error the procedure failed with, once failed.
	pub fn error(&self) -> Option<&str> {
		match &self.stage {
			Stage::Failed(message) => Some(message.as_str()),
			_ => None,
		}
	}

	/// Consumes the coroutine, returning its final result if it finished.
	pub fn into_result(self) -> Option<R> {
		match self.stage {
			Stage::Finished(result) => result,
			_ => None,
		}
	}
}

impl<Y, R> Coroutine<'_, Y, (), R> {
	/// Drives the procedure to completion, discarding suspended values.
	pub fn run(mut self) -> Result<R> {
		while self.step(())?.is_some() {}
		self.into_result().ok_or(Error::CoroutineFinished)
	}
}

/// Pull-based iteration: each item is the next suspended value.
///
/// Iteration ends when the procedure completes. A failure is produced once as
/// `Some(Err(_))`, after which iteration ends.
impl<Y, R> Iterator for Coroutine<'_, Y, (), R> {
	type Item = Result<Y>;

	fn next(&mut self) -> Option<Result<Y>> {
		if self.is_done() {
			return None;
		}
		self.step(()).transpose()
	}
}
