//! Feeding SQLite rows into the async upload loop.
//!
//! The store is read on a blocking thread. Rows become [`UploadTask`]s there and travel
//! through a bounded channel, so the reader can never run far ahead of the uploads. When the
//! consumer goes away the next send fails and the scan stops.

use anyhow::Result;
use futures::{Stream, stream};
use mbtiles2s3_bucket::UploadTask;
use std::ops::ControlFlow;
use tokio::{sync::mpsc, task::JoinHandle};

pub(super) type Emit<'a> = &'a mut dyn FnMut(Result<UploadTask>) -> ControlFlow<()>;

pub(super) fn produce<F>(capacity: usize, scan: F) -> (impl Stream<Item = Result<UploadTask>>, JoinHandle<Result<()>>)
where
	F: FnOnce(Emit) -> Result<()> + Send + 'static,
{
	let (sender, receiver) = mpsc::channel(capacity.max(1));
	let handle = tokio::task::spawn_blocking(move || {
		let mut emit = |item: Result<UploadTask>| match sender.blocking_send(item) {
			Ok(()) => ControlFlow::Continue(()),
			Err(_) => {
				log::debug!("upload loop stopped, ending scan");
				ControlFlow::Break(())
			}
		};
		scan(&mut emit)
	});
	(receiver_stream(receiver), handle)
}

fn receiver_stream<T>(receiver: mpsc::Receiver<T>) -> impl Stream<Item = T> {
	stream::unfold(receiver, |mut receiver| async move {
		receiver.recv().await.map(|item| (item, receiver))
	})
}
