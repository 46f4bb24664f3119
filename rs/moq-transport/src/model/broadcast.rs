//! A broadcast is a named collection of tracks, split into a [BroadcastProducer] and [BroadcastConsumer] handle.
//!
//! Subscribing returns a fresh [TrackConsumer] cursor; an unknown track is returned already closed with [Error::NotFound].

use std::collections::HashMap;

use web_async::Lock;

use crate::Error;

use super::{Track, TrackConsumer, TrackProducer};

#[derive(Default)]
struct BroadcastState {
	tracks: HashMap<String, TrackConsumer>,
}

/// Publishes tracks to any number of subscribers.
#[derive(Clone)]
pub struct BroadcastProducer {
	state: Lock<BroadcastState>,
}

impl BroadcastProducer {
	pub fn new() -> Self {
		Self {
			state: Default::default(),
		}
	}

	/// Create a new track and make it available to subscribers.
	pub fn create_track(&mut self, track: Track) -> TrackProducer {
		let track = track.produce();
		self.insert_track(track.consumer);
		track.producer
	}

	/// Publish an existing track, returning true if it replaced one with the same name.
	pub fn insert_track(&mut self, track: TrackConsumer) -> bool {
		let name = track.info.name.clone();
		let replaced = self.state.lock().tracks.insert(name.clone(), track).is_some();
		if replaced {
			tracing::debug!(track = %name, "replaced track");
		}
		replaced
	}

	pub fn remove_track(&mut self, name: &str) -> Option<TrackConsumer> {
		self.state.lock().tracks.remove(name)
	}

	pub fn consume(&self) -> BroadcastConsumer {
		BroadcastConsumer {
			state: self.state.clone(),
		}
	}
}

impl Default for BroadcastProducer {
	fn default() -> Self {
		Self::new()
	}
}

/// Subscribes to tracks by name.
#[derive(Clone)]
pub struct BroadcastConsumer {
	state: Lock<BroadcastState>,
}

impl BroadcastConsumer {
	pub fn subscribe_track(&self, track: &Track) -> TrackConsumer {
		if let Some(existing) = self.state.lock().tracks.get(&track.name) {
			let mut consumer = existing.clone();
			consumer.info.priority = track.priority;
			return consumer;
		}

		tracing::debug!(track = %track.name, "track not found");

		let mut missing = track.clone().produce();
		missing.producer.abort(Error::NotFound);
		missing.consumer
	}
}
