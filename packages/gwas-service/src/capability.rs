use std::{
	sync::Mutex,
	time::{Duration, Instant},
};

use gwas_storage::db::Capabilities;

use crate::CatalogueStore;

/// What the catalogue store supports, remembered for `ttl`.
pub struct CapabilityProbe {
	ttl: Duration,
	state: Mutex<Option<(Instant, Capabilities)>>,
}
impl CapabilityProbe {
	pub fn new(ttl: Duration) -> Self {
		Self { ttl, state: Mutex::new(None) }
	}

	/// A failed probe reports "unavailable" and is not cached.
	pub async fn similarity_available(&self, store: &dyn CatalogueStore) -> bool {
		if let Some(capabilities) = self.cached() {
			return capabilities.similarity_search();
		}

		match store.capabilities().await {
			Ok(capabilities) => {
				tracing::info!(
					vector_extension = capabilities.vector_extension,
					study_embeddings = capabilities.study_embeddings,
					"Catalogue capabilities probed."
				);

				*self.state.lock().unwrap_or_else(|err| err.into_inner()) =
					Some((Instant::now(), capabilities));

				capabilities.similarity_search()
			},
			Err(err) => {
				tracing::warn!(error = %err, "Capability probe failed. Using lexical matching.");

				false
			},
		}
	}

	pub fn invalidate(&self) {
		*self.state.lock().unwrap_or_else(|err| err.into_inner()) = None;
	}

	fn cached(&self) -> Option<Capabilities> {
		let state = self.state.lock().unwrap_or_else(|err| err.into_inner());

		state
			.as_ref()
			.filter(|(probed_at, _)| probed_at.elapsed() < self.ttl)
			.map(|(_, capabilities)| *capabilities)
	}
}
