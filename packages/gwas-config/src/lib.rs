mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Cache, Config, EmbeddingProviderConfig, Postgres, Providers, Quality, Search, Service, Storage,
	Vectors, Worker,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.dsn.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.postgres.dsn must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "storage.postgres.pool_max_conns must be greater than zero.".to_string(),
		});
	}
	if cfg.storage.postgres.statement_timeout_ms == 0 {
		return Err(Error::Validation {
			message: "storage.postgres.statement_timeout_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions != cfg.storage.vectors.dimensions {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must match storage.vectors.dimensions."
				.to_string(),
		});
	}
	if cfg.providers.embedding.timeout_ms == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.timeout_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.api_key.trim().is_empty() {
		return Err(Error::Validation {
			message: "Provider embedding api_key must be non-empty.".to_string(),
		});
	}

	validate_search(&cfg.search)?;
	validate_cache(&cfg.cache)?;
	validate_quality(&cfg.quality)?;

	if cfg.worker.backfill_enabled && cfg.worker.backfill_batch_size == 0 {
		return Err(Error::Validation {
			message: "worker.backfill_batch_size must be greater than zero when backfill is enabled."
				.to_string(),
		});
	}

	Ok(())
}

fn validate_search(search: &Search) -> Result<()> {
	if search.max_limit == 0 {
		return Err(Error::Validation {
			message: "search.max_limit must be greater than zero.".to_string(),
		});
	}
	if search.default_limit == 0 || search.default_limit > search.max_limit {
		return Err(Error::Validation {
			message: "search.default_limit must be in the range 1..=search.max_limit.".to_string(),
		});
	}
	if search.max_scan_rows < search.max_limit {
		return Err(Error::Validation {
			message: "search.max_scan_rows must be at least search.max_limit.".to_string(),
		});
	}
	if search.min_candidates == 0 {
		return Err(Error::Validation {
			message: "search.min_candidates must be greater than zero.".to_string(),
		});
	}
	if search.max_candidates < search.min_candidates {
		return Err(Error::Validation {
			message: "search.max_candidates must be at least search.min_candidates.".to_string(),
		});
	}
	if search.candidate_multiplier == 0 {
		return Err(Error::Validation {
			message: "search.candidate_multiplier must be greater than zero.".to_string(),
		});
	}
	if search.filtered_candidate_multiplier < search.candidate_multiplier {
		return Err(Error::Validation {
			message:
				"search.filtered_candidate_multiplier must be at least search.candidate_multiplier."
					.to_string(),
		});
	}

	Ok(())
}

fn validate_cache(cache: &Cache) -> Result<()> {
	if cache.memory_capacity == 0 {
		return Err(Error::Validation {
			message: "cache.memory_capacity must be greater than zero.".to_string(),
		});
	}
	if cache.max_age_days <= 0 {
		return Err(Error::Validation {
			message: "cache.max_age_days must be greater than zero.".to_string(),
		});
	}
	if cache.max_idle_days <= 0 {
		return Err(Error::Validation {
			message: "cache.max_idle_days must be greater than zero.".to_string(),
		});
	}
	if cache.min_access_count < 0 {
		return Err(Error::Validation {
			message: "cache.min_access_count must be zero or greater.".to_string(),
		});
	}
	if cache.sweep_interval_seconds == 0 {
		return Err(Error::Validation {
			message: "cache.sweep_interval_seconds must be greater than zero.".to_string(),
		});
	}

	Ok(())
}

fn validate_quality(quality: &Quality) -> Result<()> {
	for (label, value) in [
		("quality.high_min_neg_log10_p", quality.high_min_neg_log10_p),
		("quality.medium_min_neg_log10_p", quality.medium_min_neg_log10_p),
	] {
		if let Some(value) = value
			&& (!value.is_finite() || value < 0.0)
		{
			return Err(Error::Validation {
				message: format!("{label} must be a finite number, zero or greater."),
			});
		}
	}
	for (label, value) in [
		("quality.suggestive_p_value", quality.suggestive_p_value),
		("quality.high_max_p_value", quality.high_max_p_value),
		("quality.medium_max_p_value", quality.medium_max_p_value),
	] {
		if let Some(value) = value
			&& !(value > 0.0 && value <= 1.0)
		{
			return Err(Error::Validation {
				message: format!("{label} must be in the range (0.0, 1.0]."),
			});
		}
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	let embedding = &mut cfg.providers.embedding;

	if embedding.query_prefix.as_deref().map(|prefix| prefix.is_empty()).unwrap_or(false) {
		embedding.query_prefix = None;
	}
	if embedding.document_prefix.as_deref().map(|prefix| prefix.is_empty()).unwrap_or(false) {
		embedding.document_prefix = None;
	}

	cfg.service.log_level = cfg.service.log_level.trim().to_string();
}
