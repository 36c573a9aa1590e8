//! Translation of user-visible entity text.
//!
//! Entities whose translatable text changed carry `needs_translation`. The translation loop picks a
//! batch of them, translates every text into every language from the master's language table, and
//! caches results by `(content hash, language code)` so identical text is translated once. The flag
//! is cleared only after all pairs of an entity are cached.

use crate::content::{AdminContent, ItemContent, OrderContent, UserContent, text_hash};
use crate::model::{EntityKey, EntityType};
use crate::store::Store;
use crate::store::queries::{entities, reference, translations};
use crate::sync::{RecurringTask, RunOutcome, SyncError, TaskKind};
use async_trait::async_trait;
use backoff::{ExponentialBackoff, future::retry};
use chrono::Utc;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum TranslateError {
	#[error("HTTP error: {0}")]
	Http(#[from] reqwest::Error),

	#[error("Translator responded with status {0}")]
	Status(u16),

	#[error("Invalid translator response: {0}")]
	InvalidResponse(String),
}

impl TranslateError {
	fn is_transient(&self) -> bool {
		match self {
			TranslateError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
			TranslateError::Status(code) => *code == 429 || *code >= 500,
			TranslateError::InvalidResponse(_) => false,
		}
	}
}

#[async_trait]
pub trait Translator: Send + Sync {
	/// Translate `text` into the language identified by `language` (an ISO code).
	async fn translate(&self, text: &str, language: &str) -> Result<String, TranslateError>;
}

#[derive(Serialize)]
struct TranslateRequest<'a> {
	text: &'a str,
	target: &'a str,
}

#[derive(Deserialize)]
struct TranslateResponse {
	text: String,
}

/// Translation service reached over HTTP: `POST {text, target}` answering `{text}`.
pub struct HttpTranslator {
	http_client: Client,
	endpoint: String,
	max_elapsed: Duration,
}

impl HttpTranslator {
	pub fn new(endpoint: String, timeout: Duration, max_elapsed: Duration) -> Result<Self, TranslateError> {
		let http_client = Client::builder().timeout(timeout).build()?;
		Ok(Self {
			http_client,
			endpoint,
			max_elapsed,
		})
	}

	async fn request(&self, text: &str, language: &str) -> Result<String, TranslateError> {
		let response = self
			.http_client
			.post(&self.endpoint)
			.json(&TranslateRequest { text, target: language })
			.send()
			.await?;
		let status = response.status();
		if status != StatusCode::OK {
			return Err(TranslateError::Status(status.as_u16()));
		}
		let body: TranslateResponse = response
			.json()
			.await
			.map_err(|e| TranslateError::InvalidResponse(e.to_string()))?;
		Ok(body.text)
	}
}

#[async_trait]
impl Translator for HttpTranslator {
	async fn translate(&self, text: &str, language: &str) -> Result<String, TranslateError> {
		let policy = ExponentialBackoff {
			max_elapsed_time: Some(self.max_elapsed),
			..ExponentialBackoff::default()
		};
		retry(policy, || async {
			self.request(text, language).await.map_err(|e| {
				if e.is_transient() {
					debug!(language, "Translator request failed, retrying: {}", e);
					backoff::Error::transient(e)
				} else {
					backoff::Error::permanent(e)
				}
			})
		})
		.await
	}
}

#[derive(Debug, Clone)]
pub struct TranslationConfig {
	pub batch_size: usize,
	pub default_interval: Duration,
	pub busy_interval: Duration,
}

impl Default for TranslationConfig {
	fn default() -> Self {
		Self {
			batch_size: 10,
			default_interval: Duration::from_secs(60),
			busy_interval: Duration::from_secs(1),
		}
	}
}

pub struct TranslationLoop {
	store: Store,
	translator: Arc<dyn Translator>,
	config: TranslationConfig,
}

impl TranslationLoop {
	pub fn new(store: Store, translator: Arc<dyn Translator>, config: TranslationConfig) -> Self {
		Self {
			store,
			translator,
			config,
		}
	}

	/// Translate one entity. Returns the number of new cache entries and the text hashes covered.
	async fn translate_entity<C: ItemContent>(
		&self,
		index: u64,
		languages: &[String],
	) -> Result<(usize, Vec<String>), SyncError> {
		let Some(entity) = self.store.with(|conn| entities::get::<C>(conn, index))? else {
			return Ok((0, Vec::new()));
		};
		let Some(content) = entity.content else {
			return Ok((0, entity.text_hashes));
		};

		let mut added = 0;
		for text in content.translatable_texts() {
			if text.is_empty() {
				continue;
			}
			let hash = text_hash(text);
			for language in languages {
				if self.store.with(|conn| translations::exists(conn, &hash, language))? {
					continue;
				}
				let translated = self.translator.translate(text, language).await?;
				self.store
					.with(|conn| translations::put(conn, &hash, language, &translated))?;
				added += 1;
			}
		}
		Ok((added, entity.text_hashes))
	}

	async fn translate_key(&self, key: EntityKey, languages: &[String]) -> Result<(usize, Vec<String>), SyncError> {
		match key.entity_type {
			EntityType::Admin => self.translate_entity::<AdminContent>(key.index, languages).await,
			EntityType::User => self.translate_entity::<UserContent>(key.index, languages).await,
			EntityType::Order => self.translate_entity::<OrderContent>(key.index, languages).await,
			EntityType::Master => Ok((0, Vec::new())),
		}
	}

	/// Clear the flag unless the text or the language set changed while translating.
	fn finish(&self, key: EntityKey, text_hashes: &[String], languages: &[String]) -> Result<bool, SyncError> {
		let cleared = self.store.transaction(|conn| {
			let current: Vec<String> = reference::list_languages(conn)?
				.into_iter()
				.map(|l| l.code)
				.collect();
			if current != languages {
				return Ok(false);
			}
			entities::clear_needs_translation(conn, key, text_hashes)
		})?;
		Ok(cleared)
	}
}

#[async_trait]
impl RecurringTask for TranslationLoop {
	fn kind(&self) -> TaskKind {
		TaskKind::Translation
	}

	async fn run(&self) -> Result<RunOutcome, SyncError> {
		let keys = self
			.store
			.with(|conn| entities::list_needing_translation(conn, self.config.batch_size))?;
		if keys.is_empty() {
			return Ok(RunOutcome::after(self.config.default_interval));
		}
		let languages: Vec<String> = self
			.store
			.with(reference::list_languages)?
			.into_iter()
			.map(|l| l.code)
			.collect();

		let mut done = 0;
		let mut failed = 0;
		let mut added = 0;
		for key in &keys {
			match self.translate_key(*key, &languages).await {
				Ok((n, text_hashes)) => {
					added += n;
					if self.finish(*key, &text_hashes, &languages)? {
						done += 1;
					} else {
						debug!(entity = %key, "Text changed while translating, keeping flag");
					}
				}
				Err(SyncError::TranslateError(e)) => {
					warn!(entity = %key, "Translation failed, keeping flag: {}", e);
					self.store
						.with(|conn| entities::mark_translation_attempt(conn, *key, Utc::now()))?;
					failed += 1;
				}
				Err(e) => return Err(e),
			}
		}

		info!(done, failed, translations = added, languages = languages.len(), "Translation run finished");
		let next_interval = if failed == 0 && keys.len() >= self.config.batch_size {
			self.config.busy_interval
		} else {
			self.config.default_interval
		};
		Ok(RunOutcome::after(next_interval))
	}
}
