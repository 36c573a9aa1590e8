//! SQL schema definitions.

pub const SCHEMA_V1: &str = r#"
CREATE TABLE IF NOT EXISTS entities (
	entity_type TEXT NOT NULL,
	idx INTEGER NOT NULL,
	address TEXT NOT NULL,
	owner TEXT,
	last_tx_lt INTEGER NOT NULL DEFAULT 0,
	last_tx_hash TEXT,
	last_sync INTEGER NOT NULL DEFAULT 0,
	created_at INTEGER,
	content TEXT,
	text_hashes TEXT NOT NULL DEFAULT '[]',
	needs_translation INTEGER NOT NULL DEFAULT 0,
	translation_attempted_at INTEGER,
	status TEXT,
	freelancer TEXT,
	PRIMARY KEY (entity_type, idx),
	UNIQUE (entity_type, address)
);

CREATE INDEX IF NOT EXISTS idx_entities_address ON entities(address);
CREATE INDEX IF NOT EXISTS idx_entities_translation ON entities(needs_translation);

CREATE TABLE IF NOT EXISTS sync_queue (
	id INTEGER PRIMARY KEY AUTOINCREMENT,
	entity_type TEXT NOT NULL,
	entity_index INTEGER NOT NULL,
	sync_at INTEGER NOT NULL,
	retry_count INTEGER NOT NULL DEFAULT 0,
	min_last_sync INTEGER NOT NULL DEFAULT 0,
	UNIQUE (entity_type, entity_index)
);

CREATE INDEX IF NOT EXISTS idx_sync_queue_sync_at ON sync_queue(sync_at);

CREATE TABLE IF NOT EXISTS order_activities (
	id INTEGER PRIMARY KEY AUTOINCREMENT,
	order_index INTEGER NOT NULL,
	tx_lt INTEGER NOT NULL,
	tx_hash TEXT NOT NULL,
	timestamp INTEGER NOT NULL,
	op_code TEXT NOT NULL,
	sender_address TEXT,
	sender_role TEXT NOT NULL,
	amount TEXT,
	UNIQUE (order_index, tx_lt)
);

CREATE TABLE IF NOT EXISTS notification_queue (
	id INTEGER PRIMARY KEY AUTOINCREMENT,
	order_activity_id INTEGER NOT NULL UNIQUE REFERENCES order_activities(id),
	tx_time INTEGER NOT NULL,
	payload TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_notification_queue_tx_time ON notification_queue(tx_time);

CREATE TABLE IF NOT EXISTS categories (
	id TEXT PRIMARY KEY,
	name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS languages (
	id TEXT PRIMARY KEY,
	code TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS translations (
	content_hash TEXT NOT NULL,
	language TEXT NOT NULL,
	text TEXT NOT NULL,
	PRIMARY KEY (content_hash, language)
);

CREATE TABLE IF NOT EXISTS settings (
	key TEXT PRIMARY KEY,
	value TEXT NOT NULL
);
"#;
