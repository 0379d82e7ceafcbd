pub const RECORDS_TABLE: &str = "analysis_records";

pub const CREATE_RECORDS_TABLE_SQL: &str = "CREATE TABLE IF NOT EXISTS analysis_records (\
    id INTEGER PRIMARY KEY AUTOINCREMENT,\
    text_content TEXT NOT NULL,\
    ai_reply TEXT NOT NULL,\
    sentiment VARCHAR NOT NULL,\
    word_count INTEGER NOT NULL\
)";

pub const CREATE_RECORDS_ID_INDEX_SQL: &str =
    "CREATE INDEX IF NOT EXISTS ix_analysis_records_id ON analysis_records (id)";

pub const MIGRATION_STATEMENTS_SQL: [&str; 2] =
    [CREATE_RECORDS_TABLE_SQL, CREATE_RECORDS_ID_INDEX_SQL];

pub const INSERT_RECORD_SQL: &str = "INSERT INTO analysis_records \
    (text_content, ai_reply, sentiment, word_count) VALUES (?, ?, ?, ?)";

pub const SELECT_RECENT_SQL: &str = "SELECT id, text_content, ai_reply, sentiment, word_count \
    FROM analysis_records ORDER BY id DESC LIMIT ?";

pub const COUNT_RECORDS_SQL: &str = "SELECT COUNT(*) FROM analysis_records";
