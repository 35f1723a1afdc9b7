use anyhow::Result;
use sqlx::PgPool;
use tracing::{info, warn};

/// Idempotent, additive schema repair, run on every service boot.
///
/// Order matters and is deliberate: tables before columns (a column can't
/// be added to a table that doesn't exist yet), columns before indexes and
/// triggers (an index can reference a column just added this boot),
/// triggers before orphan repair (the insert below must not fire against
/// half-wired triggers). Every statement is `IF NOT EXISTS` or safely
/// re-runnable, so two services booting at once never race into a broken
/// half-state — worst case one of them does redundant work.
///
/// This function only ever adds. It never drops a table or column.
pub async fn run(pool: &PgPool) -> Result<()> {
    create_tables(pool).await?;
    add_missing_columns(pool).await?;
    ensure_fts_projection(pool).await?;
    ensure_triggers(pool).await?;
    repair_orphans(pool).await?;
    info!("schema self-heal complete");
    Ok(())
}

async fn create_tables(pool: &PgPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS videos (
            id UUID PRIMARY KEY,
            filename TEXT NOT NULL,
            path TEXT NOT NULL DEFAULT '',
            status TEXT NOT NULL DEFAULT 'queued',
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            processed_at TIMESTAMPTZ
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS frames (
            id UUID PRIMARY KEY,
            video_id UUID NOT NULL REFERENCES videos(id),
            frame_number INTEGER NOT NULL,
            frame_time DOUBLE PRECISION NOT NULL,
            path TEXT NOT NULL,
            greyscale_is_processed BOOLEAN NOT NULL DEFAULT false,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            UNIQUE (video_id, frame_number)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS ocr_frames (
            id UUID PRIMARY KEY,
            video_id UUID NOT NULL REFERENCES videos(id),
            frame_key TEXT NOT NULL UNIQUE,
            ocr_text TEXT NOT NULL DEFAULT '',
            is_processed BOOLEAN NOT NULL DEFAULT false,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS ocr_index (
            video_id UUID NOT NULL,
            frame_key TEXT PRIMARY KEY,
            ocr_text TEXT NOT NULL DEFAULT ''
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS jobs (
            id UUID PRIMARY KEY,
            video_id UUID NOT NULL REFERENCES videos(id),
            job_type TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'queued',
            retry_count INTEGER NOT NULL DEFAULT 0,
            payload JSONB NOT NULL DEFAULT '{}'::jsonb,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            started_at TIMESTAMPTZ,
            finished_at TIMESTAMPTZ,
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_jobs_claim ON jobs(job_type, status, created_at)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_frames_video_id ON frames(video_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_ocr_frames_video_id ON ocr_frames(video_id)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Schema-drift repair: adds any column this version of the service
/// expects but an older boot (or a hand-edited database) didn't create.
async fn add_missing_columns(pool: &PgPool) -> Result<()> {
    let additions = [
        ("videos", "status", "TEXT NOT NULL DEFAULT 'queued'"),
        ("videos", "processed_at", "TIMESTAMPTZ"),
        ("videos", "path", "TEXT NOT NULL DEFAULT ''"),
        ("frames", "greyscale_is_processed", "BOOLEAN NOT NULL DEFAULT false"),
        ("frames", "frame_time", "DOUBLE PRECISION NOT NULL DEFAULT 0"),
        ("ocr_frames", "is_processed", "BOOLEAN NOT NULL DEFAULT false"),
        ("ocr_frames", "updated_at", "TIMESTAMPTZ NOT NULL DEFAULT now()"),
        ("jobs", "retry_count", "INTEGER NOT NULL DEFAULT 0"),
        ("jobs", "payload", "JSONB NOT NULL DEFAULT '{}'::jsonb"),
    ];

    for (table, column, decl) in additions {
        let sql = format!("ALTER TABLE {table} ADD COLUMN IF NOT EXISTS {column} {decl}");
        sqlx::query(&sql).execute(pool).await?;
    }

    Ok(())
}

/// Ensures `ocr_index` carries a generated `tsvector` column with a GIN
/// index, recreating the index (never the table) if a prior boot created
/// it without one.
async fn ensure_fts_projection(pool: &PgPool) -> Result<()> {
    sqlx::query(
        r#"
        ALTER TABLE ocr_index
        ADD COLUMN IF NOT EXISTS text_search tsvector
        GENERATED ALWAYS AS (to_tsvector('english', coalesce(ocr_text, ''))) STORED
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_ocr_index_fts ON ocr_index USING GIN(text_search)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Drops and recreates the three sync triggers unconditionally so they
/// always reference the current column names, even after a schema-drift
/// repair changed something upstream this same boot.
async fn ensure_triggers(pool: &PgPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE OR REPLACE FUNCTION ocr_index_sync_insert() RETURNS trigger AS $$
        BEGIN
            INSERT INTO ocr_index (video_id, frame_key, ocr_text)
            VALUES (NEW.video_id, NEW.frame_key, NEW.ocr_text)
            ON CONFLICT (frame_key) DO UPDATE SET ocr_text = EXCLUDED.ocr_text;
            RETURN NEW;
        END;
        $$ LANGUAGE plpgsql
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE OR REPLACE FUNCTION ocr_index_sync_update() RETURNS trigger AS $$
        BEGIN
            UPDATE ocr_index SET ocr_text = NEW.ocr_text WHERE frame_key = OLD.frame_key;
            IF NOT FOUND THEN
                INSERT INTO ocr_index (video_id, frame_key, ocr_text)
                VALUES (NEW.video_id, NEW.frame_key, NEW.ocr_text);
            END IF;
            RETURN NEW;
        END;
        $$ LANGUAGE plpgsql
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE OR REPLACE FUNCTION ocr_index_sync_delete() RETURNS trigger AS $$
        BEGIN
            DELETE FROM ocr_index WHERE frame_key = OLD.frame_key;
            RETURN OLD;
        END;
        $$ LANGUAGE plpgsql
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("DROP TRIGGER IF EXISTS ocr_frames_ai ON ocr_frames")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE TRIGGER ocr_frames_ai AFTER INSERT ON ocr_frames \
         FOR EACH ROW EXECUTE FUNCTION ocr_index_sync_insert()",
    )
    .execute(pool)
    .await?;

    sqlx::query("DROP TRIGGER IF EXISTS ocr_frames_au ON ocr_frames")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE TRIGGER ocr_frames_au AFTER UPDATE ON ocr_frames \
         FOR EACH ROW EXECUTE FUNCTION ocr_index_sync_update()",
    )
    .execute(pool)
    .await?;

    sqlx::query("DROP TRIGGER IF EXISTS ocr_frames_ad ON ocr_frames")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE TRIGGER ocr_frames_ad AFTER DELETE ON ocr_frames \
         FOR EACH ROW EXECUTE FUNCTION ocr_index_sync_delete()",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Synthesizes placeholder `Video` parents for any `Frame`/`OcrFrame` row
/// whose `video_id` doesn't resolve — manual DB surgery or a restore from
/// a partial backup are the usual causes. The placeholder is clearly
/// marked (`auto_recovered`) so an operator spots it immediately.
async fn repair_orphans(pool: &PgPool) -> Result<()> {
    let recovered_frames = sqlx::query(
        r#"
        INSERT INTO videos (id, filename, path, status)
        SELECT DISTINCT f.video_id, 'auto_recovered', '', 'processing'
        FROM frames f
        WHERE NOT EXISTS (SELECT 1 FROM videos v WHERE v.id = f.video_id)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .execute(pool)
    .await?
    .rows_affected();

    let recovered_ocr = sqlx::query(
        r#"
        INSERT INTO videos (id, filename, path, status)
        SELECT DISTINCT o.video_id, 'auto_recovered', '', 'processing'
        FROM ocr_frames o
        WHERE NOT EXISTS (SELECT 1 FROM videos v WHERE v.id = o.video_id)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .execute(pool)
    .await?
    .rows_affected();

    if recovered_frames > 0 || recovered_ocr > 0 {
        warn!(
            recovered_frames,
            recovered_ocr, "synthesized placeholder video parents for orphaned rows"
        );
    }

    Ok(())
}
