use anyhow::Result;
use sqlx::{PgPool, Row};

use crate::models::search::{basename, cap_ocr_text, parse_frame_number, SearchHit, SearchResponse};

/// Full-text search over `ocr_index`, falling back to a plain substring
/// match when the tsquery comes back empty — short or heavily
/// misspelled OCR output often doesn't lemmatize into anything
/// `plainto_tsquery` can match, but a human scanning results still wants
/// literal substring hits surfaced rather than nothing.
pub async fn search(pool: &PgPool, query: &str, page: i64, page_size: i64) -> Result<SearchResponse> {
    let page = page.max(1);
    let offset = (page - 1) * page_size;

    let fts_rows = sqlx::query(
        r#"
        SELECT
            oi.video_id,
            oi.frame_key,
            oi.ocr_text,
            ts_rank(oi.text_search, plainto_tsquery('english', $1)) AS rank,
            ts_headline(
                'english', oi.ocr_text, plainto_tsquery('english', $1),
                'StartSel=<mark>, StopSel=</mark>, MaxWords=35, MinWords=15'
            ) AS snippet
        FROM ocr_index oi
        WHERE oi.text_search @@ plainto_tsquery('english', $1)
        ORDER BY rank DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(query)
    .bind(page_size)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let like_pattern = format!("%{}%", query.replace('%', "\\%").replace('_', "\\_"));

    // Total-count always comes from the ILIKE path, even when the FTS
    // query is what actually returned rows: ILIKE is a superset match
    // (lemmatization in `plainto_tsquery` can miss hits substring search
    // finds), so pagination reflects the broader count either way.
    let (total,): (i64,) = sqlx::query_as("SELECT count(*) FROM ocr_index WHERE ocr_text ILIKE $1")
        .bind(&like_pattern)
        .fetch_one(pool)
        .await?;

    let (rows, used_fallback) = if !fts_rows.is_empty() {
        (fts_rows, false)
    } else {
        let fallback_rows = sqlx::query(
            r#"
            SELECT video_id, frame_key, ocr_text, 0.0::real AS rank, ocr_text AS snippet
            FROM ocr_index
            WHERE ocr_text ILIKE $1
            ORDER BY frame_key ASC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(&like_pattern)
        .bind(page_size)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        (fallback_rows, true)
    };

    let items = rows
        .into_iter()
        .map(|row| {
            let frame_key: String = row.try_get("frame_key")?;
            let ocr_text: String = row.try_get("ocr_text")?;
            let snippet: String = row.try_get("snippet")?;
            Ok(SearchHit {
                video_id: row.try_get("video_id")?,
                frame_number: parse_frame_number(&frame_key),
                filename: basename(&frame_key),
                frame_key,
                snippet: if used_fallback { cap_ocr_text(&snippet) } else { snippet },
                ocr_text: cap_ocr_text(&ocr_text),
                presigned_url: None,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let total_pages = if page_size > 0 {
        (total + page_size - 1) / page_size
    } else {
        0
    };

    Ok(SearchResponse {
        items,
        page,
        page_size,
        total,
        total_pages,
    })
}
