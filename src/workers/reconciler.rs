use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::workers::ShutdownRx;
use crate::AppState;

const RECONCILE_INTERVAL: Duration = Duration::from_secs(15);

/// Recovers `ocr_index` from manual DB surgery or historical schema drift:
/// the sync triggers in `db::self_heal` keep it current on the happy path,
/// so this anti-join only ever finds work after something bypassed them.
///
/// Deliberately does not touch jobs stuck `processing` past any timeout —
/// no lease expiry exists and resetting one here would be a silent,
/// unrequested behavior change. That stays a manual operator action.
pub async fn run(state: Arc<AppState>, mut shutdown: ShutdownRx) {
    info!("reconciler started");
    loop {
        if *shutdown.borrow() {
            break;
        }

        if let Err(e) = reconcile_ocr_index(&state).await {
            warn!(error = %e, "reconciler pass failed");
        }

        tokio::select! {
            _ = tokio::time::sleep(RECONCILE_INTERVAL) => {}
            _ = shutdown.changed() => {}
        }
    }
    info!("reconciler stopped");
}

pub async fn reconcile_ocr_index(state: &Arc<AppState>) -> anyhow::Result<()> {
    let result = sqlx::query(
        r#"
        INSERT INTO ocr_index (video_id, frame_key, ocr_text)
        SELECT o.video_id, o.frame_key, o.ocr_text
        FROM ocr_frames o
        WHERE o.is_processed
          AND NOT EXISTS (SELECT 1 FROM ocr_index i WHERE i.frame_key = o.frame_key)
        ON CONFLICT (frame_key) DO NOTHING
        "#,
    )
    .execute(state.db.pool())
    .await?;

    if result.rows_affected() > 0 {
        info!(count = result.rows_affected(), "reconciled missing ocr_index entries");
    }

    Ok(())
}
