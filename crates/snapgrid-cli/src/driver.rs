//! Headless grid driver
//!
//! Stands in for the presentation layer: pages results in as the visible
//! window approaches the end, marks slots visible and drains slot updates.

use serde::Serialize;
use snapgrid_core::{GridSession, RecordState, SlotUpdates};
use snapgrid_search::SearchClient;
use std::time::Duration;

/// How much of the grid to "scroll through"
#[derive(Debug, Clone, Copy)]
pub(crate) struct ScrollPlan {
    /// Slots made visible, from the top
    pub(crate) visible: usize,
    /// Upper bound on pages requested
    pub(crate) max_pages: u32,
    /// Give up waiting for updates after this long
    pub(crate) wait: Duration,
}

/// Final state of one slot
#[derive(Debug, Clone, Serialize)]
pub(crate) struct SlotReport {
    pub(crate) index: usize,
    pub(crate) name: String,
    pub(crate) url: String,
    pub(crate) state: RecordState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) dimensions: Option<(u32, u32)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) error: Option<String>,
}

/// Outcome of a run
#[derive(Debug, Clone, Serialize)]
pub(crate) struct RunReport {
    pub(crate) tags: String,
    pub(crate) generation: u64,
    pub(crate) pages: u32,
    pub(crate) results: usize,
    pub(crate) started: usize,
    pub(crate) downloaded: usize,
    pub(crate) failed: usize,
    pub(crate) slots: Vec<SlotReport>,
}

/// Run one search through `session`
pub(crate) async fn run(
    session: &GridSession,
    updates: &mut SlotUpdates,
    client: &dyn SearchClient,
    tags: &str,
    plan: ScrollPlan,
) -> anyhow::Result<RunReport> {
    let generation = session.begin_search(tags);
    let mut next_page = 1;
    let mut exhausted = false;
    let mut started = 0;
    let mut index = 0;

    loop {
        let near_end = session.is_empty() || session.wants_more(index);
        if near_end && !exhausted && next_page <= plan.max_pages {
            let batch = client.search(tags, next_page).await?;
            if batch.is_empty() {
                exhausted = true;
            } else {
                session.append_page(batch);
                next_page += 1;
            }
            continue;
        }

        if index >= plan.visible || index >= session.len() {
            break;
        }
        if session.on_visible(index)? {
            started += 1;
        }
        index += 1;
    }

    let mut settled = 0;
    while settled < started {
        match tokio::time::timeout(plan.wait, updates.recv()).await {
            Ok(Some(update)) => {
                tracing::debug!(key = %update.key, state = ?update.state, "slot updated");
                settled += 1;
            }
            Ok(None) => break,
            Err(_) => {
                tracing::warn!(settled, started, "gave up waiting for downloads");
                break;
            }
        }
    }

    let slots: Vec<SlotReport> = session
        .store()
        .records()
        .iter()
        .take(index)
        .enumerate()
        .map(|(index, record)| {
            let payload = record.payload();
            SlotReport {
                index,
                name: record.name().to_string(),
                url: record.source_url().to_string(),
                state: record.state(),
                dimensions: payload
                    .as_ref()
                    .and_then(|p| p.image())
                    .map(|image| (image.width(), image.height())),
                error: record.failure().map(|e| e.to_string()),
            }
        })
        .collect();

    let count = |state: RecordState| slots.iter().filter(|slot| slot.state == state).count();
    Ok(RunReport {
        tags: tags.to_string(),
        generation,
        pages: session.store().pages_loaded(),
        results: session.len(),
        started,
        downloaded: count(RecordState::Downloaded),
        failed: count(RecordState::Failed),
        slots,
    })
}

impl RunReport {
    /// Human-readable summary
    #[must_use]
    pub(crate) fn render_text(&self) -> String {
        let mut out = format!(
            "Search \"{}\": {} results in {} page(s)\n",
            self.tags, self.results, self.pages
        );
        for slot in &self.slots {
            let detail = match (&slot.dimensions, &slot.error) {
                (Some((w, h)), _) => format!("{w}x{h}"),
                (None, Some(error)) => error.clone(),
                (None, None) => String::new(),
            };
            out.push_str(&format!(
                "  [{:>3}] {:<11} {} {}\n",
                slot.index,
                format!("{:?}", slot.state),
                slot.name,
                detail
            ));
        }
        out.push_str(&format!(
            "Downloaded: {}  Failed: {}  Started: {}\n",
            self.downloaded, self.failed, self.started
        ));
        out
    }
}
