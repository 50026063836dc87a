//! Composite operations the UI performs in one step.

use chrono::Local;

use crate::error::Result;
use crate::models::{ActiveFlow, NewMatch, SessionContext};

use super::flows::new_flow;
use super::history::{activate_flow, resolve_active_flow};
use super::matches::save_match;
use super::ordering::add_match_to_flow;
use super::Repository;

/// Where a saved hit ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SavedMatch {
    pub match_id: i64,
    pub flow_id: i64,
    pub flow_match_id: i64,
    /// True when no flow was active and one was created for this hit.
    pub created_flow: bool,
}

impl Repository {
    /// Saves a search hit into the active flow, creating and activating a new
    /// flow first when none is active. Runs as a single transaction.
    pub async fn save_to_active_flow(
        &self,
        session: SessionContext,
        candidate: NewMatch,
    ) -> Result<SavedMatch> {
        let saved = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;

                let (flow_id, created_flow) = match resolve_active_flow(&tx, &session)? {
                    ActiveFlow::Active(flow_id) => (flow_id, false),
                    ActiveFlow::Inactive => {
                        let name = format!("New Flow {}", Local::now().format("%Y-%m-%d %H:%M:%S"));
                        let description = format!(
                            "Auto-created flow for line: {} - in: {}",
                            candidate.line, candidate.file_name
                        );
                        let flow_id = new_flow(&tx, name, Some(description))?;
                        activate_flow(&tx, flow_id)?;
                        (flow_id, true)
                    }
                };

                let match_id = save_match(&tx, candidate)?;
                let flow_match_id = add_match_to_flow(&tx, flow_id, match_id)?;
                tx.commit()?;

                Ok(SavedMatch {
                    match_id,
                    flow_id,
                    flow_match_id,
                    created_flow,
                })
            })
            .await?;

        tracing::info!(
            flow_id = saved.flow_id,
            match_id = saved.match_id,
            created_flow = saved.created_flow,
            "saved hit to flow"
        );
        Ok(saved)
    }
}
