use std::sync::Arc;

use tenant_core::{TenantError, TenantResult};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::clients::RoutingTable;

/// One more than the highest numeric priority, or 1 when there is none.
/// Entries that do not parse (the listener's `default` rule) are ignored.
pub fn next_priority_from<S: AsRef<str>>(priorities: &[S]) -> u32 {
    priorities
        .iter()
        .filter_map(|raw| match raw.as_ref().trim().parse::<u32>() {
            Ok(p) => Some(p),
            Err(_) => {
                debug!(priority = raw.as_ref(), "skipping non-numeric rule priority");
                None
            }
        })
        .max()
        .map_or(1, |max| max + 1)
}

/// Serialized routing-priority allocator.
///
/// Reading the rule table and handing out a number happen under one lock,
/// and every number handed out is remembered as a high-water mark, so two
/// allocations in this process never collide even when the first tenant's
/// rule does not exist yet.
pub struct PriorityAllocator {
    routing: Arc<dyn RoutingTable>,
    high_water: Mutex<u32>,
}

impl PriorityAllocator {
    pub fn new(routing: Arc<dyn RoutingTable>) -> Self {
        Self {
            routing,
            high_water: Mutex::new(0),
        }
    }

    pub async fn next_priority(&self, listener_arn: &str) -> TenantResult<u32> {
        let mut high_water = self.high_water.lock().await;

        let observed = self
            .routing
            .rule_priorities(listener_arn)
            .await
            .map_err(|e| TenantError::provision("priority", e))?;

        let next = next_priority_from(observed.as_slice()).max(*high_water + 1);
        *high_water = next;

        info!(priority = next, "allocated routing priority");
        Ok(next)
    }
}
