use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::LoanId;

use super::PostingRequest;

/// journal that could not be posted after its business operation committed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedPosting {
    pub id: Uuid,
    pub request: PostingRequest,
    pub error: String,
    pub first_failed_at: DateTime<Utc>,
    pub last_failed_at: DateTime<Utc>,
    pub attempts: u32,
}

/// operator-visible queue of postings awaiting retry
#[derive(Debug, Default)]
pub struct ReconciliationQueue {
    items: DashMap<Uuid, FailedPosting>,
}

impl ReconciliationQueue {
    pub fn new() -> Self {
        Self {
            items: DashMap::new(),
        }
    }

    pub fn push(&self, request: PostingRequest, error: String, at: DateTime<Utc>) -> Uuid {
        let id = Uuid::new_v4();
        self.items.insert(
            id,
            FailedPosting {
                id,
                request,
                error,
                first_failed_at: at,
                last_failed_at: at,
                attempts: 1,
            },
        );
        id
    }

    /// pending items, oldest failure first
    pub fn pending(&self) -> Vec<FailedPosting> {
        let mut items: Vec<FailedPosting> = self.items.iter().map(|i| i.value().clone()).collect();
        items.sort_by_key(|i| (i.first_failed_at, i.request.reference.clone()));
        items
    }

    pub fn for_loan(&self, loan_id: LoanId) -> Vec<FailedPosting> {
        self.pending()
            .into_iter()
            .filter(|i| i.request.loan_id == loan_id)
            .collect()
    }

    pub fn resolve(&self, id: Uuid) -> Option<FailedPosting> {
        self.items.remove(&id).map(|(_, item)| item)
    }

    pub fn record_retry_failure(&self, id: Uuid, error: String, at: DateTime<Utc>) {
        if let Some(mut item) = self.items.get_mut(&id) {
            item.attempts += 1;
            item.error = error;
            item.last_failed_at = at;
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
