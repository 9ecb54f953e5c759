use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use super::domain::{
    MoveRequestId, MoveRequestRecord, PaymentId, PaymentRecord, QuoteId, QuoteRecord, QuoteStatus,
};
use super::lifecycle::MissionState;
use super::repository::{PaymentRepository, QuoteRepository, RepositoryError};

#[derive(Debug, Default)]
struct StoreState {
    requests: BTreeMap<MoveRequestId, MoveRequestRecord>,
    quotes: BTreeMap<QuoteId, QuoteRecord>,
    payments: BTreeMap<PaymentId, PaymentRecord>,
}

/// Process-local store. One mutex covers all tables so the conditional writes are
/// atomic with respect to each other.
#[derive(Debug, Default)]
pub struct InMemoryMarketplaceStore {
    state: Mutex<StoreState>,
}

impl InMemoryMarketplaceStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreState>, RepositoryError> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("store mutex poisoned".to_string()))
    }
}

impl StoreState {
    fn revision_of(&self, id: &MoveRequestId) -> Result<u32, RepositoryError> {
        self.requests
            .get(id)
            .map(|request| request.revision)
            .ok_or(RepositoryError::NotFound)
    }

    fn has_accepted_quote(&self, id: &MoveRequestId) -> bool {
        self.quotes
            .values()
            .any(|quote| &quote.request_id == id && quote.status == QuoteStatus::Accepted)
    }
}

impl QuoteRepository for InMemoryMarketplaceStore {
    fn save_request(&self, record: MoveRequestRecord) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        state.requests.insert(record.request_id.clone(), record);
        Ok(())
    }

    fn fetch_request(
        &self,
        id: &MoveRequestId,
    ) -> Result<Option<MoveRequestRecord>, RepositoryError> {
        Ok(self.lock()?.requests.get(id).cloned())
    }

    fn insert_quote(&self, record: QuoteRecord) -> Result<QuoteRecord, RepositoryError> {
        let mut state = self.lock()?;
        let revision = state.revision_of(&record.request_id)?;
        if revision != record.request_revision
            || state.has_accepted_quote(&record.request_id)
            || state.quotes.contains_key(&record.quote_id)
        {
            return Err(RepositoryError::Conflict);
        }
        state.quotes.insert(record.quote_id.clone(), record.clone());
        Ok(record)
    }

    fn fetch_quote(&self, id: &QuoteId) -> Result<Option<QuoteRecord>, RepositoryError> {
        Ok(self.lock()?.quotes.get(id).cloned())
    }

    fn quotes_for_request(&self, id: &MoveRequestId) -> Result<Vec<QuoteRecord>, RepositoryError> {
        Ok(self
            .lock()?
            .quotes
            .values()
            .filter(|quote| &quote.request_id == id)
            .cloned()
            .collect())
    }

    fn accept_exclusive(
        &self,
        quote_id: &QuoteId,
        payment: PaymentRecord,
    ) -> Result<QuoteRecord, RepositoryError> {
        let mut state = self.lock()?;
        let (request_id, priced_on) = match state.quotes.get(quote_id) {
            Some(quote) if quote.status == QuoteStatus::Pending => {
                (quote.request_id.clone(), quote.request_revision)
            }
            Some(_) => return Err(RepositoryError::Conflict),
            None => return Err(RepositoryError::NotFound),
        };

        if state.revision_of(&request_id)? != priced_on
            || state.has_accepted_quote(&request_id)
            || state.payments.contains_key(&payment.payment_id)
        {
            return Err(RepositoryError::Conflict);
        }

        let mut accepted = None;
        for quote in state.quotes.values_mut() {
            if quote.request_id != request_id {
                continue;
            }
            if &quote.quote_id == quote_id {
                quote.status = QuoteStatus::Accepted;
                accepted = Some(quote.clone());
            } else if quote.status == QuoteStatus::Pending {
                quote.status = QuoteStatus::Rejected;
            }
        }
        state.payments.insert(payment.payment_id.clone(), payment);

        accepted.ok_or(RepositoryError::NotFound)
    }

    fn revise_request(&self, record: MoveRequestRecord) -> Result<Vec<QuoteId>, RepositoryError> {
        let mut state = self.lock()?;
        let id = record.request_id.clone();
        if state.revision_of(&id)? + 1 != record.revision || state.has_accepted_quote(&id) {
            return Err(RepositoryError::Conflict);
        }

        state.requests.insert(id.clone(), record);
        let mut expired = Vec::new();
        for quote in state.quotes.values_mut() {
            if quote.request_id == id && quote.status == QuoteStatus::Pending {
                quote.status = QuoteStatus::Expired;
                expired.push(quote.quote_id.clone());
            }
        }
        Ok(expired)
    }
}

impl PaymentRepository for InMemoryMarketplaceStore {
    fn fetch_payment(&self, id: &PaymentId) -> Result<Option<PaymentRecord>, RepositoryError> {
        Ok(self.lock()?.payments.get(id).cloned())
    }

    fn update_if(
        &self,
        record: PaymentRecord,
        expected: MissionState,
    ) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        let stored = state
            .payments
            .get_mut(&record.payment_id)
            .ok_or(RepositoryError::NotFound)?;
        if MissionState::of(stored) != expected {
            return Err(RepositoryError::Conflict);
        }
        *stored = record;
        Ok(())
    }

    fn awaiting_review(&self) -> Result<Vec<PaymentRecord>, RepositoryError> {
        Ok(self
            .lock()?
            .payments
            .values()
            .filter(|record| MissionState::of(record) == MissionState::CompletedPendingReview)
            .cloned()
            .collect())
    }
}
