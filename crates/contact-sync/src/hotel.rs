/// Contact section of the hotel edit form: one email and one phone collection
use serde::Serialize;
use tracing::{info, warn};

use crate::{
    CollectionReconciler, ContactKind, ContactTransport, EditableCollection, ParentId,
    ReconcileError, ReconciliationResult, TransportError,
};

#[derive(Debug, Clone)]
pub struct HotelContactForm {
    hotel: ParentId,
    emails: EditableCollection,
    phones: EditableCollection,
}

impl HotelContactForm {
    /// Blank form for a hotel that has no contacts yet
    pub fn new(hotel: ParentId) -> Self {
        Self {
            hotel,
            emails: EditableCollection::new(ContactKind::Email),
            phones: EditableCollection::new(ContactKind::Phone),
        }
    }

    /// Populate both collections from the server, emails first
    pub async fn load<T: ContactTransport + ?Sized>(
        transport: &T,
        hotel: ParentId,
    ) -> Result<Self, TransportError> {
        let emails = transport.fetch_snapshot(&hotel, ContactKind::Email).await?;
        let phones = transport.fetch_snapshot(&hotel, ContactKind::Phone).await?;

        Ok(Self {
            emails: EditableCollection::from_snapshot(ContactKind::Email, &emails),
            phones: EditableCollection::from_snapshot(ContactKind::Phone, &phones),
            hotel,
        })
    }

    pub fn hotel(&self) -> &ParentId {
        &self.hotel
    }

    pub fn emails(&self) -> &EditableCollection {
        &self.emails
    }

    pub fn emails_mut(&mut self) -> &mut EditableCollection {
        &mut self.emails
    }

    pub fn phones(&self) -> &EditableCollection {
        &self.phones
    }

    pub fn phones_mut(&mut self) -> &mut EditableCollection {
        &mut self.phones
    }

    pub fn collection(&self, kind: ContactKind) -> &EditableCollection {
        match kind {
            ContactKind::Email => &self.emails,
            ContactKind::Phone => &self.phones,
        }
    }

    pub fn collection_mut(&mut self, kind: ContactKind) -> &mut EditableCollection {
        match kind {
            ContactKind::Email => &mut self.emails,
            ContactKind::Phone => &mut self.phones,
        }
    }

    /// Each kind needs at least one value
    pub fn validate(&self) -> Result<(), ReconcileError> {
        for kind in ContactKind::ALL {
            if !self.collection(kind).has_values() {
                return Err(ReconcileError::ValidationFailed { kind });
            }
        }
        Ok(())
    }

    /// Validate both kinds, then reconcile emails and phones one after the other.
    /// Phones are not attempted when the email run hit a fatal transport error.
    pub async fn save<T: ContactTransport>(
        &self,
        reconciler: &CollectionReconciler<T>,
    ) -> Result<HotelSaveReport, ReconcileError> {
        self.validate()?;

        let emails = reconciler.reconcile(&self.hotel, &self.emails).await;
        let fatal = emails.as_ref().err().and_then(|e| e.fatal_source()).cloned();
        let phones = match fatal {
            Some(source) => {
                warn!("Skipping phones for hotel {}: {}", self.hotel, source);
                Err(ReconcileError::NotStarted {
                    kind: ContactKind::Phone,
                    source,
                })
            }
            None => reconciler.reconcile(&self.hotel, &self.phones).await,
        };
        let report = HotelSaveReport { emails, phones };

        info!("Saved contacts for hotel {}: {}", self.hotel, report.summary());
        Ok(report)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HotelSaveReport {
    pub emails: Result<ReconciliationResult, ReconcileError>,
    pub phones: Result<ReconciliationResult, ReconcileError>,
}

impl HotelSaveReport {
    pub fn get(&self, kind: ContactKind) -> &Result<ReconciliationResult, ReconcileError> {
        match kind {
            ContactKind::Email => &self.emails,
            ContactKind::Phone => &self.phones,
        }
    }

    pub fn is_complete(&self) -> bool {
        ContactKind::ALL
            .iter()
            .all(|kind| matches!(self.get(*kind), Ok(result) if result.is_complete()))
    }

    pub fn summary(&self) -> String {
        ContactKind::ALL
            .iter()
            .map(|kind| match self.get(*kind) {
                Ok(result) => result.summary(),
                Err(err) => err.to_string(),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Flattened view for callers that serialize the report
    pub fn to_view(&self) -> Vec<KindReport> {
        ContactKind::ALL
            .iter()
            .map(|kind| {
                let outcome = self.get(*kind);
                KindReport {
                    kind: *kind,
                    ok: outcome.as_ref().map(|r| r.is_complete()).unwrap_or(false),
                    message: match outcome {
                        Ok(result) => result.summary(),
                        Err(err) => err.to_string(),
                    },
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KindReport {
    pub kind: ContactKind,
    pub ok: bool,
    pub message: String,
}
