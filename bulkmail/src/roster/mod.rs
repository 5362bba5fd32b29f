//! Recipient roster
//!
//! An ordered, de-duplicated list of recipients with per-entry status and
//! selection. Insertion order is the dispatch and display order. Every
//! mutation bumps a version counter so observers can tell snapshots apart.
//!
//! Status changes go through [`Roster::update_status`], which only accepts
//! the transitions a send run can make:
//!
//! ```text
//! Pending -> Sending -> Sent
//!                    -> Failed -> Sending (later run)
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::DeliveryErrorKind;
use crate::recipients::is_valid_address;

/// Roster mutation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RosterError {
    /// The address does not look like `local@domain.tld`
    #[error("Please enter a valid email address: {0}")]
    InvalidAddress(String),

    /// The address is already in the roster
    #[error("Email already exists in the list: {0}")]
    DuplicateAddress(String),

    /// No entry has this address
    #[error("no recipient with address {0}")]
    UnknownRecipient(String),

    /// The requested status change is not allowed
    #[error("cannot move {address} from {from} to {to}")]
    InvalidTransition {
        /// Recipient address
        address: String,
        /// Current status name
        from: &'static str,
        /// Requested status name
        to: &'static str,
    },
}

/// Delivery status of one recipient
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum RecipientStatus {
    /// Not yet dispatched
    #[default]
    Pending,

    /// Delivery call in flight
    Sending,

    /// Delivered to the relay
    Sent {
        /// Relay message identifier
        message_id: Option<String>,
    },

    /// Delivery failed or was cancelled in flight
    Failed {
        /// Why it failed
        kind: DeliveryErrorKind,
        /// Human-readable detail
        detail: String,
    },
}

impl RecipientStatus {
    /// Lowercase status name
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sending => "sending",
            Self::Sent { .. } => "sent",
            Self::Failed { .. } => "failed",
        }
    }

    /// Whether the recipient has been delivered
    #[must_use]
    pub const fn is_sent(&self) -> bool {
        matches!(self, Self::Sent { .. })
    }

    /// Whether the recipient ended in failure
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Whether moving to `next` is a legal transition
    #[must_use]
    pub const fn can_become(&self, next: &Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending | Self::Failed { .. }, Self::Sending)
                | (Self::Sending, Self::Sent { .. } | Self::Failed { .. })
        )
    }
}

impl std::fmt::Display for RecipientStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One recipient in the roster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientEntry {
    /// Recipient address, as provided
    pub address: String,
    /// Delivery status
    pub status: RecipientStatus,
    /// Whether the next run should include this recipient
    pub selected: bool,
}

impl RecipientEntry {
    /// A pending, selected entry
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            status: RecipientStatus::Pending,
            selected: true,
        }
    }

    /// Whether a run would dispatch this entry
    #[must_use]
    pub const fn is_eligible(&self) -> bool {
        self.selected && !self.status.is_sent()
    }
}

/// Count of entries per status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    /// Pending entries
    pub pending: usize,
    /// Entries in flight
    pub sending: usize,
    /// Delivered entries
    pub sent: usize,
    /// Failed entries
    pub failed: usize,
}

/// Point-in-time copy of the roster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterSnapshot {
    /// Roster version the snapshot was taken at
    pub version: u64,
    /// Entries in roster order
    pub entries: Vec<RecipientEntry>,
}

impl RosterSnapshot {
    /// Entry with the given address
    #[must_use]
    pub fn get(&self, address: &str) -> Option<&RecipientEntry> {
        self.entries.iter().find(|e| e.address == address)
    }

    /// Count of entries per status
    #[must_use]
    pub fn counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for entry in &self.entries {
            match entry.status {
                RecipientStatus::Pending => counts.pending += 1,
                RecipientStatus::Sending => counts.sending += 1,
                RecipientStatus::Sent { .. } => counts.sent += 1,
                RecipientStatus::Failed { .. } => counts.failed += 1,
            }
        }
        counts
    }

    /// Number of selected entries
    #[must_use]
    pub fn selected_count(&self) -> usize {
        self.entries.iter().filter(|e| e.selected).count()
    }
}

/// Ordered, de-duplicated recipients
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Roster {
    entries: Vec<RecipientEntry>,
    version: u64,
}

impl Roster {
    /// An empty roster
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a roster from addresses, all selected and pending
    ///
    /// # Errors
    ///
    /// Fails on the first invalid or duplicate address
    pub fn from_addresses<I, S>(addresses: I) -> Result<Self, RosterError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut roster = Self::new();
        for address in addresses {
            roster.add(address)?;
        }
        Ok(roster)
    }

    /// Current version; bumped by every mutation
    #[must_use]
    pub const fn version(&self) -> u64 {
        self.version
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the roster has no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in roster order
    #[must_use]
    pub fn entries(&self) -> &[RecipientEntry] {
        &self.entries
    }

    /// Entry with the given address
    #[must_use]
    pub fn get(&self, address: &str) -> Option<&RecipientEntry> {
        self.entries.iter().find(|e| e.address == address)
    }

    /// Whether an entry with this exact address exists
    #[must_use]
    pub fn contains(&self, address: &str) -> bool {
        self.get(address).is_some()
    }

    /// Copy the roster for readers
    #[must_use]
    pub fn snapshot(&self) -> RosterSnapshot {
        RosterSnapshot {
            version: self.version,
            entries: self.entries.clone(),
        }
    }

    /// Number of selected entries
    #[must_use]
    pub fn selected_count(&self) -> usize {
        self.entries.iter().filter(|e| e.selected).count()
    }

    /// Number of selected entries already delivered
    #[must_use]
    pub fn selected_sent_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.selected && e.status.is_sent())
            .count()
    }

    /// Addresses a run would dispatch, in order
    #[must_use]
    pub fn eligible(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|e| e.is_eligible())
            .map(|e| e.address.clone())
            .collect()
    }

    /// Append a recipient
    ///
    /// # Errors
    ///
    /// Rejects syntactically invalid addresses and exact duplicates
    pub fn add(&mut self, address: impl Into<String>) -> Result<(), RosterError> {
        let address = address.into();
        if !is_valid_address(&address) {
            return Err(RosterError::InvalidAddress(address));
        }
        if self.contains(&address) {
            return Err(RosterError::DuplicateAddress(address));
        }
        self.entries.push(RecipientEntry::new(address));
        self.bump();
        Ok(())
    }

    /// Remove a recipient
    ///
    /// # Errors
    ///
    /// Returns [`RosterError::UnknownRecipient`] if absent
    pub fn remove(&mut self, address: &str) -> Result<RecipientEntry, RosterError> {
        let index = self.index_of(address)?;
        let removed = self.entries.remove(index);
        self.bump();
        Ok(removed)
    }

    /// Flip one entry's selection and return the new value
    ///
    /// # Errors
    ///
    /// Returns [`RosterError::UnknownRecipient`] if absent
    pub fn toggle_selection(&mut self, address: &str) -> Result<bool, RosterError> {
        let index = self.index_of(address)?;
        let entry = &mut self.entries[index];
        entry.selected = !entry.selected;
        let selected = entry.selected;
        self.bump();
        Ok(selected)
    }

    /// Set every entry's selection
    pub fn set_all_selected(&mut self, selected: bool) {
        for entry in &mut self.entries {
            entry.selected = selected;
        }
        self.bump();
    }

    /// Select all, or deselect all if everything is already selected
    ///
    /// Returns the new selection value.
    pub fn toggle_all(&mut self) -> bool {
        let all_selected = self.entries.iter().all(|e| e.selected);
        self.set_all_selected(!all_selected);
        !all_selected
    }

    /// Change one entry's status
    ///
    /// # Errors
    ///
    /// - [`RosterError::UnknownRecipient`] if absent
    /// - [`RosterError::InvalidTransition`] if the change is not allowed
    pub fn update_status(
        &mut self,
        address: &str,
        status: RecipientStatus,
    ) -> Result<(), RosterError> {
        let index = self.index_of(address)?;
        let entry = &mut self.entries[index];
        if !entry.status.can_become(&status) {
            return Err(RosterError::InvalidTransition {
                address: address.to_string(),
                from: entry.status.name(),
                to: status.name(),
            });
        }
        entry.status = status;
        self.bump();
        Ok(())
    }

    fn index_of(&self, address: &str) -> Result<usize, RosterError> {
        self.entries
            .iter()
            .position(|e| e.address == address)
            .ok_or_else(|| RosterError::UnknownRecipient(address.to_string()))
    }

    fn bump(&mut self) {
        self.version += 1;
    }
}
