//! Recipient lists with duplicate suppression.

use crate::address::Mailbox;
use crate::error::Result;
use std::collections::HashSet;

/// Which list a recipient goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum RecipientKind {
    /// Primary recipient.
    To,
    /// Carbon copy.
    Cc,
    /// Blind carbon copy; never rendered into headers.
    Bcc,
}

/// To, Cc, Bcc and Reply-To lists.
///
/// An address may appear in at most one of To, Cc and Bcc, compared
/// case-insensitively. Reply-To is tracked separately.
#[derive(Debug, Clone, Default)]
pub struct RecipientSet {
    to: Vec<Mailbox>,
    cc: Vec<Mailbox>,
    bcc: Vec<Mailbox>,
    reply_to: Vec<Mailbox>,
    seen: HashSet<String>,
    seen_reply_to: HashSet<String>,
}

impl RecipientSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a mailbox to the `kind` list.
    ///
    /// Returns false, leaving the set unchanged, if the address is already in
    /// any of To, Cc or Bcc.
    pub fn add(&mut self, kind: RecipientKind, mailbox: Mailbox) -> bool {
        if !self.seen.insert(key(&mailbox)) {
            return false;
        }
        self.list_mut(kind).push(mailbox);
        true
    }

    /// Validates `address` and adds it to To.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid.
    pub fn add_to(&mut self, address: &str, name: Option<&str>) -> Result<bool> {
        Ok(self.add(RecipientKind::To, mailbox(address, name)?))
    }

    /// Validates `address` and adds it to Cc.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid.
    pub fn add_cc(&mut self, address: &str, name: Option<&str>) -> Result<bool> {
        Ok(self.add(RecipientKind::Cc, mailbox(address, name)?))
    }

    /// Validates `address` and adds it to Bcc.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid.
    pub fn add_bcc(&mut self, address: &str, name: Option<&str>) -> Result<bool> {
        Ok(self.add(RecipientKind::Bcc, mailbox(address, name)?))
    }

    /// Adds a Reply-To mailbox. Returns false if it is already there.
    pub fn add_reply_to(&mut self, mailbox: Mailbox) -> bool {
        if !self.seen_reply_to.insert(key(&mailbox)) {
            return false;
        }
        self.reply_to.push(mailbox);
        true
    }

    /// To recipients in insertion order.
    #[must_use]
    pub fn to(&self) -> &[Mailbox] {
        &self.to
    }

    /// Cc recipients in insertion order.
    #[must_use]
    pub fn cc(&self) -> &[Mailbox] {
        &self.cc
    }

    /// Bcc recipients in insertion order.
    #[must_use]
    pub fn bcc(&self) -> &[Mailbox] {
        &self.bcc
    }

    /// Reply-To mailboxes in insertion order.
    #[must_use]
    pub fn reply_to(&self) -> &[Mailbox] {
        &self.reply_to
    }

    /// Every envelope recipient: To, then Cc, then Bcc.
    pub fn all_recipients(&self) -> impl Iterator<Item = &Mailbox> {
        self.to.iter().chain(&self.cc).chain(&self.bcc)
    }

    /// Number of envelope recipients.
    #[must_use]
    pub fn len(&self) -> usize {
        self.to.len() + self.cc.len() + self.bcc.len()
    }

    /// Returns true if there is no envelope recipient.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every To recipient.
    pub fn clear_to(&mut self) {
        self.clear(RecipientKind::To);
    }

    /// Removes every Cc recipient.
    pub fn clear_cc(&mut self) {
        self.clear(RecipientKind::Cc);
    }

    /// Removes every Bcc recipient.
    pub fn clear_bcc(&mut self) {
        self.clear(RecipientKind::Bcc);
    }

    /// Removes every Reply-To mailbox.
    pub fn clear_reply_to(&mut self) {
        self.reply_to.clear();
        self.seen_reply_to.clear();
    }

    /// Removes everything, Reply-To included.
    pub fn clear_all(&mut self) {
        self.to.clear();
        self.cc.clear();
        self.bcc.clear();
        self.seen.clear();
        self.clear_reply_to();
    }

    fn clear(&mut self, kind: RecipientKind) {
        let removed = std::mem::take(self.list_mut(kind));
        for mailbox in &removed {
            self.seen.remove(&key(mailbox));
        }
    }

    fn list_mut(&mut self, kind: RecipientKind) -> &mut Vec<Mailbox> {
        match kind {
            RecipientKind::To => &mut self.to,
            RecipientKind::Cc => &mut self.cc,
            RecipientKind::Bcc => &mut self.bcc,
        }
    }
}

fn key(mailbox: &Mailbox) -> String {
    mailbox.address().to_lowercase()
}

fn mailbox(address: &str, name: Option<&str>) -> Result<Mailbox> {
    match name {
        Some(name) => Mailbox::with_name(address, name),
        None => Mailbox::new(address),
    }
}
