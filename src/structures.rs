//! Device identity structures
//!
//! This module contains the identity record exchanged between the device,
//! the QCN codec and the session, plus the slot naming used in error reports.

use crate::constants::{NV_ITEM_IMEI, NV_ITEM_IMEI_2};
use crate::validator;

/// Which of the two identity numbers an operation concerns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentitySlot {
    /// First identity, always present
    Primary,
    /// Second identity on dual-identity devices
    Secondary,
}

impl IdentitySlot {
    /// NV item holding this identity
    pub fn nv_item(self) -> u16 {
        match self {
            IdentitySlot::Primary => NV_ITEM_IMEI,
            IdentitySlot::Secondary => NV_ITEM_IMEI_2,
        }
    }

    /// Slot stored under an NV item, if any
    pub fn from_nv_item(item: u16) -> Option<Self> {
        match item {
            NV_ITEM_IMEI => Some(IdentitySlot::Primary),
            NV_ITEM_IMEI_2 => Some(IdentitySlot::Secondary),
            _ => None,
        }
    }
}

impl std::fmt::Display for IdentitySlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IdentitySlot::Primary => write!(f, "primary"),
            IdentitySlot::Secondary => write!(f, "secondary"),
        }
    }
}

/// Identity numbers of one device
///
/// Built fresh for every read, write or edit. Identity numbers are always in
/// their canonical 15-digit string form here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceIdentityRecord {
    /// Primary identity number
    pub primary: String,
    /// Secondary identity number, if the source carried one
    pub secondary: Option<String>,
    /// Whether the secondary identity is in use
    pub is_dual: bool,
    /// Free-form model description
    pub model_hint: String,
}

impl DeviceIdentityRecord {
    /// Record for a single-identity device
    pub fn single(primary: impl Into<String>) -> Self {
        Self {
            primary: primary.into(),
            ..Default::default()
        }
    }

    /// Record for a dual-identity device
    pub fn dual(primary: impl Into<String>, secondary: impl Into<String>) -> Self {
        Self {
            primary: primary.into(),
            secondary: Some(secondary.into()),
            is_dual: true,
            model_hint: String::new(),
        }
    }

    /// Set the model description
    pub fn with_model_hint(mut self, model_hint: impl Into<String>) -> Self {
        self.model_hint = model_hint.into();
        self
    }

    /// Identity stored in a slot
    pub fn identity(&self, slot: IdentitySlot) -> Option<&str> {
        match slot {
            IdentitySlot::Primary => Some(&self.primary),
            IdentitySlot::Secondary => self.secondary.as_deref(),
        }
    }

    /// Identities that get written out: the primary, then the secondary if dual
    pub fn active_identities(&self) -> Vec<(IdentitySlot, &str)> {
        let mut identities = vec![(IdentitySlot::Primary, self.primary.as_str())];
        if self.is_dual {
            if let Some(secondary) = self.secondary.as_deref() {
                identities.push((IdentitySlot::Secondary, secondary));
            }
        }
        identities
    }

    /// Slots whose identity fails the plausibility check
    pub fn implausible_slots(&self) -> Vec<IdentitySlot> {
        self.active_identities()
            .into_iter()
            .filter(|(_, id)| !validator::is_plausible(id))
            .map(|(slot, _)| slot)
            .collect()
    }

    /// Check if every active identity is plausible
    pub fn is_plausible(&self) -> bool {
        self.implausible_slots().is_empty()
    }

    /// Human-readable device type
    pub fn kind(&self) -> &'static str {
        if self.is_dual {
            "Dual identity"
        } else {
            "Single identity"
        }
    }
}

impl std::fmt::Display for DeviceIdentityRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if !self.model_hint.is_empty() {
            writeln!(f, "Model: {}", self.model_hint)?;
        }
        write!(
            f,
            "Identity 1: {}\nIdentity 2: {}\nType: {}",
            self.primary,
            self.secondary.as_deref().unwrap_or("-"),
            self.kind()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_nv_items() {
        assert_eq!(IdentitySlot::Primary.nv_item(), 550);
        assert_eq!(IdentitySlot::Secondary.nv_item(), 551);
        assert_eq!(IdentitySlot::from_nv_item(551), Some(IdentitySlot::Secondary));
        assert_eq!(IdentitySlot::from_nv_item(1943), None);
    }

    #[test]
    fn test_single_record() {
        let record = DeviceIdentityRecord::single("490154203237518");
        assert!(!record.is_dual);
        assert_eq!(record.identity(IdentitySlot::Secondary), None);
        assert_eq!(
            record.active_identities(),
            vec![(IdentitySlot::Primary, "490154203237518")]
        );
        assert!(record.is_plausible());
    }

    #[test]
    fn test_dual_record() {
        let record = DeviceIdentityRecord::dual("490154203237518", "356789012345678");
        assert!(record.is_dual);
        assert_eq!(record.active_identities().len(), 2);
        assert_eq!(record.implausible_slots(), vec![IdentitySlot::Secondary]);
        assert!(!record.is_plausible());
    }

    #[test]
    fn test_inactive_secondary_is_skipped() {
        let mut record = DeviceIdentityRecord::dual("490154203237518", "356789012345672");
        record.is_dual = false;
        assert_eq!(record.active_identities().len(), 1);
    }

    #[test]
    fn test_display() {
        let record =
            DeviceIdentityRecord::single("490154203237518").with_model_hint("Qualcomm Device");
        let text = record.to_string();
        assert!(text.starts_with("Model: Qualcomm Device\n"));
        assert!(text.contains("Identity 1: 490154203237518"));
        assert!(text.contains("Identity 2: -"));
        assert!(text.ends_with("Type: Single identity"));
    }
}
