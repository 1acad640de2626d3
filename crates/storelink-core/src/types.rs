//! Strong type definitions for store identity and context addressing.
//!
//! All identifiers are newtypes or closed enums so that a store name can
//! never be confused with a context, and vice versa.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;

/// Identity of a store.
///
/// The set is closed: every store an application owns is named here, and
/// the name is unique within its owning context. It is the routing key for
/// every message and the key of every proxy cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum StoreName {
    /// Which visualizations are enabled on the inspected page.
    Visualization = 0x0001,
    /// The inspected tab (url, title, whether it is closed).
    Tab = 0x0002,
    /// Whether the developer tools panel is open for the tab.
    DevTools = 0x0003,
    /// Keyboard command bindings.
    Command = 0x0004,
    /// Feature flag overrides.
    FeatureFlag = 0x0005,
    /// Launch panel preferences.
    LaunchPanel = 0x0006,
    /// Assessment progress.
    Assessment = 0x0007,
    /// Element inspection target.
    Inspect = 0x0008,
    /// User configuration (telemetry, high contrast, ...).
    UserConfiguration = 0x0009,
    /// Results of the unified automated scan.
    UnifiedScanResult = 0x000A,
    /// Which result cards are selected or expanded.
    CardSelection = 0x000B,
    /// Granted host permissions.
    Permissions = 0x000C,
}

impl StoreName {
    /// Every known store, in code order.
    pub const ALL: [StoreName; 12] = [
        Self::Visualization,
        Self::Tab,
        Self::DevTools,
        Self::Command,
        Self::FeatureFlag,
        Self::LaunchPanel,
        Self::Assessment,
        Self::Inspect,
        Self::UserConfiguration,
        Self::UnifiedScanResult,
        Self::CardSelection,
        Self::Permissions,
    ];

    /// Convert to u16 for compact encoding.
    pub fn to_u16(self) -> u16 {
        self as u16
    }

    /// Try to parse from u16.
    pub fn from_u16(value: u16) -> Option<Self> {
        Self::ALL.iter().copied().find(|name| name.to_u16() == value)
    }

    /// Human-readable name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Visualization => "VisualizationStore",
            Self::Tab => "TabStore",
            Self::DevTools => "DevToolsStore",
            Self::Command => "CommandStore",
            Self::FeatureFlag => "FeatureFlagStore",
            Self::LaunchPanel => "LaunchPanelStore",
            Self::Assessment => "AssessmentStore",
            Self::Inspect => "InspectStore",
            Self::UserConfiguration => "UserConfigurationStore",
            Self::UnifiedScanResult => "UnifiedScanResultStore",
            Self::CardSelection => "CardSelectionStore",
            Self::Permissions => "PermissionsStore",
        }
    }
}

impl fmt::Display for StoreName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<u16> for StoreName {
    type Error = CoreError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::from_u16(value).ok_or(CoreError::UnknownStoreCode(value))
    }
}

/// Unique identifier for an isolated execution context.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContextId(pub [u8; 16]);

impl ContextId {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Generate a random context ID.
    pub fn random() -> Self {
        use rand::Rng;
        Self(rand::thread_rng().gen())
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, CoreError> {
        let bytes = hex::decode(s).map_err(|e| CoreError::InvalidContextId(e.to_string()))?;
        let arr: [u8; 16] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| CoreError::InvalidContextId(format!("expected 16 bytes, got {}", bytes.len())))?;
        Ok(Self(arr))
    }
}

impl fmt::Debug for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContextId({})", &self.to_hex()[..8])
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..8])
    }
}

/// The kind of context a [`ContextId`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContextRole {
    /// The long-lived context that owns the authoritative stores.
    Background,
    /// A developer tools page.
    DevTools,
    /// A details or side panel.
    Panel,
    /// A popup launched from the toolbar.
    Popup,
    /// A script injected into a page frame.
    ContentScript,
}

impl fmt::Display for ContextRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Background => "background",
            Self::DevTools => "devtools",
            Self::Panel => "panel",
            Self::Popup => "popup",
            Self::ContentScript => "content-script",
        };
        f.write_str(s)
    }
}

/// Which contexts a message is addressed to.
///
/// The sender is never a destination of its own message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DestinationSelector {
    /// Exactly one context.
    Context(ContextId),
    /// An explicit set of contexts.
    Contexts(Vec<ContextId>),
    /// Every connected context with the given role.
    Role(ContextRole),
    /// Every connected context.
    All,
}

impl DestinationSelector {
    /// Shorthand for "background only".
    pub const fn background() -> Self {
        Self::Role(ContextRole::Background)
    }

    /// Check whether a context is selected, given who is sending.
    pub fn selects(&self, sender: &ContextId, candidate: &ContextId, role: ContextRole) -> bool {
        if sender == candidate {
            return false;
        }
        match self {
            Self::Context(id) => id == candidate,
            Self::Contexts(ids) => ids.contains(candidate),
            Self::Role(wanted) => *wanted == role,
            Self::All => true,
        }
    }

    /// Contexts that this selector names explicitly.
    ///
    /// Role and broadcast selectors name nothing explicitly; they resolve
    /// against whoever is connected at send time.
    pub fn explicit_targets(&self) -> &[ContextId] {
        match self {
            Self::Context(id) => std::slice::from_ref(id),
            Self::Contexts(ids) => ids,
            Self::Role(_) | Self::All => &[],
        }
    }
}

impl fmt::Display for DestinationSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Context(id) => write!(f, "context:{}", id),
            Self::Contexts(ids) => write!(f, "contexts:{}", ids.len()),
            Self::Role(role) => write!(f, "role:{}", role),
            Self::All => f.write_str("all"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_name_u16_roundtrip() {
        for name in StoreName::ALL {
            assert_eq!(StoreName::from_u16(name.to_u16()), Some(name));
        }
        assert_eq!(StoreName::from_u16(0xFFFF), None);
        assert!(matches!(
            StoreName::try_from(0x0100),
            Err(CoreError::UnknownStoreCode(0x0100))
        ));
    }

    #[test]
    fn test_store_names_unique() {
        let mut codes: Vec<u16> = StoreName::ALL.iter().map(|n| n.to_u16()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), StoreName::ALL.len());
    }

    #[test]
    fn test_context_id_hex_roundtrip() {
        let id = ContextId::from_bytes([0x42; 16]);
        let recovered = ContextId::from_hex(&id.to_hex()).unwrap();
        assert_eq!(id, recovered);
        assert!(ContextId::from_hex("abcd").is_err());
    }

    #[test]
    fn test_context_id_display() {
        let id = ContextId::from_bytes([0xab; 16]);
        assert_eq!(format!("{}", id), "abababab");
        assert!(format!("{:?}", id).starts_with("ContextId("));
    }

    #[test]
    fn test_selector_never_selects_sender() {
        let sender = ContextId::from_bytes([1; 16]);
        assert!(!DestinationSelector::All.selects(&sender, &sender, ContextRole::Panel));
        assert!(!DestinationSelector::Context(sender).selects(&sender, &sender, ContextRole::Panel));
    }

    #[test]
    fn test_selector_role() {
        let sender = ContextId::from_bytes([1; 16]);
        let other = ContextId::from_bytes([2; 16]);
        let selector = DestinationSelector::background();
        assert!(selector.selects(&sender, &other, ContextRole::Background));
        assert!(!selector.selects(&sender, &other, ContextRole::Popup));
        assert!(selector.explicit_targets().is_empty());
    }

    #[test]
    fn test_selector_explicit_targets() {
        let a = ContextId::from_bytes([1; 16]);
        let b = ContextId::from_bytes([2; 16]);
        let selector = DestinationSelector::Contexts(vec![a, b]);
        assert_eq!(selector.explicit_targets(), &[a, b]);
        assert_eq!(DestinationSelector::Context(a).explicit_targets(), &[a]);
    }
}
