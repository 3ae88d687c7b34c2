// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Access condition decoding
//!
//! Each file and directory header carries four (condition, key level) pairs,
//! one per access group. Decoding is total: unrecognised conditions map to
//! [AccessRule::Unknown] so that unexpected card configurations never abort
//! discovery.

use core::fmt::Display;

/// Access always granted
pub const AC_ALWAYS: u8 = 0x1F;
/// Access never granted
pub const AC_NEVER: u8 = 0x00;
/// PIN presentation required
pub const AC_PIN: u8 = 0x01;
/// Secure session at the provided key level required
pub const AC_SESSION: u8 = 0x10;
/// Confidential session at the provided key level required
pub const AC_CONFIDENTIAL: u8 = 0x14;
/// Confidential session and PIN presentation required
pub const AC_CONFIDENTIAL_PIN: u8 = 0x15;

/// Symbolic access rule
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum AccessRule {
    Always,
    Never,
    PinRequired,
    SessionAtLevel(u8),
    ConfidentialAtLevel(u8),
    ConfidentialAndPinAtLevel(u8),
    Unknown,
}

impl AccessRule {
    /// Decode a rule from a raw access condition and key level
    pub fn decode(condition: u8, key_level: u8) -> Self {
        match condition {
            AC_ALWAYS => AccessRule::Always,
            AC_NEVER => AccessRule::Never,
            AC_PIN => AccessRule::PinRequired,
            AC_SESSION => AccessRule::SessionAtLevel(key_level),
            AC_CONFIDENTIAL => AccessRule::ConfidentialAtLevel(key_level),
            AC_CONFIDENTIAL_PIN => AccessRule::ConfidentialAndPinAtLevel(key_level),
            _ => AccessRule::Unknown,
        }
    }

    /// Check whether the rule uses the key level
    pub fn has_key_level(&self) -> bool {
        matches!(
            self,
            AccessRule::SessionAtLevel(_)
                | AccessRule::ConfidentialAtLevel(_)
                | AccessRule::ConfidentialAndPinAtLevel(_)
        )
    }

    /// Check whether reading under this rule needs a PIN or confidential session
    pub fn is_protected(&self) -> bool {
        matches!(
            self,
            AccessRule::PinRequired
                | AccessRule::ConfidentialAtLevel(_)
                | AccessRule::ConfidentialAndPinAtLevel(_)
        )
    }

    /// Short name, as used in report tables
    pub fn short_name(&self) -> String {
        match self {
            AccessRule::Always => "AA".to_string(),
            AccessRule::Never => "NN".to_string(),
            AccessRule::PinRequired => "PN".to_string(),
            AccessRule::SessionAtLevel(l) => format!("S{l}"),
            AccessRule::ConfidentialAtLevel(l) => format!("C{l}"),
            AccessRule::ConfidentialAndPinAtLevel(l) => format!("P{l}"),
            AccessRule::Unknown => "--".to_string(),
        }
    }

    /// Long name, as used in document descriptions
    pub fn long_name(&self) -> String {
        match self {
            AccessRule::Always => "Always".to_string(),
            AccessRule::Never => "Never".to_string(),
            AccessRule::PinRequired => "PIN".to_string(),
            AccessRule::SessionAtLevel(l) => format!("Session{l}"),
            AccessRule::ConfidentialAtLevel(l) => format!("Confidential{l}"),
            AccessRule::ConfidentialAndPinAtLevel(l) => format!("Confidential&PIN{l}"),
            AccessRule::Unknown => "--".to_string(),
        }
    }
}

impl Display for AccessRule {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.short_name())
    }
}

/// Raw access condition for a single group
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub struct AccessCondition {
    pub condition: u8,
    pub key_level: u8,
}

impl AccessCondition {
    pub fn new(condition: u8, key_level: u8) -> Self {
        Self {
            condition,
            key_level,
        }
    }

    /// Decode the symbolic rule for this condition
    pub fn rule(&self) -> AccessRule {
        AccessRule::decode(self.condition, self.key_level)
    }
}

/// Access conditions for the four access groups of a file or directory
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub struct AccessRuleSet(pub [AccessCondition; 4]);

impl AccessRuleSet {
    /// Build a rule set from raw header access conditions and key levels
    pub fn new(conditions: [u8; 4], key_levels: [u8; 4]) -> Self {
        let mut groups = [AccessCondition::default(); 4];
        for (i, g) in groups.iter_mut().enumerate() {
            *g = AccessCondition::new(conditions[i], key_levels[i]);
        }
        Self(groups)
    }

    /// Fetch the access condition for a group (0..=3)
    pub fn group(&self, index: usize) -> &AccessCondition {
        &self.0[index]
    }

    /// Iterate over decoded rules in group order
    pub fn rules(&self) -> impl Iterator<Item = AccessRule> + '_ {
        self.0.iter().map(|g| g.rule())
    }
}
