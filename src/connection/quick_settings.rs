//! Quick-settings panel state derived from the service settings.

use crate::catalog::Tier;
use crate::service::{KillSwitch, NetShield, ServiceSettings};

/// Icon state for one quick-settings toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indicator {
    Off,
    On,
    /// Strongest setting, e.g. permanent kill switch
    Strong,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuickSettingsState {
    pub secure_core: bool,
    pub netshield: NetShield,
    pub killswitch: KillSwitch,
    /// Free accounts see the premium toggles locked
    pub locked: bool,
}

impl QuickSettingsState {
    pub fn from_settings(settings: &ServiceSettings) -> Self {
        Self {
            secure_core: settings.secure_core,
            netshield: settings.netshield,
            killswitch: settings.killswitch,
            locked: settings.tier == Tier::Free,
        }
    }

    pub fn secure_core_indicator(&self) -> Indicator {
        if self.secure_core {
            Indicator::On
        } else {
            Indicator::Off
        }
    }

    pub fn netshield_indicator(&self) -> Indicator {
        match self.netshield {
            NetShield::Off => Indicator::Off,
            NetShield::Malware => Indicator::On,
            NetShield::AdsAndMalware => Indicator::Strong,
        }
    }

    pub fn killswitch_indicator(&self) -> Indicator {
        match self.killswitch {
            KillSwitch::Off => Indicator::Off,
            KillSwitch::On => Indicator::On,
            KillSwitch::Permanent => Indicator::Strong,
        }
    }
}
