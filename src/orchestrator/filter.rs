// Identity predicates deciding which resolved devices are operated on

use crate::config::FilterCriteria;
use crate::transport::{DeviceHandle, DeviceIdentity};
use crate::Protocol;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NotSeagate,
    ModelMismatch,
    FirmwareMismatch,
    ChildModelMismatch,
    ChildFirmwareMismatch,
    UnknownInterface,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            SkipReason::NotSeagate => "not a Seagate family drive",
            SkipReason::ModelMismatch => "model does not match",
            SkipReason::FirmwareMismatch => "firmware does not match",
            SkipReason::ChildModelMismatch => "child drive model does not match",
            SkipReason::ChildFirmwareMismatch => "child drive firmware does not match",
            SkipReason::UnknownInterface => "unknown interface",
        };
        f.write_str(reason)
    }
}

const SEAGATE_FAMILY_NAMES: [&str; 3] = ["Seagate", "Maxtor", "LaCie"];

/// Seagate and the brands it owns
pub fn is_seagate_family(identity: &DeviceIdentity) -> bool {
    identity.vendor.trim().eq_ignore_ascii_case("SEAGATE")
        || identity.model.starts_with("ST")
        || SEAGATE_FAMILY_NAMES
            .iter()
            .any(|name| identity.model.contains(name))
}

/// Run the predicates in order and return the first one that rejects the device
pub fn evaluate(criteria: &FilterCriteria, device: &DeviceHandle) -> Option<SkipReason> {
    let identity = &device.identity;

    if criteria.seagate_only && !is_seagate_family(identity) {
        return Some(SkipReason::NotSeagate);
    }
    if let Some(model) = &criteria.model {
        if !identity.model.contains(model.as_str()) {
            return Some(SkipReason::ModelMismatch);
        }
    }
    if let Some(firmware) = &criteria.firmware {
        if identity.firmware != *firmware {
            return Some(SkipReason::FirmwareMismatch);
        }
    }
    if let Some(child_model) = &criteria.child_model {
        if identity.child_model.is_empty() || !identity.child_model.contains(child_model.as_str())
        {
            return Some(SkipReason::ChildModelMismatch);
        }
    }
    if let Some(child_firmware) = &criteria.child_firmware {
        if identity.child_firmware.is_empty() || identity.child_firmware != *child_firmware {
            return Some(SkipReason::ChildFirmwareMismatch);
        }
    }
    if device.effective_protocol() == Protocol::Unknown {
        return Some(SkipReason::UnknownInterface);
    }

    None
}
