//! The parameter registry.
//!
//! Holds the reader's named configuration under the `/reader/` namespace.
//! Lookup keys are lowercased; the original spelling is preserved for
//! listing. Each entry carries a declared type, the cached value, a
//! writable flag, a confirmed flag, and a [`ParamHook`] naming the
//! device-side behavior the reader attaches to get/set.
//!
//! The registry itself is pure bookkeeping: hooks are interpreted by
//! [`EapiReader`](crate::reader::EapiReader), which holds the registry
//! behind a short-critical-section mutex and runs all device I/O outside
//! it. Unconfirmed entries are capability-dependent; their first get
//! probes the device, and a failed probe removes the entry permanently.

use std::collections::HashMap;

use rfidlib_core::params::{ParamType, ParamValue};

/// Device-side behavior attached to a parameter.
///
/// A closed set interpreted by the reader: pure validation hooks coerce
/// or reject on set, device hooks issue commands on get and/or set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ParamHook {
    /// Cached value only; no validation, no device traffic.
    None,
    /// Duty-cycle times: integer in [0, 65535].
    AsyncTime,
    /// Transport timeout: integer in [0, 65535], mirrored to the link.
    TransportTimeout,
    /// Command timeout: integer in [0, 65535].
    CommandTimeout,
    /// Regulatory region: SET_REGION on set, cached on get.
    RegionId,
    /// Antenna port list: GET_ANTENNA_PORT on every get.
    PortList,
    /// Device serial number: GET_HARDWARE_VERSION probe.
    SerialNumber,
    /// Read TX power: GET/SET_READ_TX_POWER.
    ReadPower,
    /// Serial baud rate: SET_BAUD_RATE plus a transport rate switch.
    BaudRate,
    /// Tag-op antenna: integer in [1, 16].
    TagopAntenna,
    /// The construction URI, recomputed on get.
    Uri,
}

impl ParamHook {
    /// Whether the parameter is usable before `connect`.
    pub(crate) fn preconnect(&self) -> bool {
        matches!(
            self,
            ParamHook::None
                | ParamHook::AsyncTime
                | ParamHook::TransportTimeout
                | ParamHook::CommandTimeout
                | ParamHook::Uri
        )
    }
}

/// One registry entry.
#[derive(Debug, Clone)]
pub(crate) struct Setting {
    /// Canonical-case name, as listed.
    pub original_name: String,
    /// Declared value type.
    pub ptype: ParamType,
    /// Cached value.
    pub value: ParamValue,
    /// Whether `param_set` is allowed.
    pub writable: bool,
    /// Whether the entry has survived (or never needed) a capability
    /// probe.
    pub confirmed: bool,
    /// Device-side behavior.
    pub hook: ParamHook,
}

/// The registry proper: a case-insensitive map of settings.
#[derive(Debug, Default)]
pub(crate) struct ParamRegistry {
    map: HashMap<String, Setting>,
}

impl ParamRegistry {
    pub(crate) fn new() -> Self {
        ParamRegistry::default()
    }

    /// Install a confirmed parameter.
    pub(crate) fn add(
        &mut self,
        name: &str,
        default: ParamValue,
        writable: bool,
        hook: ParamHook,
    ) {
        self.insert(name, default, writable, hook, true);
    }

    /// Install a capability-dependent parameter; it stays invisible to
    /// listing until its first successful probe.
    pub(crate) fn add_unconfirmed(
        &mut self,
        name: &str,
        default: ParamValue,
        writable: bool,
        hook: ParamHook,
    ) {
        self.insert(name, default, writable, hook, false);
    }

    fn insert(
        &mut self,
        name: &str,
        default: ParamValue,
        writable: bool,
        hook: ParamHook,
        confirmed: bool,
    ) {
        let setting = Setting {
            original_name: name.to_string(),
            ptype: default.param_type(),
            value: default,
            writable,
            confirmed,
            hook,
        };
        self.map.insert(name.to_lowercase(), setting);
    }

    /// Look up a setting, returning its lowercased key and a snapshot.
    pub(crate) fn lookup(&self, name: &str) -> Option<(String, Setting)> {
        let key = name.to_lowercase();
        self.map.get(&key).map(|s| (key, s.clone()))
    }

    /// Replace the cached value of an existing entry.
    pub(crate) fn set_value(&mut self, key: &str, value: ParamValue) {
        if let Some(setting) = self.map.get_mut(key) {
            setting.value = value;
        }
    }

    /// Mark an entry confirmed and cache its probed value.
    pub(crate) fn confirm(&mut self, key: &str, value: ParamValue) {
        if let Some(setting) = self.map.get_mut(key) {
            setting.confirmed = true;
            setting.value = value;
        }
    }

    /// Remove an entry. Removal is permanent for the handle's lifetime;
    /// nothing re-adds a failed capability.
    pub(crate) fn remove(&mut self, key: &str) {
        self.map.remove(key);
    }

    /// All keys, sorted, for stable listing and probing order.
    pub(crate) fn keys_sorted(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.map.keys().cloned().collect();
        keys.sort();
        keys
    }
}
