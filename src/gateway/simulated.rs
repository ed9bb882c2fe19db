//! Snapshot-backed gateway simulation.
//!
//! Serves devices and data from a JSON document shaped like the gateway's own
//! device listing, applies commands to that document the way the real gateway
//! would, and records every call. Faults can be injected per call kind so the
//! command paths can be exercised without hardware.

use super::{DeviceData, DeviceDescriptor, GatewayClient, RelayState, ScheduleState};
use crate::error::{BridgeError, Result};
use async_trait::async_trait;
use log::{debug, info};
use parking_lot::{Mutex, RwLock};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use strum::EnumDiscriminants;

/// A call made against the simulated gateway.
#[derive(Debug, Clone, PartialEq, EnumDiscriminants)]
#[strum_discriminants(name(CallKind), derive(Hash))]
pub enum GatewayCall {
    Update,
    SetTemperature {
        location: String,
        temperature: f64,
    },
    SetScheduleState {
        location: String,
        schedule: Option<String>,
        state: ScheduleState,
    },
    SetPreset {
        location: String,
        preset: String,
    },
    SetRelayState {
        dev_id: String,
        state: RelayState,
    },
}

#[derive(Debug, Clone, Deserialize)]
struct SnapshotDocument {
    #[serde(default)]
    gateway_id: Option<String>,
    #[serde(default)]
    heater_id: Option<String>,
    #[serde(default)]
    single_master_thermostat: Option<bool>,
    #[serde(default)]
    active_device_present: bool,
    devices: BTreeMap<String, SimulatedDevice>,
}

#[derive(Debug, Clone, Deserialize)]
struct SimulatedDevice {
    #[serde(flatten)]
    descriptor: DeviceDescriptor,
    #[serde(default)]
    data: DeviceData,
}

/// In-process [`GatewayClient`] backed by a JSON snapshot.
pub struct SimulatedGateway {
    document: RwLock<SnapshotDocument>,
    calls: Mutex<Vec<GatewayCall>>,
    recording: bool,
    faults: Mutex<HashSet<CallKind>>,
    offline: AtomicBool,
}

impl SimulatedGateway {
    /// Parse a snapshot document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let document: SnapshotDocument = serde_json::from_str(json)?;
        for (dev_id, device) in &document.devices {
            if device.descriptor.name.is_empty() {
                return Err(BridgeError::InvalidSnapshot(format!(
                    "device {dev_id} has no name"
                )));
            }
        }
        if let Some(heater) = &document.heater_id
            && !document.devices.contains_key(heater)
        {
            return Err(BridgeError::InvalidSnapshot(format!(
                "heater {heater} is not a listed device"
            )));
        }

        info!(
            "[Sim] Loaded gateway snapshot with {} device(s)",
            document.devices.len()
        );

        Ok(Self {
            document: RwLock::new(document),
            calls: Mutex::new(Vec::new()),
            recording: false,
            faults: Mutex::new(HashSet::new()),
            offline: AtomicBool::new(false),
        })
    }

    /// Load a snapshot document from disk.
    pub fn from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Keep a log of every call, readable through [`calls`](Self::calls).
    ///
    /// Off by default: the log is never drained.
    pub fn with_recording(mut self) -> Self {
        self.recording = true;
        self
    }

    /// Make every call of this kind fail with a communication fault.
    pub fn fail_on(&self, kind: CallKind) {
        self.faults.lock().insert(kind);
    }

    pub fn clear_faults(&self) {
        self.faults.lock().clear();
    }

    /// Make every call fail, as if the gateway dropped off the network.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Every call attempted so far, including failed ones. Empty unless
    /// recording is on.
    pub fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    /// Change a value in a device snapshot, as a poll would.
    pub fn set_device_value(&self, dev_id: &str, key: &str, value: Value) {
        if let Some(device) = self.document.write().devices.get_mut(dev_id) {
            device.data.insert(key, value);
        }
    }

    /// Drop a key from a device snapshot.
    pub fn remove_device_value(&self, dev_id: &str, key: &str) {
        if let Some(device) = self.document.write().devices.get_mut(dev_id) {
            device.data.remove(key);
        }
    }

    fn record(&self, call: GatewayCall) -> Result<()> {
        let kind = CallKind::from(&call);
        debug!("[Sim] {:?}", call);
        if self.recording {
            self.calls.lock().push(call);
        }

        if self.offline.load(Ordering::SeqCst) {
            return Err(BridgeError::Communication("gateway unreachable".to_string()));
        }
        if self.faults.lock().contains(&kind) {
            return Err(BridgeError::Communication(format!(
                "injected fault on {kind:?}"
            )));
        }
        Ok(())
    }

    /// Apply `f` to the data of every thermostat in a location.
    fn for_location(&self, location: &str, mut f: impl FnMut(&mut DeviceData)) {
        let mut document = self.document.write();
        for device in document.devices.values_mut() {
            if device.descriptor.is_thermostat()
                && device.descriptor.location.as_deref() == Some(location)
            {
                f(&mut device.data);
            }
        }
    }
}

#[async_trait]
impl GatewayClient for SimulatedGateway {
    async fn update(&self) -> Result<()> {
        self.record(GatewayCall::Update)
    }

    fn devices(&self) -> BTreeMap<String, DeviceDescriptor> {
        self.document
            .read()
            .devices
            .iter()
            .map(|(id, device)| (id.clone(), device.descriptor.clone()))
            .collect()
    }

    fn device_data(&self, dev_id: &str) -> DeviceData {
        self.document
            .read()
            .devices
            .get(dev_id)
            .map(|device| device.data.clone())
            .unwrap_or_default()
    }

    fn heater_id(&self) -> Option<String> {
        self.document.read().heater_id.clone()
    }

    fn gateway_id(&self) -> Option<String> {
        self.document.read().gateway_id.clone()
    }

    fn single_master_thermostat(&self) -> Option<bool> {
        self.document.read().single_master_thermostat
    }

    fn active_device_present(&self) -> bool {
        self.document.read().active_device_present
    }

    async fn set_temperature(&self, location: &str, temperature: f64) -> Result<()> {
        self.record(GatewayCall::SetTemperature {
            location: location.to_string(),
            temperature,
        })?;
        self.for_location(location, |data| data.insert("setpoint", temperature));
        Ok(())
    }

    async fn set_schedule_state(
        &self,
        location: &str,
        schedule: Option<&str>,
        state: ScheduleState,
    ) -> Result<()> {
        self.record(GatewayCall::SetScheduleState {
            location: location.to_string(),
            schedule: schedule.map(str::to_string),
            state,
        })?;
        self.for_location(location, |data| {
            if state.is_on() {
                data.insert("selected_schedule", schedule);
                if let Some(name) = schedule {
                    data.insert("last_used", name);
                }
            } else {
                data.insert("selected_schedule", Value::Null);
            }
        });
        Ok(())
    }

    async fn set_preset(&self, location: &str, preset: &str) -> Result<()> {
        self.record(GatewayCall::SetPreset {
            location: location.to_string(),
            preset: preset.to_string(),
        })?;
        self.for_location(location, |data| {
            let setpoint = data
                .presets()
                .and_then(|table| table.get(preset).and_then(|t| t.first().copied()));
            data.insert("active_preset", preset);
            if let Some(setpoint) = setpoint {
                data.insert("setpoint", setpoint);
            }
        });
        Ok(())
    }

    async fn set_relay_state(
        &self,
        dev_id: &str,
        members: Option<&[String]>,
        state: RelayState,
    ) -> Result<bool> {
        self.record(GatewayCall::SetRelayState {
            dev_id: dev_id.to_string(),
            state,
        })?;

        let mut document = self.document.write();
        let mut targets = vec![dev_id.to_string()];
        if let Some(members) = members {
            targets.extend(members.iter().cloned());
        }
        for target in targets {
            if let Some(device) = document.devices.get_mut(&target) {
                device.data.insert("relay", state.is_on());
            }
        }
        Ok(true)
    }
}
