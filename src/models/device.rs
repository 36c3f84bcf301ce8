//! Device record and working set
//!
//! A `Device` is keyed by IP. Its mutable fields live behind a per-record
//! lock so the orchestrator and a later retry pass can touch the same record
//! without locking unrelated devices.

use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use super::stream::{AuthMethod, Credential, DiscoveryMethod, StreamDescriptor};

/// Mutable device fields
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceState {
    /// ONVIF device service address
    pub service_address: Option<String>,
    pub mac: Option<String>,
    pub vendor: Option<String>,
    pub model: Option<String>,
    pub serial: Option<String>,
    pub firmware: Option<String>,
    pub name: Option<String>,
    pub credential: Option<Credential>,
    pub auth_failed: bool,
    pub error: Option<String>,
    /// Host clock minus device clock (ms)
    pub clock_offset_ms: Option<i64>,
    pub auth_method: Option<AuthMethod>,
    /// Open RTSP-family ports
    pub open_ports: BTreeSet<u16>,
    pub main_stream: Option<StreamDescriptor>,
    pub sub_stream: Option<StreamDescriptor>,
    pub discovery_method: Option<DiscoveryMethod>,
    pub is_recorder: bool,
    pub channel_count: u32,
    pub parent_ip: Option<String>,
    pub channel: Option<u32>,
}

fn fill<T: Clone>(dst: &mut Option<T>, src: &Option<T>) {
    if dst.is_none() {
        dst.clone_from(src);
    }
}

impl DeviceState {
    /// Non-destructive merge: fields present on `other` fill gaps here,
    /// open-port sets are unioned.
    pub fn merge_missing(&mut self, other: &DeviceState) {
        fill(&mut self.service_address, &other.service_address);
        fill(&mut self.mac, &other.mac);
        fill(&mut self.vendor, &other.vendor);
        fill(&mut self.model, &other.model);
        fill(&mut self.serial, &other.serial);
        fill(&mut self.firmware, &other.firmware);
        fill(&mut self.name, &other.name);
        fill(&mut self.credential, &other.credential);
        fill(&mut self.error, &other.error);
        fill(&mut self.clock_offset_ms, &other.clock_offset_ms);
        fill(&mut self.auth_method, &other.auth_method);
        fill(&mut self.main_stream, &other.main_stream);
        fill(&mut self.sub_stream, &other.sub_stream);
        fill(&mut self.discovery_method, &other.discovery_method);
        fill(&mut self.parent_ip, &other.parent_ip);
        fill(&mut self.channel, &other.channel);
        self.open_ports.extend(other.open_ports.iter().copied());
        self.auth_failed |= other.auth_failed;
        self.is_recorder |= other.is_recorder;
        self.channel_count = self.channel_count.max(other.channel_count);
    }
}

/// A discovered camera or recorder (or one recorder channel)
#[derive(Debug)]
pub struct Device {
    ip: String,
    state: Mutex<DeviceState>,
}

impl Device {
    pub fn new(ip: impl Into<String>) -> Self {
        Self::with_state(ip, DeviceState::default())
    }

    pub fn with_state(ip: impl Into<String>, state: DeviceState) -> Self {
        Self {
            ip: ip.into(),
            state: Mutex::new(state),
        }
    }

    /// Identity key
    pub fn ip(&self) -> &str {
        &self.ip
    }

    /// Network address to connect to (channels resolve to their parent's)
    pub fn host(&self) -> String {
        self.state
            .lock()
            .parent_ip
            .clone()
            .unwrap_or_else(|| self.ip.clone())
    }

    pub fn snapshot(&self) -> DeviceState {
        self.state.lock().clone()
    }

    /// Run `f` with the record locked
    pub fn update<R>(&self, f: impl FnOnce(&mut DeviceState) -> R) -> R {
        f(&mut self.state.lock())
    }

    pub fn service_address(&self) -> Option<String> {
        self.state.lock().service_address.clone()
    }

    pub fn set_service_address(&self, addr: impl Into<String>) {
        self.state.lock().service_address = Some(addr.into());
    }

    pub fn vendor(&self) -> Option<String> {
        self.state.lock().vendor.clone()
    }

    pub fn model(&self) -> Option<String> {
        self.state.lock().model.clone()
    }

    pub fn mac(&self) -> Option<String> {
        self.state.lock().mac.clone()
    }

    pub fn name(&self) -> Option<String> {
        self.state.lock().name.clone()
    }

    pub fn credential(&self) -> Option<Credential> {
        self.state.lock().credential.clone()
    }

    /// Make `cred` the single live credential for this device
    pub fn assign_credential(&self, cred: &Credential) {
        let mut s = self.state.lock();
        s.credential = Some(cred.clone());
        s.error = None;
    }

    pub fn auth_failed(&self) -> bool {
        self.state.lock().auth_failed
    }

    pub fn mark_auth_failed(&self, msg: impl Into<String>) {
        let mut s = self.state.lock();
        s.auth_failed = true;
        s.error = Some(msg.into());
    }

    pub fn error(&self) -> Option<String> {
        self.state.lock().error.clone()
    }

    pub fn set_error(&self, msg: impl Into<String>) {
        self.state.lock().error = Some(msg.into());
    }

    pub fn open_ports(&self) -> Vec<u16> {
        self.state.lock().open_ports.iter().copied().collect()
    }

    pub fn add_open_port(&self, port: u16) {
        self.state.lock().open_ports.insert(port);
    }

    pub fn main_stream(&self) -> Option<StreamDescriptor> {
        self.state.lock().main_stream.clone()
    }

    pub fn sub_stream(&self) -> Option<StreamDescriptor> {
        self.state.lock().sub_stream.clone()
    }

    pub fn has_stream(&self) -> bool {
        let s = self.state.lock();
        s.main_stream.is_some() || s.sub_stream.is_some()
    }

    /// Record a successful discovery and clear any previous error
    pub fn set_streams(
        &self,
        main: StreamDescriptor,
        sub: Option<StreamDescriptor>,
        method: DiscoveryMethod,
    ) {
        let mut s = self.state.lock();
        s.main_stream = Some(main);
        s.sub_stream = sub;
        s.discovery_method = Some(method);
        s.error = None;
    }

    pub fn is_recorder(&self) -> bool {
        self.state.lock().is_recorder
    }

    pub fn mark_recorder(&self, channels: u32) {
        let mut s = self.state.lock();
        s.is_recorder = true;
        s.channel_count = channels;
    }

    /// Child record for recorder channel `channel` (identity `<ip>_ch<n>`)
    pub fn derive_channel(&self, channel: u32) -> Device {
        let parent = self.snapshot();
        let base_name = parent
            .name
            .clone()
            .or_else(|| parent.model.clone())
            .unwrap_or_else(|| format!("Camera_{}", self.ip));
        let state = DeviceState {
            service_address: None,
            mac: parent.mac,
            vendor: parent.vendor,
            model: parent.model,
            serial: None,
            firmware: parent.firmware,
            name: Some(format!("{} Channel {}", base_name, channel)),
            credential: parent.credential,
            auth_method: parent.auth_method,
            clock_offset_ms: parent.clock_offset_ms,
            open_ports: parent.open_ports,
            parent_ip: Some(self.host()),
            channel: Some(channel),
            ..DeviceState::default()
        };
        Device::with_state(format!("{}_ch{}", self.ip, channel), state)
    }

    /// Fill gaps on this record from `other` (same identity)
    pub fn merge_from(&self, other: &Device) {
        if std::ptr::eq(self, other) {
            return;
        }
        let theirs = other.snapshot();
        self.state.lock().merge_missing(&theirs);
    }
}

/// Ordered, IP-unique working set
#[derive(Debug, Default)]
pub struct DeviceSet {
    devices: Vec<Arc<Device>>,
    index: HashMap<String, usize>,
}

impl DeviceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert, or merge into the existing record with the same IP
    pub fn insert(&mut self, device: Device) -> Arc<Device> {
        self.insert_arc(Arc::new(device))
    }

    pub fn insert_arc(&mut self, device: Arc<Device>) -> Arc<Device> {
        if let Some(&i) = self.index.get(device.ip()) {
            let existing = self.devices[i].clone();
            existing.merge_from(&device);
            return existing;
        }
        self.index.insert(device.ip().to_string(), self.devices.len());
        self.devices.push(device.clone());
        device
    }

    pub fn extend(&mut self, devices: impl IntoIterator<Item = Device>) {
        for d in devices {
            self.insert(d);
        }
    }

    pub fn get(&self, ip: &str) -> Option<Arc<Device>> {
        self.index.get(ip).map(|&i| self.devices[i].clone())
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Device>> {
        self.devices.iter()
    }

    pub fn to_vec(&self) -> Vec<Arc<Device>> {
        self.devices.clone()
    }
}
