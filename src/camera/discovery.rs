//! Camera discovery through the NVR management API.
//!
//! `GET /ISAPI/ContentMgmt/InputProxy/channels` answers with an
//! `InputProxyChannelList` document. Every failure at this boundary is logged
//! and turned into an empty (or partial) camera list; discovery never aborts
//! the process.

use serde::Deserialize;

use super::{api_url, channel_list_url, redact, CameraHandle};
use crate::config::NvrSettings;
use crate::error::{Error, Result};

const CHANNEL_LIST_ROOT: &str = "InputProxyChannelList";

#[derive(Debug, Deserialize, Default)]
struct ChannelList {
    #[serde(rename = "InputProxyChannel", default)]
    channels: Vec<ChannelEntry>,
}

#[derive(Debug, Deserialize)]
struct ChannelEntry {
    id: String,
    name: Option<String>,
    #[serde(rename = "sourceInputPortDescriptor")]
    source: Option<SourceDescriptor>,
}

#[derive(Debug, Deserialize)]
struct SourceDescriptor {
    #[serde(rename = "ipAddress")]
    ip_address: Option<String>,
}

pub(crate) fn http_agent(nvr: &NvrSettings) -> ureq::Agent {
    ureq::AgentBuilder::new().timeout(nvr.request_timeout).build()
}

/// List every channel the NVR knows about, online or not.
pub fn get_cameras(nvr: &NvrSettings) -> Vec<CameraHandle> {
    match try_get_cameras(nvr) {
        Ok(cameras) => cameras,
        Err(err) => {
            log::error!("{}", err);
            Vec::new()
        }
    }
}

fn try_get_cameras(nvr: &NvrSettings) -> Result<Vec<CameraHandle>> {
    let url = channel_list_url(nvr);
    let response = http_agent(nvr).get(&url).call().map_err(|e| {
        Error::Discovery(format!("GET {} failed: {}", redact(&url), describe(&e)))
    })?;
    let body = response
        .into_string()
        .map_err(|e| Error::Discovery(format!("read channel list body: {}", e)))?;
    parse_channel_list(&body, nvr)
}

/// Parse an `InputProxyChannelList` document into camera handles.
///
/// Entries whose id is not an integer are skipped with a warning, so a
/// partly damaged document still yields the usable cameras.
pub fn parse_channel_list(xml: &str, nvr: &NvrSettings) -> Result<Vec<CameraHandle>> {
    if !xml.contains(CHANNEL_LIST_ROOT) {
        return Err(Error::Discovery(format!(
            "response is not an {} document",
            CHANNEL_LIST_ROOT
        )));
    }
    let list: ChannelList = quick_xml::de::from_str(xml)
        .map_err(|e| Error::Discovery(format!("malformed channel list: {}", e)))?;

    let mut cameras = Vec::with_capacity(list.channels.len());
    for entry in list.channels {
        let Ok(id) = entry.id.trim().parse::<u32>() else {
            log::warn!("skipping channel with non-numeric id '{}'", entry.id);
            continue;
        };
        let name = entry
            .name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| format!("Camera {}", id));
        if let Some(ip) = entry.source.and_then(|source| source.ip_address) {
            log::debug!("discovered channel {} ({}) proxied from {}", id, name, ip);
        }
        cameras.push(CameraHandle::for_channel(nvr, id, name));
    }
    Ok(cameras)
}

/// True when the channel status endpoint answers 200.
pub fn is_online(nvr: &NvrSettings, id: u32) -> bool {
    let url = api_url(nvr, id);
    match http_agent(nvr).get(&url).call() {
        Ok(response) => response.status() == 200,
        Err(err) => {
            log::error!("camera {} status check failed: {}", id, describe(&err));
            false
        }
    }
}

/// Discovered cameras that are currently reachable.
pub fn available_cameras(nvr: &NvrSettings) -> Vec<CameraHandle> {
    get_cameras(nvr)
        .into_iter()
        .filter(|camera| is_online(nvr, camera.id))
        .collect()
}

pub fn find_by_id(nvr: &NvrSettings, id: u32) -> Option<CameraHandle> {
    select_by_id(get_cameras(nvr), id)
}

pub fn find_by_name(nvr: &NvrSettings, name: &str) -> Option<CameraHandle> {
    select_by_name(get_cameras(nvr), name)
}

/// First camera with channel `id`.
pub fn select_by_id(cameras: Vec<CameraHandle>, id: u32) -> Option<CameraHandle> {
    cameras.into_iter().find(|camera| camera.id == id)
}

/// First camera whose name matches exactly.
pub fn select_by_name(cameras: Vec<CameraHandle>, name: &str) -> Option<CameraHandle> {
    cameras.into_iter().find(|camera| camera.name == name)
}

/// Render a ureq error without echoing credential-bearing URLs.
pub(crate) fn describe(err: &ureq::Error) -> String {
    match err {
        ureq::Error::Status(code, _) => format!("HTTP status {}", code),
        ureq::Error::Transport(transport) => transport.kind().to_string(),
    }
}
