// SPDX-License-Identifier: CEPL-1.0
use anyhow::Result;
use ash::vk;
use std::fmt::Write as _;
use std::{fs, path::Path, path::PathBuf};
use tracing::debug;

fn hex_bytes(b: &[u8]) -> String {
    let mut s = String::with_capacity(b.len() * 2);
    for x in b {
        let _ = write!(&mut s, "{:02x}", x);
    }
    s
}

/// Cache blobs are only valid for the exact device and driver that wrote
/// them, so all of that goes into the file name.
pub(crate) fn pipeline_cache_path(props: &vk::PhysicalDeviceProperties) -> PathBuf {
    let uuid = hex_bytes(&props.pipeline_cache_uuid);
    PathBuf::from(format!(
        "utopia_pipeline_cache_{:04x}_{:04x}_{:08x}_{}.bin",
        props.vendor_id, props.device_id, props.driver_version, uuid
    ))
}

pub(crate) unsafe fn create_or_load_pipeline_cache(
    device: &ash::Device,
    path: &Path,
) -> Result<vk::PipelineCache> {
    let data = fs::read(path).unwrap_or_default();
    if !data.is_empty() {
        debug!("seeding pipeline cache from {} ({} bytes)", path.display(), data.len());
    }
    let ci = vk::PipelineCacheCreateInfo::default().initial_data(&data);
    match device.create_pipeline_cache(&ci, None) {
        Ok(cache) => Ok(cache),
        // A stale or corrupt blob is not worth failing over; start empty.
        Err(e) if !data.is_empty() => {
            debug!("pipeline cache blob rejected ({e:?}); starting empty");
            Ok(device.create_pipeline_cache(&vk::PipelineCacheCreateInfo::default(), None)?)
        }
        Err(e) => Err(e.into()),
    }
}

pub(crate) unsafe fn save_pipeline_cache(
    device: &ash::Device,
    cache: vk::PipelineCache,
    path: &Path,
) -> Result<()> {
    // Some drivers refuse when the cache is empty or the device is lost.
    if let Ok(bytes) = device.get_pipeline_cache_data(cache) {
        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        fs::write(path, &bytes)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_path_encodes_device_identity() {
        let mut props = vk::PhysicalDeviceProperties::default();
        props.vendor_id = 0x10de;
        props.device_id = 0x2684;
        props.driver_version = 0x1234_5678;
        props.pipeline_cache_uuid = [0xab; vk::UUID_SIZE];

        let name = pipeline_cache_path(&props);
        let name = name.to_string_lossy();
        assert!(name.starts_with("utopia_pipeline_cache_10de_2684_12345678_abab"));
        assert!(name.ends_with(".bin"));
    }
}
