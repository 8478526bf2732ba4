// SPDX-License-Identifier: CEPL-1.0
use anyhow::{Context, Result};
use ash::khr::swapchain;
use ash::{vk, Entry, Instance};
use std::ffi::{c_char, CString};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};
use utopia_core::Error;

use crate::cache::{create_or_load_pipeline_cache, pipeline_cache_path, save_pipeline_cache};
use crate::debug::{validation_available, DebugMessenger, VALIDATION_LAYER};

static DEVICE_ALIVE: AtomicBool = AtomicBool::new(false);

/// Run `create` while holding `slot`. Fails without calling it when the slot
/// is already taken; a failed `create` gives the slot back.
fn claim_slot<T>(slot: &AtomicBool, create: impl FnOnce() -> Result<T>) -> Result<T> {
    if slot
        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        .is_err()
    {
        return Err(Error::DeviceAlreadyInitialized.into());
    }
    create().inspect_err(|_| slot.store(false, Ordering::Release))
}

/// Every descriptor type the pool serves, each sized for
/// `DESCRIPTOR_SETS_PER_TYPE` sets.
pub(crate) const DESCRIPTOR_TYPES: [vk::DescriptorType; 11] = [
    vk::DescriptorType::SAMPLER,
    vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
    vk::DescriptorType::SAMPLED_IMAGE,
    vk::DescriptorType::STORAGE_IMAGE,
    vk::DescriptorType::UNIFORM_TEXEL_BUFFER,
    vk::DescriptorType::STORAGE_TEXEL_BUFFER,
    vk::DescriptorType::UNIFORM_BUFFER,
    vk::DescriptorType::STORAGE_BUFFER,
    vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
    vk::DescriptorType::STORAGE_BUFFER_DYNAMIC,
    vk::DescriptorType::INPUT_ATTACHMENT,
];
pub(crate) const DESCRIPTOR_SETS_PER_TYPE: u32 = 1000;

pub(crate) fn descriptor_pool_sizes() -> Vec<vk::DescriptorPoolSize> {
    DESCRIPTOR_TYPES
        .iter()
        .map(|&ty| vk::DescriptorPoolSize {
            ty,
            descriptor_count: DESCRIPTOR_SETS_PER_TYPE,
        })
        .collect()
}

/// First discrete GPU, else the first device enumerated.
pub(crate) fn preferred_device(types: &[vk::PhysicalDeviceType]) -> Option<usize> {
    if types.is_empty() {
        return None;
    }
    Some(
        types
            .iter()
            .position(|&t| t == vk::PhysicalDeviceType::DISCRETE_GPU)
            .unwrap_or(0),
    )
}

pub(crate) fn graphics_queue_family(families: &[vk::QueueFamilyProperties]) -> Option<u32> {
    families
        .iter()
        .position(|q| q.queue_flags.contains(vk::QueueFlags::GRAPHICS))
        .map(|i| i as u32)
}

/// The logical device, its single graphics queue, and the process-wide
/// descriptor pool and pipeline cache. One per process; everything else in
/// this crate borrows it and must be destroyed first.
pub struct DeviceContext {
    entry: Entry,
    instance: Instance,
    debug: Option<DebugMessenger>,
    phys: vk::PhysicalDevice,
    props: vk::PhysicalDeviceProperties,
    device: ash::Device,
    queue_family: u32,
    queue: vk::Queue,
    descriptor_pool: vk::DescriptorPool,
    pipeline_cache: vk::PipelineCache,
    allocator: Option<vk::AllocationCallbacks<'static>>,
}

impl DeviceContext {
    /// Instance, physical device, logical device, queue, descriptor pool.
    /// Any failure here is fatal to the caller.
    pub fn new(app_name: &str, required_extensions: &[*const c_char]) -> Result<Self> {
        claim_slot(&DEVICE_ALIVE, || unsafe { Self::create(app_name, required_extensions) })
    }

    unsafe fn create(app_name: &str, required_extensions: &[*const c_char]) -> Result<Self> {
        let entry = Entry::linked();
        let allocator: Option<vk::AllocationCallbacks<'static>> = None;

        // --- Instance (+ validation in debug builds when installed) ---
        let app = CString::new(app_name).context("application name contains NUL")?;
        let app_info = vk::ApplicationInfo::default()
            .application_name(&app)
            .engine_name(c"Utopia")
            .api_version(vk::API_VERSION_1_0);

        let validation = cfg!(debug_assertions) && validation_available(&entry);
        if cfg!(debug_assertions) && !validation {
            warn!("validation layer not installed; running without it");
        }

        let mut extensions = required_extensions.to_vec();
        if validation {
            extensions.push(ash::ext::debug_utils::NAME.as_ptr());
        }
        let layers: Vec<*const c_char> = if validation {
            vec![VALIDATION_LAYER.as_ptr()]
        } else {
            Vec::new()
        };

        let create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layers);
        let instance = entry
            .create_instance(&create_info, allocator.as_ref())
            .context("create_instance")?;

        let debug = if validation {
            Some(DebugMessenger::new(&entry, &instance).context("create_debug_utils_messenger")?)
        } else {
            None
        };

        // --- Physical device: discrete first ---
        let gpus = instance
            .enumerate_physical_devices()
            .context("enumerate_physical_devices")?;
        let types: Vec<_> = gpus
            .iter()
            .map(|&p| instance.get_physical_device_properties(p).device_type)
            .collect();
        let phys = preferred_device(&types)
            .map(|i| gpus[i])
            .ok_or(Error::NoPhysicalDevice)?;
        let props = instance.get_physical_device_properties(phys);

        // --- Graphics queue family ---
        let families = instance.get_physical_device_queue_family_properties(phys);
        let queue_family = graphics_queue_family(&families).ok_or(Error::NoGraphicsQueue)?;

        // --- Logical device + one queue ---
        let priorities = [1.0_f32];
        let queue_info = [vk::DeviceQueueCreateInfo::default()
            .queue_family_index(queue_family)
            .queue_priorities(&priorities)];
        let device_exts = [swapchain::NAME.as_ptr()];
        let device_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_info)
            .enabled_extension_names(&device_exts);
        let device = instance
            .create_device(phys, &device_info, allocator.as_ref())
            .context("create_device")?;
        let queue = device.get_device_queue(queue_family, 0);

        // --- Descriptor pool ---
        let pool_sizes = descriptor_pool_sizes();
        let pool_info = vk::DescriptorPoolCreateInfo::default()
            .flags(vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET)
            .max_sets(DESCRIPTOR_SETS_PER_TYPE * pool_sizes.len() as u32)
            .pool_sizes(&pool_sizes);
        let descriptor_pool = device
            .create_descriptor_pool(&pool_info, allocator.as_ref())
            .context("create_descriptor_pool")?;

        let pipeline_cache = create_or_load_pipeline_cache(&device, &pipeline_cache_path(&props))
            .context("create_pipeline_cache")?;

        let name = props
            .device_name_as_c_str()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        info!(
            "vulkan device: {name} ({:?}), queue family {queue_family}, validation={validation}",
            props.device_type
        );

        Ok(Self {
            entry,
            instance,
            debug,
            phys,
            props,
            device,
            queue_family,
            queue,
            descriptor_pool,
            pipeline_cache,
            allocator,
        })
    }

    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.phys
    }

    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    pub fn queue(&self) -> vk::Queue {
        self.queue
    }

    pub fn queue_family(&self) -> u32 {
        self.queue_family
    }

    pub fn descriptor_pool(&self) -> vk::DescriptorPool {
        self.descriptor_pool
    }

    pub fn pipeline_cache(&self) -> vk::PipelineCache {
        self.pipeline_cache
    }

    pub fn allocator(&self) -> Option<&vk::AllocationCallbacks<'static>> {
        self.allocator.as_ref()
    }

    pub fn wait_idle(&self) -> Result<()> {
        unsafe { self.device.device_wait_idle() }.context("device_wait_idle")
    }

    fn cache_path(&self) -> PathBuf {
        pipeline_cache_path(&self.props)
    }
}

// TEARDOWN ORDER:
// - device_wait_idle (nothing may still reference the pool or cache)
// - save + destroy pipeline cache, destroy descriptor pool
// - destroy device, then debug messenger, then instance
// Surfaces and swapchains must already be gone.
impl Drop for DeviceContext {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();

            let path = self.cache_path();
            if let Err(e) = save_pipeline_cache(&self.device, self.pipeline_cache, &path) {
                warn!("saving pipeline cache to {} failed: {e}", path.display());
            }
            self.device
                .destroy_pipeline_cache(self.pipeline_cache, self.allocator.as_ref());
            self.device
                .destroy_descriptor_pool(self.descriptor_pool, self.allocator.as_ref());
            self.device.destroy_device(self.allocator.as_ref());

            if let Some(debug) = &self.debug {
                debug.destroy();
            }
            self.instance.destroy_instance(self.allocator.as_ref());
        }
        DEVICE_ALIVE.store(false, Ordering::Release);
        info!("vulkan device destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use std::thread;

    #[test]
    fn only_one_claim_wins_a_race() {
        let slot = AtomicBool::new(false);
        let wins: usize = thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| s.spawn(|| claim_slot(&slot, || Ok(())).is_ok()))
                .collect();
            handles
                .into_iter()
                .map(|h| usize::from(h.join().unwrap()))
                .sum()
        });
        assert_eq!(wins, 1);
        assert!(slot.load(Ordering::Acquire));
    }

    #[test]
    fn second_claim_is_rejected() {
        let slot = AtomicBool::new(false);
        claim_slot(&slot, || Ok(())).unwrap();
        let err = claim_slot(&slot, || Ok(())).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::DeviceAlreadyInitialized)
        ));
    }

    #[test]
    fn failed_creation_releases_the_slot() {
        let slot = AtomicBool::new(false);
        let failed: Result<()> = claim_slot(&slot, || bail!("no vulkan driver"));
        assert!(failed.is_err());
        assert!(!slot.load(Ordering::Acquire));
        assert!(claim_slot(&slot, || Ok(())).is_ok());
    }

    #[test]
    fn discrete_gpu_wins_over_earlier_integrated() {
        let types = [
            vk::PhysicalDeviceType::INTEGRATED_GPU,
            vk::PhysicalDeviceType::CPU,
            vk::PhysicalDeviceType::DISCRETE_GPU,
        ];
        assert_eq!(preferred_device(&types), Some(2));
    }

    #[test]
    fn falls_back_to_first_device() {
        let types = [
            vk::PhysicalDeviceType::VIRTUAL_GPU,
            vk::PhysicalDeviceType::INTEGRATED_GPU,
        ];
        assert_eq!(preferred_device(&types), Some(0));
        assert_eq!(preferred_device(&[]), None);
    }

    #[test]
    fn picks_first_graphics_family() {
        let family = |flags| vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: 1,
            ..Default::default()
        };
        let families = [
            family(vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::COMPUTE | vk::QueueFlags::GRAPHICS),
            family(vk::QueueFlags::GRAPHICS),
        ];
        assert_eq!(graphics_queue_family(&families), Some(1));
        assert_eq!(graphics_queue_family(&families[..1]), None);
    }

    #[test]
    fn descriptor_pool_covers_every_type_at_one_thousand() {
        let sizes = descriptor_pool_sizes();
        assert_eq!(sizes.len(), 11);
        assert!(sizes.iter().all(|s| s.descriptor_count == 1000));
        assert!(sizes
            .iter()
            .any(|s| s.ty == vk::DescriptorType::COMBINED_IMAGE_SAMPLER));
    }
}
