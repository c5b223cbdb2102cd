//! C entry points for tools and hosts written in other languages.
//!
//! Tools register a [`PluginData`] record with [`ps_register_tool`]; hosts
//! pull result sets with the `ps_get_*` / `ps_free_*` pairs.

use std::ffi::c_int;
use std::sync::Arc;

use crate::abi::{PluginData, RawCounterData, RawMetadata, RawTimerData};
use crate::binding::ForeignTool;
use crate::facade;
use crate::registry::ToolId;

/// Register a C tool with the process-wide registry.
///
/// Returns the registration id (≥ 1), or -1 when `data` is null.
///
/// # Safety
///
/// `data` is null or points to a valid record whose function pointers and
/// name remain valid for as long as the tool stays registered.
#[no_mangle]
pub unsafe extern "C" fn ps_register_tool(data: *const PluginData) -> c_int {
    // SAFETY: upheld by the caller.
    let Some(data) = (unsafe { data.as_ref() }) else {
        tracing::debug!("ignoring null tool registration");
        return -1;
    };
    // SAFETY: the record's pointers outlive the registration.
    let tool = unsafe { ForeignTool::from_plugin(data) };
    tracing::trace!(capabilities = ?tool.table().capabilities(), "registering C tool");
    facade::registry().register(Arc::new(tool)).raw()
}

/// Drop the registration `id`. Unknown ids are ignored.
#[no_mangle]
pub extern "C" fn ps_deregister_tool(id: c_int) {
    facade::registry().deregister(ToolId::from_raw(id));
}

/// # Safety
///
/// `out` is null or points to a zero-initialized [`RawTimerData`].
#[no_mangle]
pub unsafe extern "C" fn ps_get_timer_data(out: *mut RawTimerData) {
    // SAFETY: upheld by the caller.
    if let Some(out) = unsafe { out.as_mut() } {
        facade::get_timer_data_raw(out);
    }
}

/// # Safety
///
/// `data` is null or was filled by [`ps_get_timer_data`].
#[no_mangle]
pub unsafe extern "C" fn ps_free_timer_data(data: *mut RawTimerData) {
    // SAFETY: upheld by the caller.
    unsafe { facade::free_timer_data_raw(data) };
}

/// # Safety
///
/// `out` is null or points to a zero-initialized [`RawCounterData`].
#[no_mangle]
pub unsafe extern "C" fn ps_get_counter_data(out: *mut RawCounterData) {
    // SAFETY: upheld by the caller.
    if let Some(out) = unsafe { out.as_mut() } {
        facade::get_counter_data_raw(out);
    }
}

/// # Safety
///
/// `data` is null or was filled by [`ps_get_counter_data`].
#[no_mangle]
pub unsafe extern "C" fn ps_free_counter_data(data: *mut RawCounterData) {
    // SAFETY: upheld by the caller.
    unsafe { facade::free_counter_data_raw(data) };
}

/// # Safety
///
/// `out` is null or points to a zero-initialized [`RawMetadata`].
#[no_mangle]
pub unsafe extern "C" fn ps_get_metadata(out: *mut RawMetadata) {
    // SAFETY: upheld by the caller.
    if let Some(out) = unsafe { out.as_mut() } {
        facade::get_metadata_raw(out);
    }
}

/// # Safety
///
/// `data` is null or was filled by [`ps_get_metadata`].
#[no_mangle]
pub unsafe extern "C" fn ps_free_metadata(data: *mut RawMetadata) {
    // SAFETY: upheld by the caller.
    unsafe { facade::free_metadata_raw(data) };
}
