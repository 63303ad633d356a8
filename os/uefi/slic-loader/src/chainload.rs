//! # Handing over to the next boot stage

use crate::file_system::load_file;
use log::info;
use uefi::boot::{self, LoadImageSource};
use uefi::{CStr16, Status};

/// Load the EFI image at `path` from the loader's volume and start it.
///
/// Only returns if the image could not be started or returned itself.
pub fn chainload(path: &CStr16) -> Status {
    let image = match load_file(path) {
        Ok(image) => image,
        Err(e) => {
            log::error!("Failed to load {path}: {e}");
            return e.into();
        }
    };

    let handle = match boot::load_image(
        boot::image_handle(),
        LoadImageSource::FromBuffer {
            buffer: &image,
            file_path: None,
        },
    ) {
        Ok(handle) => handle,
        Err(e) => {
            log::error!("Firmware refused to load {path}: {e:?}");
            return e.status();
        }
    };

    info!("Starting {path} ({} bytes)", image.len());
    match boot::start_image(handle) {
        Ok(()) => Status::SUCCESS,
        Err(e) => e.status(),
    }
}
