use alloc::vec;
use alloc::vec::Vec;
use uefi::proto::media::file::{File, FileAttribute, FileMode, RegularFile};
use uefi::{CStr16, Status, boot};

#[derive(Debug, thiserror::Error)]
pub enum FileError {
    #[error("failed to get the image's file system: {0}")]
    FileSystem(Status),
    #[error("failed to open the root directory: {0}")]
    OpenVolume(Status),
    #[error("failed to open file: {0}")]
    Open(Status),
    #[error("not a regular file")]
    NotAFile,
    #[error("failed to seek: {0}")]
    Seek(Status),
    #[error("file size does not fit in memory")]
    TooLarge,
    #[error("failed to read file contents: {0}")]
    Read(Status),
    #[error("read {read} bytes, expected {expected} bytes")]
    SizeMismatch { read: usize, expected: usize },
}

impl From<FileError> for Status {
    fn from(e: FileError) -> Self {
        match e {
            FileError::FileSystem(status)
            | FileError::OpenVolume(status)
            | FileError::Open(status)
            | FileError::Seek(status)
            | FileError::Read(status) => status,
            FileError::NotAFile => Self::INVALID_PARAMETER,
            FileError::TooLarge => Self::BAD_BUFFER_SIZE,
            FileError::SizeMismatch { .. } => Self::END_OF_FILE,
        }
    }
}

/// Loads a file from the volume this image was started from.
///
/// # Errors
/// Returns a [`FileError`] naming the step that failed.
pub fn load_file(path: &CStr16) -> Result<Vec<u8>, FileError> {
    let mut sfs = boot::get_image_file_system(boot::image_handle())
        .map_err(|e| FileError::FileSystem(e.status()))?;
    let mut volume = sfs
        .open_volume()
        .map_err(|e| FileError::OpenVolume(e.status()))?;

    let mut file = volume
        .open(path, FileMode::Read, FileAttribute::empty())
        .map_err(|e| FileError::Open(e.status()))?
        .into_regular_file()
        .ok_or(FileError::NotAFile)?;

    // Get file size
    file.set_position(RegularFile::END_OF_FILE)
        .map_err(|e| FileError::Seek(e.status()))?;
    let size = file
        .get_position()
        .map_err(|e| FileError::Seek(e.status()))?;
    file.set_position(0)
        .map_err(|e| FileError::Seek(e.status()))?;
    let size = usize::try_from(size).map_err(|_| FileError::TooLarge)?;

    let mut buf = vec![0u8; size];
    let read = file
        .read(&mut buf)
        .map_err(|e| FileError::Read(e.status()))?;
    if read != size {
        return Err(FileError::SizeMismatch {
            read,
            expected: size,
        });
    }

    Ok(buf)
}
