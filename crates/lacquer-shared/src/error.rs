use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image too large: {size} bytes (max {max})")]
    TooLarge { size: u64, max: u64 },
}

/// Why a polish placement does not fit the configured layout.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PlacementError {
    #[error("Unknown wall: {0}")]
    UnknownWall(String),

    #[error("Shelf {shelf} out of range (1..={max})")]
    ShelfOutOfRange { shelf: u32, max: u32 },

    #[error("Slot {position} out of range (1..={max})")]
    SlotOutOfRange { position: u32, max: u32 },
}
