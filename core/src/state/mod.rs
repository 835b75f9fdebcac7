mod overlay;

pub use overlay::OverlayState;
