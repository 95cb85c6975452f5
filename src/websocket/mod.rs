//! WebSocket side of an upgraded HTTP connection.
//!
//! - **`frame`**: frame decoder and encoder
//! - **`channel`**: `/command`, console lines in and command output out
//! - **`upload`**: `/upload`, name, size and contents written to disk

pub mod channel;
pub mod frame;
pub mod upload;

pub use channel::CommandChannel;
pub use upload::UploadChannel;
