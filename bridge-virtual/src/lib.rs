//! # Virtual Bridge Implementations
//!
//! In-process implementations of the media bridge traits.
//!
//! ## Overview
//!
//! - [`VirtualMediaBackend`] models a platform media framework: it keeps a
//!   state machine per handle, rejects calls the current state does not allow
//!   and performs the gapless successor hand-off when a handle completes.
//! - [`ResourceCatalog`] resolves sound names against a registered table, the
//!   way a mobile host looks up bundled "raw" resources.
//!
//! Nothing here produces sound. Hosts without a native media layer use it to
//! exercise the loop core, and tests drive the "prepared" and "completed"
//! signals explicitly through [`VirtualMediaBackend::finish_preparing`] and
//! [`VirtualMediaBackend::complete`].
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_virtual::{ResourceCatalog, VirtualMediaBackend};
//! use std::sync::Arc;
//!
//! let catalog = Arc::new(ResourceCatalog::new().with_resource("rain", 1));
//! let backend = Arc::new(VirtualMediaBackend::new(Arc::clone(&catalog)));
//! ```

mod catalog;
mod player;

pub use catalog::ResourceCatalog;
pub use player::VirtualMediaBackend;
