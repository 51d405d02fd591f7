//! Trait seams between the monitor and its collaborators.

pub mod notifier;
pub mod page;

pub use notifier::Notifier;
pub use page::{ClickMode, Locator, Page, PageLauncher, Presence};
