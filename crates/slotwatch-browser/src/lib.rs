//! # SlotWatch Browser
//! Chrome driven over WebDriver (chromedriver), exposed as a [`Page`].
//!
//! [`Page`]: slotwatch_core::traits::Page

pub mod webdriver;

pub use webdriver::{WebDriverLauncher, WebDriverPage};
