//! Browser-automation collaborator: the traits the crawler drives and the
//! two backends that implement them.

pub mod driver;
pub mod error;
pub mod html;
pub mod http;
pub mod playwright;
pub mod session;

pub use driver::{
    BrowserDriver, BrowserLauncher, Document, ElementHandle, Navigation, PageSession,
    SessionOptions, Viewport,
};
pub use error::BrowserError;
