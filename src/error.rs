//! Error classification and panic containment.
//!
//! Component errors are reported once, at the boundary nearest their cause.
//! The class decides the log level; nothing here propagates.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

/// Broad failure classes shared by every component error type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    /// Icon, template or other resource not found. Always degrades.
    ResourceResolution,
    /// Window, tray or overlay construction failed.
    SurfaceCreation,
    /// Network or file transfer failure, terminal for one download.
    Transfer,
    Unexpected,
}

impl ErrorClass {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ResourceResolution => "resource_resolution",
            Self::SurfaceCreation => "surface_creation",
            Self::Transfer => "transfer",
            Self::Unexpected => "unexpected",
        }
    }

    fn level(self) -> log::Level {
        match self {
            Self::ResourceResolution | Self::Transfer => log::Level::Warn,
            Self::SurfaceCreation | Self::Unexpected => log::Level::Error,
        }
    }
}

/// Errors that know which class they belong to.
pub trait Classified: std::error::Error {
    fn class(&self) -> ErrorClass;
}

/// Log `error` once with a level derived from its class.
pub fn report<E: Classified + ?Sized>(context: &str, error: &E) {
    let class = error.class();
    log::log!(class.level(), "{} failed [{}]: {}", context, class.as_str(), error);
}

/// Run `f`, containing any panic it raises.
///
/// Returns `None` when `f` panicked. Used around tray, window and bus
/// callbacks so one faulty handler cannot take the event loop down.
pub fn guard<R>(context: &str, f: impl FnOnce() -> R) -> Option<R> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => Some(value),
        Err(payload) => {
            log::error!(
                "{} panicked [{}]: {}",
                context,
                ErrorClass::Unexpected.as_str(),
                panic_message(payload.as_ref())
            );
            None
        }
    }
}

/// Best-effort text of a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Log every panic with its location before the default hook runs.
pub fn install_panic_hook() {
    let previous = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        let location = info
            .location()
            .map(|location| format!("{}:{}", location.file(), location.line()))
            .unwrap_or_else(|| "unknown location".to_string());
        log::error!(
            "Unhandled panic at {}: {}",
            location,
            panic_message(info.payload())
        );
        previous(info);
    }));
}
