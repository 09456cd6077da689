//! WebAssembly bindings for the bot comment hider
//!
//! The content script calls [`start_content`] once per page; the popup
//! script builds a [`PopupController`] via `PopupController.load()`.

use wasm_bindgen::prelude::*;

mod browser;
mod chrome;
mod console;
mod content;
mod popup;

pub use browser::BrowserDom;
pub use popup::PopupController;

#[wasm_bindgen(js_name = startContent)]
pub fn start_content() -> Result<(), JsValue> {
    content::start()
}

/// Crate version shown in the popup footer.
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
