//! Popup controller exported to the popup page script.
//!
//! Layout stays in HTML/JS; this class answers what to show and performs
//! the extension calls for each control.

use std::cell::RefCell;
use std::rc::Rc;

use bh_core::bridge::Request;
use bh_core::config::STORAGE_KEY;
use bh_core::popup::{
    is_pull_request_url, Control, DirectCount, PopupState, StatsView, FALLBACK_HIDDEN_SELECTOR,
    FALLBACK_TOTAL_SELECTOR, REPORT_ISSUE_URL,
};
use js_sys::{Array, Function, Promise};
use serde_json::Value;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::future_to_promise;

use crate::chrome::{self, describe, from_json, to_json};

#[wasm_bindgen]
pub struct PopupController {
    tab_id: i32,
    url: String,
    state: Rc<RefCell<PopupState>>,
}

#[wasm_bindgen]
impl PopupController {
    /// Look up the active tab and the stored flag.
    pub async fn load() -> Result<PopupController, JsValue> {
        crate::console::init(false);
        let tab = chrome::active_tab().await?.ok_or_else(|| JsValue::from_str("No active tab"))?;
        let stored = chrome::storage_get(STORAGE_KEY).await.unwrap_or_else(|e| {
            log::warn!("Failed to read stored flag: {}", describe(&e));
            None
        });
        Ok(PopupController {
            tab_id: tab.id,
            url: tab.url,
            state: Rc::new(RefCell::new(PopupState::from_stored(stored.as_ref()))),
        })
    }

    /// `false` means the popup shows its "not a pull request" panel.
    #[wasm_bindgen(js_name = isPullRequest)]
    pub fn is_pull_request(&self) -> bool {
        is_pull_request_url(&self.url)
    }

    pub fn enabled(&self) -> bool {
        self.state.borrow().enabled()
    }

    /// `{className, text}` for the status line.
    pub fn status(&self) -> Result<JsValue, JsValue> {
        let status = self.state.borrow().status();
        let value = serde_json::to_value(status).map_err(|e| JsValue::from_str(&e.to_string()))?;
        from_json(&value)
    }

    /// Persist the flag, then tell the page. Resolves once both were tried.
    #[wasm_bindgen(js_name = setEnabled)]
    pub fn set_enabled(&self, enabled: bool) -> Promise {
        let request = self.state.borrow_mut().apply(Control::Toggle(enabled));
        let tab_id = self.tab_id;
        future_to_promise(async move {
            chrome::storage_set(STORAGE_KEY, enabled).await?;
            if let Some(request) = request {
                send(tab_id, request).await;
            }
            Ok(JsValue::UNDEFINED)
        })
    }

    #[wasm_bindgen(js_name = showAll)]
    pub fn show_all(&self) -> Promise {
        self.send_control(Control::ShowAll)
    }

    #[wasm_bindgen(js_name = hideAll)]
    pub fn hide_all(&self) -> Promise {
        self.send_control(Control::HideAll)
    }

    /// Reload the tab and close the popup.
    pub fn refresh(&self) -> Promise {
        let tab_id = self.tab_id;
        future_to_promise(async move {
            chrome::reload(tab_id).await?;
            if let Some(window) = web_sys::window() {
                window.close()?;
            }
            Ok(JsValue::UNDEFINED)
        })
    }

    #[wasm_bindgen(js_name = reportIssue)]
    pub fn report_issue(&self) -> Promise {
        future_to_promise(async move {
            chrome::open_tab(REPORT_ISSUE_URL).await?;
            Ok(JsValue::UNDEFINED)
        })
    }

    /// Resolve to `{hidden, total}` counter texts.
    #[wasm_bindgen(js_name = loadStats)]
    pub fn load_stats(&self) -> Promise {
        let tab_id = self.tab_id;
        future_to_promise(async move {
            let response = send(tab_id, Request::GetStats).await;
            let view = match StatsView::from_response(response.as_ref()) {
                Some(view) => view,
                None => count_directly(tab_id).await.map(StatsView::from).unwrap_or_else(StatsView::unavailable),
            };
            let value = serde_json::to_value(view).map_err(|e| JsValue::from_str(&e.to_string()))?;
            from_json(&value)
        })
    }

    /// Follow flag changes made elsewhere (another popup, the page
    /// button). `onToggle(enabled)` runs whenever the shown state changes.
    #[wasm_bindgen(js_name = watchStorage)]
    pub fn watch_storage(&self, on_toggle: Function) {
        let state = self.state.clone();
        let listener = Closure::<dyn FnMut(JsValue, String)>::new(move |changes: JsValue, area: String| {
            let Some(changes) = to_json(&changes) else {
                return;
            };
            let Some(enabled) = state.borrow_mut().on_storage_change(&changes, &area) else {
                return;
            };
            if let Err(e) = on_toggle.call1(&JsValue::UNDEFINED, &JsValue::from_bool(enabled)) {
                log::warn!("Toggle callback failed: {}", describe(&e));
            }
        });
        chrome::add_storage_listener(listener.as_ref().unchecked_ref());
        listener.forget();
    }
}

impl PopupController {
    fn send_control(&self, control: Control) -> Promise {
        let request = self.state.borrow_mut().apply(control);
        let tab_id = self.tab_id;
        future_to_promise(async move {
            if let Some(request) = request {
                send(tab_id, request).await;
            }
            Ok(JsValue::UNDEFINED)
        })
    }
}

/// Send a bridge request; an unreachable page is logged and yields `None`.
async fn send(tab_id: i32, request: Request) -> Option<Value> {
    let message = serde_json::to_value(request).ok()?;
    match chrome::send_message(tab_id, &message).await {
        Ok(response) => response,
        Err(e) => {
            log::info!("Could not reach the page: {}", describe(&e));
            None
        }
    }
}

async fn count_directly(tab_id: i32) -> Option<DirectCount> {
    let args = Array::of2(
        &JsValue::from_str(FALLBACK_TOTAL_SELECTOR),
        &JsValue::from_str(FALLBACK_HIDDEN_SELECTOR),
    );
    match chrome::execute_in_tab(tab_id, &chrome::comment_counter(), &args).await {
        Ok(result) => result.and_then(|value| serde_json::from_value(value).ok()),
        Err(e) => {
            log::info!("Could not count comments: {}", describe(&e));
            None
        }
    }
}
