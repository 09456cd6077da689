//! Content script runtime
//!
//! Wires a [`Lifecycle`] to the live page: the stored flag, the message
//! listener, the per-session mutation observer and toggle click handler,
//! and the page-wide URL watcher that drives re-activation.

use std::cell::RefCell;
use std::rc::Rc;

use bh_core::bridge::RESPONDS_ASYNCHRONOUSLY;
use bh_core::config::Config;
use bh_core::dom::Subscription;
use bh_core::error::HiderError;
use bh_core::lifecycle::{waits_for_dom, Lifecycle, NavigationAction, DOM_READY_EVENT};
use bh_core::visibility::{enabled_from_stored, report_persist_failure, FlagStore};
use js_sys::{Array, Function, Reflect};
use serde_json::Value;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::spawn_local;
use web_sys::{Element, Event, EventTarget, MutationObserver, MutationObserverInit, MutationRecord, Node, Window};

use crate::browser::BrowserDom;
use crate::chrome::{self, describe, from_json, to_json};

type PageLifecycle = Lifecycle<BrowserDom, SyncStore>;
type Shared = Rc<RefCell<PageLifecycle>>;

// ============================================================================
// Flag store
// ============================================================================

/// Writes the flag to `chrome.storage.sync` without waiting for it.
pub struct SyncStore {
    key: String,
}

impl FlagStore for SyncStore {
    fn persist(&self, enabled: bool) {
        let key = self.key.clone();
        spawn_local(async move {
            if let Err(e) = chrome::storage_set(&key, enabled).await {
                report_persist_failure(&HiderError::Storage(describe(&e)));
            }
        });
    }
}

// ============================================================================
// Subscriptions
// ============================================================================

type ObserverCallback = Closure<dyn FnMut(Array, MutationObserver)>;

struct ObserverSubscription {
    observer: MutationObserver,
    _callback: ObserverCallback,
}

impl Subscription for ObserverSubscription {
    fn cancel(&mut self) {
        self.observer.disconnect();
    }
}

struct ListenerSubscription {
    target: EventTarget,
    event: &'static str,
    callback: Closure<dyn FnMut(Event)>,
}

impl Subscription for ListenerSubscription {
    fn cancel(&mut self) {
        let _ = self
            .target
            .remove_event_listener_with_callback(self.event, self.callback.as_ref().unchecked_ref());
    }
}

fn observe(target: &Node, callback: ObserverCallback) -> Result<ObserverSubscription, JsValue> {
    let observer = MutationObserver::new(callback.as_ref().unchecked_ref())?;
    let init = MutationObserverInit::new();
    init.set_child_list(true);
    init.set_subtree(true);
    observer.observe_with_options(target, &init)?;
    Ok(ObserverSubscription { observer, _callback: callback })
}

fn added_elements(records: &Array) -> Vec<Element> {
    let mut added = Vec::new();
    for record in records.iter() {
        let Ok(record) = record.dyn_into::<MutationRecord>() else {
            continue;
        };
        let nodes = record.added_nodes();
        for i in 0..nodes.length() {
            if let Some(element) = nodes.item(i).and_then(|n| n.dyn_into::<Element>().ok()) {
                added.push(element);
            }
        }
    }
    added
}

// ============================================================================
// Activation
// ============================================================================

fn window() -> Result<Window, JsValue> {
    web_sys::window().ok_or_else(|| JsValue::from_str("no window"))
}

/// Start the content script on the current page.
pub fn start() -> Result<(), JsValue> {
    let window = window()?;
    let location = window.location();
    let config = Config::from_query(&location.search()?);
    crate::console::init(config.debug);

    let lifecycle: Shared = Rc::new(RefCell::new(Lifecycle::new(config, &location.href()?)));
    listen_for_messages(&lifecycle);
    watch_navigation(&lifecycle, &window)?;

    match window.document() {
        Some(document) if waits_for_dom(&ready_state(&document)) => {
            log::debug!("Waiting for {}", DOM_READY_EVENT);
            let lifecycle = lifecycle.clone();
            let callback = Closure::once_into_js(move || activate(&lifecycle));
            document.add_event_listener_with_callback(DOM_READY_EVENT, callback.unchecked_ref())?;
        }
        _ => activate(&lifecycle),
    }
    Ok(())
}

fn ready_state(document: &web_sys::Document) -> String {
    Reflect::get(document, &JsValue::from_str("readyState"))
        .ok()
        .and_then(|state| state.as_string())
        .unwrap_or_default()
}

fn activate(lifecycle: &Shared) {
    let path = match window().and_then(|w| w.location().pathname()) {
        Ok(path) => path,
        Err(e) => {
            log::warn!("Cannot read location: {}", describe(&e));
            return;
        }
    };
    let Some(ticket) = lifecycle.borrow_mut().begin_activation(&path) else {
        return;
    };
    let key = lifecycle.borrow().config().storage_key.clone();
    let lifecycle = lifecycle.clone();

    spawn_local(async move {
        let stored = chrome::storage_get(&key).await.unwrap_or_else(|e| {
            log::warn!("Failed to read stored flag: {}", describe(&e));
            None
        });
        let enabled = enabled_from_stored(stored.as_ref());
        let Some(document) = window().ok().and_then(|w| w.document()) else {
            return;
        };

        let started = lifecycle
            .borrow_mut()
            .complete_activation(ticket, BrowserDom::new(document), SyncStore { key }, enabled);
        if started {
            if let Err(e) = attach(&lifecycle) {
                log::error!("Failed to attach page listeners: {}", describe(&e));
            }
        }
    });
}

/// Hook the new session up to page mutations and toggle clicks.
fn attach(lifecycle: &Shared) -> Result<(), JsValue> {
    let mut guard = lifecycle.borrow_mut();
    let Some(session) = guard.session_mut() else {
        return Ok(());
    };

    let weak = Rc::downgrade(lifecycle);
    let on_mutations: ObserverCallback = Closure::new(move |records: Array, _observer: MutationObserver| {
        let Some(lifecycle) = weak.upgrade() else {
            return;
        };
        let Ok(mut lifecycle) = lifecycle.try_borrow_mut() else {
            return;
        };
        if let Some(session) = lifecycle.session_mut() {
            session.handle_mutations(&added_elements(&records));
        }
    });
    if let Some(body) = session.dom().document().body() {
        let subscription = observe(&body, on_mutations)?;
        session.hold(Box::new(subscription));
    }

    if let Some(button) = session.affordance().map(|a| a.button().clone()) {
        let weak = Rc::downgrade(lifecycle);
        let callback = Closure::<dyn FnMut(Event)>::new(move |event: Event| {
            event.prevent_default();
            let Some(lifecycle) = weak.upgrade() else {
                return;
            };
            let Ok(mut lifecycle) = lifecycle.try_borrow_mut() else {
                return;
            };
            if let Some(session) = lifecycle.session_mut() {
                session.toggle();
            }
        });
        let target: EventTarget = button.into();
        target.add_event_listener_with_callback("click", callback.as_ref().unchecked_ref())?;
        session.hold(Box::new(ListenerSubscription { target, event: "click", callback }));
    }
    Ok(())
}

// ============================================================================
// Page-wide listeners
// ============================================================================

fn listen_for_messages(lifecycle: &Shared) {
    let lifecycle = lifecycle.clone();
    let listener = Closure::<dyn FnMut(JsValue, JsValue, Function) -> JsValue>::new(
        move |message: JsValue, _sender: JsValue, send_response: Function| {
            let raw = to_json(&message).unwrap_or(Value::Null);
            let response = match lifecycle.try_borrow_mut() {
                Ok(mut lifecycle) => lifecycle.handle_message(&raw),
                Err(_) => bh_core::Response::error("Extension busy"),
            };
            match from_json(&response.to_value()) {
                Ok(value) => {
                    if let Err(e) = send_response.call1(&JsValue::UNDEFINED, &value) {
                        log::warn!("Failed to send response: {}", describe(&e));
                    }
                }
                Err(e) => log::warn!("Failed to encode response: {}", describe(&e)),
            }
            JsValue::from_bool(RESPONDS_ASYNCHRONOUSLY)
        },
    );
    chrome::add_message_listener(listener.as_ref().unchecked_ref());
    listener.forget();
}

/// Watch the whole document for in-app navigations. Lives as long as the page.
fn watch_navigation(lifecycle: &Shared, window: &Window) -> Result<(), JsValue> {
    let Some(document) = window.document() else {
        return Ok(());
    };
    let weak = Rc::downgrade(lifecycle);
    let on_change: ObserverCallback = Closure::new(move |_records: Array, _observer: MutationObserver| {
        let Some(lifecycle) = weak.upgrade() else {
            return;
        };
        let Ok(href) = window_href() else {
            return;
        };
        let (action, debug) = match lifecycle.try_borrow_mut() {
            Ok(mut lifecycle) => (lifecycle.on_location_change(&href), lifecycle.config().debug),
            Err(_) => return,
        };
        if let NavigationAction::Reactivate { after } = action {
            crate::console::init(debug);
            schedule_activation(&lifecycle, after.as_millis() as i32);
        }
    });
    let subscription = observe(&document, on_change)?;
    std::mem::forget(subscription);
    Ok(())
}

fn window_href() -> Result<String, JsValue> {
    window()?.location().href()
}

fn schedule_activation(lifecycle: &Shared, delay_ms: i32) {
    let lifecycle = lifecycle.clone();
    let callback = Closure::once_into_js(move || activate(&lifecycle));
    let scheduled = window().and_then(|w| {
        w.set_timeout_with_callback_and_timeout_and_arguments_0(callback.unchecked_ref(), delay_ms)
    });
    if let Err(e) = scheduled {
        log::warn!("Failed to schedule activation: {}", describe(&e));
    }
}
