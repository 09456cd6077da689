//! Extension platform bindings
//!
//! Thin `chrome.*` imports plus the conversions between JS values and
//! `serde_json::Value` used at the bridge boundary.

use js_sys::{Array, Function, Object, Promise, Reflect, JSON};
use serde_json::Value;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(catch, js_namespace = ["chrome", "storage", "sync"], js_name = get)]
    fn storage_sync_get(keys: &JsValue) -> Result<Promise, JsValue>;

    #[wasm_bindgen(catch, js_namespace = ["chrome", "storage", "sync"], js_name = set)]
    fn storage_sync_set(items: &JsValue) -> Result<Promise, JsValue>;

    #[wasm_bindgen(js_namespace = ["chrome", "storage", "onChanged"], js_name = addListener)]
    pub fn add_storage_listener(listener: &Function);

    #[wasm_bindgen(js_namespace = ["chrome", "runtime", "onMessage"], js_name = addListener)]
    pub fn add_message_listener(listener: &Function);

    #[wasm_bindgen(catch, js_namespace = ["chrome", "tabs"], js_name = query)]
    fn tabs_query(query: &JsValue) -> Result<Promise, JsValue>;

    #[wasm_bindgen(catch, js_namespace = ["chrome", "tabs"], js_name = sendMessage)]
    fn tabs_send_message(tab_id: i32, message: &JsValue) -> Result<Promise, JsValue>;

    #[wasm_bindgen(catch, js_namespace = ["chrome", "tabs"], js_name = reload)]
    fn tabs_reload(tab_id: i32) -> Result<Promise, JsValue>;

    #[wasm_bindgen(catch, js_namespace = ["chrome", "tabs"], js_name = create)]
    fn tabs_create(properties: &JsValue) -> Result<Promise, JsValue>;

    #[wasm_bindgen(catch, js_namespace = ["chrome", "scripting"], js_name = executeScript)]
    fn scripting_execute_script(injection: &JsValue) -> Result<Promise, JsValue>;
}

// Injected functions are serialized by the browser and run in the page, so
// they must be real source and only use their arguments.
#[wasm_bindgen(inline_js = "
function countComments(totalSelector, hiddenSelector) {
    return {
        total: document.querySelectorAll(totalSelector).length,
        hidden: document.querySelectorAll(hiddenSelector).length,
    };
}
export function comment_counter() {
    return countComments;
}
")]
extern "C" {
    /// `(totalSelector, hiddenSelector) => {total, hidden}`
    pub fn comment_counter() -> Function;
}

// ============================================================================
// Value conversion
// ============================================================================

/// JS value to JSON. `undefined` and non-serializable values become `None`.
pub fn to_json(value: &JsValue) -> Option<Value> {
    if value.is_undefined() {
        return None;
    }
    let text = JSON::stringify(value).ok()?.as_string()?;
    serde_json::from_str(&text).ok()
}

pub fn from_json(value: &Value) -> Result<JsValue, JsValue> {
    JSON::parse(&value.to_string())
}

/// Human-readable text for a rejected promise or thrown value.
pub fn describe(error: &JsValue) -> String {
    if let Some(text) = error.as_string() {
        return text;
    }
    Reflect::get(error, &JsValue::from_str("message"))
        .ok()
        .and_then(|m| m.as_string())
        .unwrap_or_else(|| format!("{:?}", error))
}

fn set(target: &Object, key: &str, value: &JsValue) -> Result<(), JsValue> {
    Reflect::set(target, &JsValue::from_str(key), value).map(|_| ())
}

// ============================================================================
// Storage
// ============================================================================

/// Read one key from synced storage. `None` when unset.
pub async fn storage_get(key: &str) -> Result<Option<Value>, JsValue> {
    let keys = Array::of1(&JsValue::from_str(key));
    let items = JsFuture::from(storage_sync_get(&keys)?).await?;
    let value = Reflect::get(&items, &JsValue::from_str(key))?;
    Ok(to_json(&value))
}

pub async fn storage_set(key: &str, enabled: bool) -> Result<(), JsValue> {
    let items = Object::new();
    set(&items, key, &JsValue::from_bool(enabled))?;
    JsFuture::from(storage_sync_set(&items)?).await?;
    Ok(())
}

// ============================================================================
// Tabs
// ============================================================================

pub struct Tab {
    pub id: i32,
    pub url: String,
}

pub async fn active_tab() -> Result<Option<Tab>, JsValue> {
    let query = Object::new();
    set(&query, "active", &JsValue::TRUE)?;
    set(&query, "currentWindow", &JsValue::TRUE)?;
    let tabs = Array::from(&JsFuture::from(tabs_query(&query)?).await?);

    let tab = tabs.get(0);
    if tab.is_undefined() {
        return Ok(None);
    }
    let id = Reflect::get(&tab, &JsValue::from_str("id"))?.as_f64().unwrap_or(-1.0) as i32;
    let url = Reflect::get(&tab, &JsValue::from_str("url"))?.as_string().unwrap_or_default();
    Ok(Some(Tab { id, url }))
}

/// Send one message to the page script. Resolves to the response, `None`
/// when the page answered nothing.
pub async fn send_message(tab_id: i32, message: &Value) -> Result<Option<Value>, JsValue> {
    let response = JsFuture::from(tabs_send_message(tab_id, &from_json(message)?)?).await?;
    Ok(to_json(&response))
}

pub async fn reload(tab_id: i32) -> Result<(), JsValue> {
    JsFuture::from(tabs_reload(tab_id)?).await?;
    Ok(())
}

pub async fn open_tab(url: &str) -> Result<(), JsValue> {
    let properties = Object::new();
    set(&properties, "url", &JsValue::from_str(url))?;
    JsFuture::from(tabs_create(&properties)?).await?;
    Ok(())
}

/// Run `func(...args)` in the tab and return its result.
pub async fn execute_in_tab(tab_id: i32, func: &Function, args: &Array) -> Result<Option<Value>, JsValue> {
    let target = Object::new();
    set(&target, "tabId", &JsValue::from(tab_id))?;
    let injection = Object::new();
    set(&injection, "target", &target)?;
    set(&injection, "func", func)?;
    set(&injection, "args", args)?;

    let results = Array::from(&JsFuture::from(scripting_execute_script(&injection)?).await?);
    let first = results.get(0);
    if first.is_undefined() {
        return Ok(None);
    }
    Ok(to_json(&Reflect::get(&first, &JsValue::from_str("result"))?))
}
